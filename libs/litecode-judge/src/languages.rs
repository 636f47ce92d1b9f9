// Language configuration management
// Maps the language names used by problem templates to judge language ids

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LanguageConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse languages file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no languages configured")]
    Empty,

    #[error("language `{0}` configured more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub judge_id: i32,
    #[serde(default)]
    pub version: String,
}

/// On-disk shape of `languages.json`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LanguagesFile {
    pub languages: Vec<LanguageConfig>,
}

/// Registry of languages the judge is allowed to run
/// This is the authoritative source for language ids
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: HashMap<String, LanguageConfig>,
}

impl LanguageRegistry {
    pub fn from_configs(configs: Vec<LanguageConfig>) -> Result<Self, LanguageConfigError> {
        if configs.is_empty() {
            return Err(LanguageConfigError::Empty);
        }

        let mut languages = HashMap::new();
        for config in configs {
            if languages.contains_key(&config.name) {
                return Err(LanguageConfigError::Duplicate(config.name));
            }
            languages.insert(config.name.clone(), config);
        }

        Ok(Self { languages })
    }

    /// Languages shipped with the default judge image
    pub fn builtin() -> Self {
        let languages = [("cpp", 54, "GCC 9.2.0"), ("python", 71, "3.8.1")]
            .into_iter()
            .map(|(name, judge_id, version)| {
                (
                    name.to_string(),
                    LanguageConfig {
                        name: name.to_string(),
                        judge_id,
                        version: version.to_string(),
                    },
                )
            })
            .collect();
        Self { languages }
    }

    /// Load language configuration from a languages.json file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, LanguageConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| LanguageConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: LanguagesFile = serde_json::from_str(&content)?;
        Self::from_configs(file.languages)
    }

    /// Load from `path` when it exists, otherwise fall back to the built-in set
    pub fn load_or_builtin<P: AsRef<Path>>(path: P) -> Result<Self, LanguageConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Languages file not found, using built-in languages");
            return Ok(Self::builtin());
        }

        let registry = Self::load_from_file(path)?;
        info!(path = %path.display(), languages = ?registry.names(), "Loaded language configuration");
        Ok(registry)
    }

    /// Judge language id for a language name
    pub fn judge_id(&self, language: &str) -> Option<i32> {
        self.languages.get(language).map(|l| l.judge_id)
    }

    pub fn get(&self, language: &str) -> Option<&LanguageConfig> {
        self.languages.get(language)
    }

    /// Sorted list of configured language names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.languages.keys().cloned().collect();
        names.sort();
        names
    }
}
