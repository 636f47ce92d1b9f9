// CLI commands for managing LiteCode
use anyhow::{bail, Context, Result};
use litecode_common::config::AppConfig;
use litecode_common::store::{ProblemStore, RedisStore};
use litecode_common::types::Problem;
use litecode_judge::assembler::assemble;
use litecode_judge::languages::{LanguageConfig, LanguagesFile};
use litecode_judge::{JudgeClient, LanguageRegistry, StatusSource, SubmissionDispatcher};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Load languages configuration
fn load_languages_config(path: &Path) -> Result<LanguagesFile> {
    if !path.exists() {
        return Ok(LanguagesFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Save languages configuration
fn save_languages_config(path: &Path, config: &LanguagesFile) -> Result<()> {
    // Ensure config directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json_content =
        serde_json::to_string_pretty(config).context("Failed to serialize languages.json")?;
    fs::write(path, json_content).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}

/// Add a judge language to the configuration file
pub fn add_language(path: &Path, name: &str, judge_id: i32, version: &str) -> Result<()> {
    println!("🚀 Adding language: {}", name);

    if name.trim().is_empty() {
        bail!("Language name cannot be empty");
    }
    if judge_id <= 0 {
        bail!("Judge language id must be positive, got {}", judge_id);
    }

    let mut languages_json = load_languages_config(path)?;

    if languages_json.languages.iter().any(|l| l.name == name) {
        bail!("Language '{}' already exists in config", name);
    }
    if let Some(existing) = languages_json.languages.iter().find(|l| l.judge_id == judge_id) {
        bail!(
            "Judge id {} is already mapped to language '{}'",
            judge_id,
            existing.name
        );
    }

    languages_json.languages.push(LanguageConfig {
        name: name.to_string(),
        judge_id,
        version: version.to_string(),
    });

    println!("📝 Updating {}...", path.display());
    save_languages_config(path, &languages_json)?;

    println!("✅ Language '{}' added successfully!", name);
    println!("\n📋 Next steps:");
    println!("  1. Add a '{}' code template to each problem that should support it", name);
    println!("  2. Restart litecode-api to pick up the new language");

    Ok(())
}

/// Remove a judge language from the configuration file
pub fn remove_language(path: &Path, name: &str) -> Result<()> {
    println!("🗑️  Removing language: {}", name);

    let mut languages_json = load_languages_config(path)?;

    let index = languages_json
        .languages
        .iter()
        .position(|l| l.name == name)
        .ok_or_else(|| anyhow::anyhow!("Language '{}' not found in config", name))?;

    if languages_json.languages.len() == 1 {
        bail!("Refusing to remove the last configured language");
    }

    languages_json.languages.remove(index);
    println!("📝 Updating {}...", path.display());
    save_languages_config(path, &languages_json)?;

    println!("✅ Language '{}' removed", name);
    Ok(())
}

/// List all configured languages
pub fn list_languages(path: &Path) -> Result<()> {
    let registry = LanguageRegistry::load_or_builtin(path)
        .with_context(|| format!("Invalid language configuration in {}", path.display()))?;

    if !path.exists() {
        println!("⚠️  {} not found, showing built-in languages\n", path.display());
    }

    println!("📋 Configured Languages:\n");
    println!("{:<12} {:<10} {:<20}", "Name", "Judge ID", "Version");
    println!("{}", "─".repeat(44));

    let names = registry.names();
    for name in &names {
        if let Some(lang) = registry.get(name) {
            println!("{:<12} {:<10} {:<20}", lang.name, lang.judge_id, lang.version);
        }
    }

    println!("\n✅ Total: {} language(s)", names.len());
    Ok(())
}

/// Parse and sanity-check a problems file
fn load_problems(file: &Path) -> Result<Vec<Problem>> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let problems: Vec<Problem> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    for problem in &problems {
        if problem.id.trim().is_empty() || problem.slug.trim().is_empty() {
            bail!("Every problem needs a non-empty id and slug");
        }
        for template in &problem.complete_code {
            if !template.code.contains(litecode_judge::assembler::USER_CODE_MARKER) {
                bail!(
                    "Problem '{}': {} template has no {} marker",
                    problem.slug,
                    template.language,
                    litecode_judge::assembler::USER_CODE_MARKER
                );
            }
        }
    }

    Ok(problems)
}

/// Seed problem definitions into Redis
pub async fn seed_problems(redis_url: &str, file: &Path) -> Result<()> {
    let problems = load_problems(file)?;
    println!("📦 Seeding {} problem(s) from {}", problems.len(), file.display());

    let store = RedisStore::connect(redis_url)
        .await
        .context("Failed to connect to Redis")?;

    for problem in &problems {
        store
            .put_problem(problem)
            .await
            .with_context(|| format!("Failed to store problem '{}'", problem.slug))?;
        println!(
            "  ✓ {:<24} visible: {:<3} hidden: {:<3}",
            problem.slug,
            problem.visible_test_cases.len(),
            problem.hidden_test_cases.len()
        );
    }

    println!("✅ Done");
    Ok(())
}

/// Print the assembled program for a stored problem
pub async fn preview_source(
    redis_url: &str,
    slug: &str,
    language: &str,
    code_file: &Path,
) -> Result<()> {
    let user_code = fs::read_to_string(code_file)
        .with_context(|| format!("Failed to read {}", code_file.display()))?;

    let store = RedisStore::connect(redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let problem = store
        .execution_data(slug)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Problem '{}' not found", slug))?;

    let source = assemble(&problem.complete_code_templates, language, &user_code)?;
    println!("{}", source);
    Ok(())
}

/// Check one submission the same way the status endpoint does
pub async fn check_status(
    redis_url: &str,
    languages_path: &Path,
    submission_id: Uuid,
    user_id: &str,
) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let languages = LanguageRegistry::load_or_builtin(languages_path)?;
    let store = Arc::new(
        RedisStore::connect(redis_url)
            .await
            .context("Failed to connect to Redis")?,
    );
    let judge = JudgeClient::new(config.judge).context("Failed to build judge client")?;
    let dispatcher =
        SubmissionDispatcher::new(Arc::new(judge), store, Arc::new(languages), config.poll);

    println!("🔍 Checking submission {}...", submission_id);
    let check = dispatcher.check_status(submission_id, user_id).await?;

    println!("Status:  {}", check.verdict.overall);
    if let Some(runtime) = check.verdict.max_runtime_seconds {
        println!("Runtime: {:.3}s", runtime);
    }
    if let Some(memory) = check.verdict.max_memory_kb {
        println!("Memory:  {} KB", memory);
    }
    match &check.source {
        StatusSource::Stored => println!("\n(answered from the store)"),
        StatusSource::Polled(outcome) if outcome.is_final() => {
            println!(
                "\n(polled the judge {} time(s){})",
                outcome.attempts(),
                if check.applied { ", verdict recorded" } else { "" }
            );
        }
        StatusSource::Polled(outcome) => {
            println!(
                "\n⚠️  Judge did not finish after {} attempt(s); submission is still pending",
                outcome.attempts()
            );
        }
    }

    Ok(())
}
