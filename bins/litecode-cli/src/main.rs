mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "litecode-cli")]
#[command(about = "LiteCode CLI - Manage problems, judge languages, and submissions", long_about = None)]
struct Cli {
    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379", global = true)]
    redis_url: String,

    /// Language configuration file
    #[arg(long, env = "LANGUAGES_PATH", default_value = "config/languages.json", global = true)]
    languages: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a judge language in the language configuration
    AddLang {
        /// Language name as used by problem templates (e.g., cpp, python)
        #[arg(short, long)]
        name: String,

        /// Judge language id (e.g., 54 for C++, 71 for Python)
        #[arg(short, long)]
        judge_id: i32,

        /// Language version, informational only
        #[arg(short, long, default_value = "")]
        version: String,
    },

    /// Remove a language from the language configuration
    RemoveLang {
        /// Language name
        #[arg(short, long)]
        name: String,
    },

    /// List configured languages
    ListLangs,

    /// Load problem definitions from a JSON file into the problem store
    Seed {
        /// JSON file holding an array of problems
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the program that would be sent to the judge
    Assemble {
        /// Problem slug
        #[arg(short, long)]
        slug: String,

        /// Language name
        #[arg(short, long)]
        language: String,

        /// File holding the user's code
        #[arg(short, long)]
        code_file: PathBuf,
    },

    /// Check (and if needed, poll) one submission's status
    Status {
        /// Submission id
        #[arg(short, long)]
        submission_id: Uuid,

        /// Owner of the submission
        #[arg(short, long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::AddLang {
            name,
            judge_id,
            version,
        } => {
            commands::add_language(&cli.languages, &name, judge_id, &version)?;
        }
        Commands::RemoveLang { name } => {
            commands::remove_language(&cli.languages, &name)?;
        }
        Commands::ListLangs => {
            commands::list_languages(&cli.languages)?;
        }
        Commands::Seed { file } => {
            commands::seed_problems(&cli.redis_url, &file).await?;
        }
        Commands::Assemble {
            slug,
            language,
            code_file,
        } => {
            commands::preview_source(&cli.redis_url, &slug, &language, &code_file).await?;
        }
        Commands::Status {
            submission_id,
            user_id,
        } => {
            commands::check_status(&cli.redis_url, &cli.languages, submission_id, &user_id).await?;
        }
    }

    Ok(())
}
