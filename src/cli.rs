//! CLI interface for hire-brain

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::{self, Config};
use crate::engine::HiringEngine;
use crate::types::{Candidate, FeedbackRequest};

#[derive(Parser)]
#[command(name = "hire-brain")]
#[command(about = "Adaptive candidate scoring that learns from hiring feedback", long_about = None)]
#[command(version)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(short, long, global = true, env = "HIRE_BRAIN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a candidate
    Decide {
        /// Candidate JSON file ({"id": ..., "skills": [...], ...})
        #[arg(conflicts_with_all = ["id", "skills"])]
        file: Option<PathBuf>,
        /// Candidate id
        #[arg(long)]
        id: Option<String>,
        /// Comma-separated skills
        #[arg(long, value_delimiter = ',')]
        skills: Vec<String>,
    },
    /// Submit hiring feedback for a candidate
    Feedback {
        #[arg(long)]
        candidate_id: String,
        /// Comma-separated skills (defaults to the candidate's last decision)
        #[arg(long, value_delimiter = ',')]
        skills: Vec<String>,
        /// Feedback score from 1 to 5
        #[arg(long)]
        score: f64,
        /// hired, rejected or reconsider
        #[arg(long)]
        outcome: String,
        /// RFC 3339 event time (defaults to now)
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
        /// Decision this feedback refers to
        #[arg(long)]
        decision: Option<Uuid>,
    },
    /// Show a summary of the learned weights
    State,
    /// Show the highest weighted skills
    Top {
        #[arg(short, default_value = "10")]
        n: usize,
    },
    /// Show analytics over all decisions and feedback
    Analytics,
    /// Show what the engine has learned, in plain words
    Insights,
    /// Show decisions and feedback for one candidate
    History {
        candidate_id: String,
    },
    /// Write the current state to disk again
    Flush,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the built-in defaults
    Defaults,
    /// Print the config file location
    Path,
    /// Write a default config file if none exists
    Init,
    /// Overwrite the config file with defaults
    Reset,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from(p),
        None => Config::load(),
    }
}

fn read_candidate(path: &Path) -> Result<Candidate> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read candidate file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse candidate file {}", path.display()))
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_file = cli.config.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, config_file)?,
        command => {
            let config = load_config(config_file)?;
            let engine = HiringEngine::open(config).await?;
            run_engine(command, &engine).await?;
        }
    }

    Ok(())
}

async fn run_engine(command: Commands, engine: &HiringEngine) -> Result<()> {
    match command {
        Commands::Decide { file, id, skills } => {
            let candidate = match (file, id) {
                (Some(path), _) => read_candidate(&path)?,
                (None, Some(id)) => Candidate::new(id, skills),
                (None, None) => anyhow::bail!("Provide a candidate file or --id"),
            };
            print_json(&engine.decide(&candidate).await)?;
        }
        Commands::Feedback { candidate_id, skills, score, outcome, timestamp, decision } => {
            let request = FeedbackRequest {
                candidate_id,
                skills,
                feedback_score: score,
                outcome,
                timestamp,
                correlated_decision: decision,
            };
            let receipt = engine.submit(request).await?;
            if receipt.durability.is_degraded() {
                eprintln!("warning: feedback applied but state could not be saved");
            }
            print_json(&receipt)?;
        }
        Commands::State => print_json(&engine.brain_summary().await)?,
        Commands::Top { n } => print_json(&engine.top(n).await)?,
        Commands::Analytics => print_json(&engine.analytics_report().await)?,
        Commands::Insights => print_json(&engine.insights().await)?,
        Commands::History { candidate_id } => print_json(&engine.history(&candidate_id).await)?,
        Commands::Flush => print_json(&engine.flush().await?)?,
        Commands::Config { .. } => anyhow::bail!("config commands do not use the engine"),
    }
    Ok(())
}

fn run_config(command: ConfigCommands, path: Option<&Path>) -> Result<()> {
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };

    match command {
        ConfigCommands::Show => {
            let config = load_config(path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Defaults => print!("{}", config::default_config_toml()),
        ConfigCommands::Path => println!("{}", target.display()),
        ConfigCommands::Init => {
            if target.exists() {
                println!("Config already exists at {}", target.display());
            } else {
                Config::default().save_to(&target)?;
                println!("Wrote default config to {}", target.display());
            }
        }
        ConfigCommands::Reset => {
            match path {
                Some(p) => Config::default().save_to(p)?,
                None => config::reset_config()?,
            }
            println!("Reset config at {}", target.display());
        }
    }
    Ok(())
}
