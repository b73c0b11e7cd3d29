//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod helpers;
mod inspect;
mod plan;
mod search;
mod session;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use crate::models::{
    DateWindow, ExperienceLevel, JobType, SalaryBounds, SearchParameters, WorkArrangement,
};

#[derive(Parser)]
#[command(name = "jobscout")]
#[command(about = "Job listing search and qualification scoring")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Search parameters shared by `plan` and `search`.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Keywords, joined with spaces
    #[arg(required = true)]
    keywords: Vec<String>,
    /// Location text
    #[arg(short, long)]
    location: Option<String>,
    /// Date posted window: day, week, month
    #[arg(long)]
    date_posted: Option<DateWindow>,
    /// Work arrangement: remote, hybrid, on-site (repeatable)
    #[arg(long = "work")]
    work: Vec<WorkArrangement>,
    /// Experience level: internship, entry, associate, senior, director, executive (repeatable)
    #[arg(long = "experience")]
    experience: Vec<ExperienceLevel>,
    /// Job type: full-time, part-time, contract, temporary, internship, volunteer (repeatable)
    #[arg(long = "job-type")]
    job_type: Vec<JobType>,
    /// Minimum yearly salary
    #[arg(long)]
    salary_min: Option<u32>,
    /// Maximum yearly salary
    #[arg(long)]
    salary_max: Option<u32>,
    /// Company name (repeatable)
    #[arg(long = "company")]
    company: Vec<String>,
    /// Industry name (repeatable)
    #[arg(long = "industry")]
    industry: Vec<String>,
}

impl SearchArgs {
    pub fn to_params(&self) -> SearchParameters {
        let mut params = SearchParameters::new(self.keywords.iter().cloned());
        params.location = self.location.clone();
        params.date_window = self.date_posted;
        params.work_arrangements = self.work.clone();
        params.experience_levels = self.experience.clone();
        params.job_types = self.job_type.clone();
        if self.salary_min.is_some() || self.salary_max.is_some() {
            params.salary = Some(SalaryBounds {
                min: self.salary_min,
                max: self.salary_max,
            });
        }
        params.companies = self.company.clone();
        params.industries = self.industry.clone();
        params
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show which search path a set of filters would take
    Plan {
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Run a search and write listings as JSON lines
    Search {
        #[command(flatten)]
        search: SearchArgs,
        /// Session to run in (full-automation path)
        #[arg(short, long)]
        session: Option<String>,
        /// Output file (defaults to a timestamped file in the output dir; "-" for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Score each listing against a profile
        #[arg(long, requires = "profile")]
        analyze: bool,
        /// Candidate profile (JSON, YAML or TOML)
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Resume snapshot (JSON, YAML or TOML)
        #[arg(long)]
        resume: Option<PathBuf>,
        /// Run the browser headless
        #[arg(long)]
        headless: bool,
    },

    /// Score listings from a JSON lines file
    Analyze {
        /// Listings file (one listing per line)
        input: PathBuf,
        /// Candidate profile (JSON, YAML or TOML)
        #[arg(long)]
        profile: PathBuf,
        /// Resume snapshot (JSON, YAML or TOML)
        #[arg(long)]
        resume: Option<PathBuf>,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Concurrent analyses
        #[arg(short, long)]
        workers: Option<usize>,
        /// Limit number of listings to score (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// Manage browser sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Run interface, challenge and card detection against a saved page
    Inspect {
        /// Saved HTML file
        file: PathBuf,
        /// URL the page was saved from
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Create a new session
    Create {
        /// Human-readable label
        #[arg(short, long, default_value = "default")]
        label: String,
    },
    /// List stored sessions
    List,
    /// Log a session in (JOBSCOUT_USERNAME / JOBSCOUT_PASSWORD)
    Login {
        /// Session ID
        id: String,
        /// Run the browser headless
        #[arg(long)]
        headless: bool,
    },
    /// Drop a session's login state
    Expire {
        /// Session ID
        id: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Plan { search } => plan::cmd_plan(&search.to_params()),
        Commands::Search {
            search,
            session,
            output,
            analyze,
            profile,
            resume,
            headless,
        } => {
            search::cmd_search(
                &settings,
                &config,
                search::SearchOptions {
                    params: search.to_params(),
                    session,
                    output,
                    analyze,
                    profile,
                    resume,
                    headless,
                },
            )
            .await
        }
        Commands::Analyze {
            input,
            profile,
            resume,
            output,
            workers,
            limit,
        } => {
            analyze::cmd_analyze(
                &settings,
                &config,
                &input,
                &profile,
                resume.as_deref(),
                output.as_deref(),
                workers,
                limit,
            )
            .await
        }
        Commands::Session { command } => match command {
            SessionCommands::Create { label } => {
                session::cmd_session_create(&settings, &config, &label).await
            }
            SessionCommands::List => session::cmd_session_list(&settings, &config).await,
            SessionCommands::Login { id, headless } => {
                session::cmd_session_login(&settings, &config, &id, headless).await
            }
            SessionCommands::Expire { id } => {
                session::cmd_session_expire(&settings, &config, &id).await
            }
        },
        Commands::Inspect { file, url } => inspect::cmd_inspect(&config, &file, url.as_deref()),
    }
}
