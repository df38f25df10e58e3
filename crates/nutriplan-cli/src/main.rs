mod calc_cmds;
mod config;
mod plan_cmds;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

use config::{CliOverrides, NutriplanConfig};

#[derive(Parser)]
#[command(
    name = "nutriplan",
    about = "Plan, validate and review personalized daily nutrition plans"
)]
struct Cli {
    /// OpenAI-compatible API base URL (overrides NUTRIPLAN_LLM_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Generation model (overrides NUTRIPLAN_LLM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Knowledge-base catalog JSON file (overrides NUTRIPLAN_CATALOG_PATH)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a nutriplan config file
    Init {
        /// Knowledge-base catalog JSON file
        #[arg(long)]
        catalog_path: Option<PathBuf>,
        /// API key for the model endpoint (prefer NUTRIPLAN_LLM_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Compute daily targets and the per-meal calorie budget for a profile
    Targets {
        /// Path to the profile TOML file
        #[arg(long)]
        profile: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Consolidate ingredient lines into a shopping list
    Shopping {
        /// Ingredient lines, e.g. "200g Pollo" "Avena 80g"
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Planning session management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Start a planning session and run it until it needs review
    Start {
        /// Path to the profile TOML file
        #[arg(long)]
        profile: PathBuf,
        /// Session state file to create
        #[arg(long)]
        state: PathBuf,
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Resume a session awaiting review with a decision
    Resume {
        /// Session state file
        #[arg(long)]
        state: PathBuf,
        /// approve, change_meal or regenerate_all
        #[arg(long)]
        action: String,
        /// Meal slot to change (required for change_meal)
        #[arg(long)]
        meal_time: Option<String>,
        /// What to change about the meal
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Continue an interrupted session from its current stage
    Continue {
        /// Session state file
        #[arg(long)]
        state: PathBuf,
    },
    /// Show a session: the review summary or the final plan
    Show {
        /// Session state file
        #[arg(long)]
        state: PathBuf,
        /// Print the raw state as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute the `nutriplan init` command: write config file.
fn cmd_init(
    cli: &CliOverrides,
    catalog_path: Option<PathBuf>,
    api_key: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut cfg = config::ConfigFile::default();
    if let Some(url) = &cli.base_url {
        cfg.llm.base_url = url.clone();
    }
    if let Some(model) = &cli.model {
        cfg.llm.model = model.clone();
    }
    cfg.llm.api_key = api_key;
    cfg.catalog.path = catalog_path.or_else(|| cli.catalog.clone());

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  llm.base_url = {}", cfg.llm.base_url);
    println!("  llm.model = {}", cfg.llm.model);
    println!(
        "  llm.api_key = {}",
        if cfg.llm.api_key.is_some() { "(set)" } else { "(not set)" }
    );
    match &cfg.catalog.path {
        Some(p) => println!("  catalog.path = {}", p.display()),
        None => println!("  catalog.path = (not set)"),
    }
    println!();
    println!("Next: run `nutriplan plan start --profile <file> --state <file>`.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = cli.overrides();

    match cli.command {
        Commands::Init {
            catalog_path,
            api_key,
            force,
        } => {
            cmd_init(&overrides, catalog_path, api_key, force)?;
        }
        Commands::Targets { profile, json } => {
            calc_cmds::run_targets(&profile, json)?;
        }
        Commands::Shopping { items } => {
            calc_cmds::run_shopping(&items);
        }
        Commands::Plan { command } => {
            let resolved = NutriplanConfig::resolve(&overrides)?;
            plan_cmds::run_plan_command(command, resolved).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "nutriplan",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
