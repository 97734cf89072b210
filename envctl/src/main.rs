//! Environment lifecycle CLI.
//!
//! Manages one isolated Python environment per project root (`.venv` by
//! default) and its declaration file (`requirements.txt`). Each command is a
//! single explicit step; nothing chains create, install and run implicitly.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use envctl::core::requirements::FreezeScope;
use envctl::error::EnvError;
use envctl::exit_codes;
use envctl::freeze::FreezeOutcome;
use envctl::io::config::{CONFIG_FILE, EnvConfig, load_config};
use envctl::io::paths::ProjectPaths;
use envctl::io::toolchain::PipToolchain;
use envctl::logging;
use envctl::orchestrator::{Operation, Outcome, execute};
use envctl::store::{CreateOutcome, DestroyOutcome};

#[derive(Parser)]
#[command(
    name = "envctl",
    version,
    about = "Create, populate, run and snapshot an isolated Python environment"
)]
struct Cli {
    /// Project root; every other path resolves against it.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (default: `<root>/envctl.toml`, optional).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Environment directory relative to the root (overrides config).
    #[arg(long, global = true)]
    env_dir: Option<PathBuf>,

    /// Declaration file relative to the root (overrides config).
    #[arg(long, global = true)]
    requirements: Option<PathBuf>,

    /// Base interpreter used to create the environment (overrides config).
    #[arg(long, global = true)]
    python: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the environment if absent (same as `venv`; does not install).
    Build,
    /// Create the environment if absent.
    Venv,
    /// Install the declaration file into the existing environment.
    Reqs,
    /// Run the entry point with the environment's interpreter.
    Run {
        /// Arguments passed to the entry point.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Overwrite the declaration file with the installed packages.
    Freeze {
        /// Record every installed package or only declared ones (overrides config).
        #[arg(long, value_enum)]
        scope: Option<FreezeScope>,
    },
    /// Remove the environment directory.
    Clean,
    /// Show environment state and drift from the declaration file.
    Status {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("envctl: {:#}", err);
            err.downcast_ref::<EnvError>()
                .map_or(exit_codes::INVALID, EnvError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let paths = ProjectPaths::new(&cli.root, &config);

    let json = matches!(cli.command, Command::Status { json: true });
    let operation = match cli.command {
        Command::Build => Operation::Build,
        Command::Venv => Operation::Venv,
        Command::Reqs => Operation::Reqs,
        Command::Run { args } => Operation::Run { args },
        Command::Freeze { scope } => Operation::Freeze {
            scope: scope.unwrap_or(config.freeze.scope),
        },
        Command::Clean => Operation::Clean,
        Command::Status { .. } => Operation::Status,
    };

    let outcome = execute(&operation, &paths, &config, &PipToolchain)?;
    report(&outcome, &paths, json)?;
    Ok(outcome.exit_code())
}

fn resolve_config(cli: &Cli) -> Result<EnvConfig> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(CONFIG_FILE));
    let mut config = load_config(&config_path)?;
    if let Some(env_dir) = &cli.env_dir {
        config.env_dir = env_dir.clone();
    }
    if let Some(requirements) = &cli.requirements {
        config.requirements = requirements.clone();
    }
    if let Some(python) = &cli.python {
        config.python = python.clone();
    }
    config.validate().context("validate command-line overrides")?;
    Ok(config)
}

fn report(outcome: &Outcome, paths: &ProjectPaths, json: bool) -> Result<()> {
    let env_dir = paths.env_dir.display();
    match outcome {
        Outcome::Created(CreateOutcome::Created) => println!("created environment at {env_dir}"),
        Outcome::Created(CreateOutcome::AlreadyPresent) => {
            println!("environment already present at {env_dir}");
        }
        Outcome::Installed => println!(
            "installed dependencies from {}",
            paths.requirements_path.display()
        ),
        Outcome::Ran { .. } => {}
        Outcome::Frozen(FreezeOutcome { path, pins, changed }) => {
            let verb = if *changed { "wrote" } else { "unchanged" };
            println!("{verb} {} ({pins} packages)", path.display());
        }
        Outcome::Cleaned(DestroyOutcome::Removed) => println!("removed {env_dir}"),
        Outcome::Cleaned(DestroyOutcome::NothingToRemove) => {
            println!("nothing to remove at {env_dir}");
        }
        Outcome::Status(status) => {
            if json {
                let mut payload =
                    serde_json::to_string_pretty(status).context("serialize status json")?;
                payload.push('\n');
                print!("{payload}");
            } else {
                print!("{}", status.render());
            }
        }
    }
    Ok(())
}
