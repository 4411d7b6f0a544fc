mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_SUCCESS};
use labforge_core::{install_signal_handler, load_config, ConfigOverrides, Engine};
use labforge_runtime::select_gateway;
use labforge_store::{LabStore, LabsLayout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "labforge",
    version,
    about = "Spin up isolated threat research labs from YAML templates"
)]
struct Cli {
    /// Directory holding one subdirectory per lab.
    #[arg(long, global = true)]
    labs_dir: Option<PathBuf>,

    /// Directory searched for template names.
    #[arg(long, global = true)]
    templates_dir: Option<PathBuf>,

    /// Container runtime: docker or mock.
    #[arg(long, global = true)]
    runtime: Option<String>,

    /// Config file (default: ~/.config/labforge/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build and start a lab from a template.
    Build {
        /// Template name or path to a YAML file.
        #[arg(short, long)]
        template: String,
        /// Custom lab name.
        #[arg(short, long)]
        name: Option<String>,
        /// Override a template setting (KEY=VAL, repeatable).
        #[arg(long = "override", value_name = "KEY=VAL")]
        overrides: Vec<String>,
    },
    /// Tear down a lab.
    Destroy {
        lab_id: String,
        /// Also remove named volumes.
        #[arg(long, default_value_t = false)]
        volumes: bool,
        /// Continue past runtime failures and clean up leftover files.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Start a stopped lab.
    Start { lab_id: String },
    /// Stop a running lab without destroying it.
    Stop { lab_id: String },
    /// List all labs with status.
    List,
    /// Show status of a specific lab.
    Status { lab_id: String },
    /// Show access info for a lab.
    Info { lab_id: String },
    /// Stream logs from a lab.
    Logs {
        lab_id: String,
        /// Follow log output.
        #[arg(short, long, default_value_t = false)]
        follow: bool,
        /// Only show logs of this service.
        #[arg(short, long)]
        service: Option<String>,
    },
    /// Open a shell in one of a lab's containers.
    Shell {
        lab_id: String,
        /// Service to shell into.
        #[arg(short, long)]
        service: String,
        /// Command to run.
        #[arg(short, long, default_value = commands::shell::DEFAULT_SHELL)]
        command: String,
    },
    /// List available lab templates.
    Templates,
    /// Scaffold a custom lab template.
    Init { path: PathBuf },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions { shell: Shell },
    /// Generate man pages in the specified directory.
    ManPages {
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn open_engine(cli: &Cli) -> Result<Engine, String> {
    let overrides = ConfigOverrides {
        config_path: cli.config.clone(),
        labs_dir: cli.labs_dir.clone(),
        templates_dir: cli.templates_dir.clone(),
        runtime: cli.runtime.clone(),
    };
    let config = load_config(&overrides, &|key| std::env::var(key).ok())
        .map_err(|e| e.to_string())?;
    tracing::debug!(
        "labs_dir={} templates_dir={} runtime={}",
        config.labs_dir.display(),
        config.templates_dir.display(),
        config.runtime
    );
    let gateway = select_gateway(&config.runtime, &config.gateway_options())
        .map_err(|e| e.to_string())?;
    let store = LabStore::new(LabsLayout::new(&config.labs_dir));
    Ok(Engine::new(config, Box::new(store), Arc::from(gateway)))
}

/// Commands that never touch labs or configuration.
fn without_engine(command: &Commands, json: bool) -> Option<Result<u8, String>> {
    match command {
        Commands::Init { path } => Some(commands::init::run(path, json)),
        Commands::Completions { shell } => Some(Ok(commands::generate::completions::<Cli>(*shell))),
        Commands::ManPages { dir } => Some(commands::generate::man_pages::<Cli>(dir)),
        _ => None,
    }
}

fn dispatch(engine: &Engine, command: Commands, json: bool) -> Result<u8, String> {
    match command {
        Commands::Build {
            template,
            name,
            overrides,
        } => commands::build::run(engine, &template, name.as_deref(), &overrides, json),
        Commands::Destroy {
            lab_id,
            volumes,
            force,
        } => commands::destroy::run(engine, &lab_id, volumes, force, json),
        Commands::Start { lab_id } => commands::start::run(engine, &lab_id, json),
        Commands::Stop { lab_id } => commands::stop::run(engine, &lab_id, json),
        Commands::List => commands::list::run(engine, json),
        Commands::Status { lab_id } => commands::status::run(engine, &lab_id, json),
        Commands::Info { lab_id } => commands::info::run(engine, &lab_id, json),
        Commands::Logs {
            lab_id,
            follow,
            service,
        } => commands::logs::run(engine, &lab_id, follow, service.as_deref()),
        Commands::Shell {
            lab_id,
            service,
            command,
        } => commands::shell::run(engine, &lab_id, &service, &command),
        Commands::Templates => commands::templates::run(engine, json),
        Commands::Init { .. } | Commands::Completions { .. } | Commands::ManPages { .. } => {
            Ok(EXIT_SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LABFORGE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = install_signal_handler() {
        tracing::warn!("Ctrl-C handler not installed: {e}");
    }

    let json = cli.json;
    let result = match without_engine(&cli.command, json) {
        Some(result) => result,
        None => open_engine(&cli).and_then(|engine| dispatch(&engine, cli.command, json)),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
