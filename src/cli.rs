use crate::config::loader::EngineConfig;
use crate::config::types::{ExecutionRequest, DEFAULT_LANGUAGE};
use crate::config::validator;
use crate::exec::docker::DockerRuntime;
use crate::exec::Engine;
use crate::judge::registry::LanguageRegistry;
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Leftover workspaces older than this are removed when the server starts.
const STALE_WORKSPACE_AGE: Duration = Duration::from_secs(600);

#[derive(Parser, Debug)]
#[command(author, version, about = "Run untrusted code snippets in resource-bounded containers", long_about = None)]
pub struct Cli {
    /// JSON configuration file (limits, images, workspace root)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP service
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:5000")]
        bind: SocketAddr,
    },
    /// Run a single snippet and print the result as JSON
    #[command(group(ArgGroup::new("source").required(true).args(["file", "code"])))]
    Run {
        /// Language id (see `languages`)
        #[arg(long, default_value = DEFAULT_LANGUAGE)]
        language: String,
        /// Read the snippet from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Snippet text
        #[arg(long)]
        code: Option<String>,
    },
    /// Check that the container runtime answers and language images are present
    CheckDeps {
        /// Verbose output showing image references and runtime version
        #[arg(long)]
        verbose: bool,
    },
    /// List supported languages
    Languages,
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if !cfg!(unix) {
        anyhow::bail!("snipbox requires a Unix-like host");
    }

    let cli = Cli::parse();
    dispatch(cli)
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { bind } => serve(config_path, bind),
        Commands::Run {
            language,
            file,
            code,
        } => run_snippet(config_path, language, file, code),
        Commands::CheckDeps { verbose } => check_dependencies(config_path, verbose),
        Commands::Languages => list_languages(config_path),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = EngineConfig::load(path)?;
    let report = validator::validate_config(&config)?;
    for warning in &report.warnings {
        log::warn!("config: {}", warning);
    }
    Ok(config)
}

fn serve(config_path: Option<&Path>, bind: SocketAddr) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = Arc::new(Engine::new(config)?);

    match engine.workspaces().sweep_stale(STALE_WORKSPACE_AGE) {
        Ok(0) => {}
        Ok(n) => log::info!("Removed {} stale workspace(s)", n),
        Err(e) => log::warn!("Stale workspace sweep failed: {}", e),
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    log::info!("Running snipbox at http://{}", bind);
    runtime.block_on(crate::server::serve(engine, bind))?;
    Ok(())
}

fn run_snippet(
    config_path: Option<&Path>,
    language: String,
    file: Option<PathBuf>,
    code: Option<String>,
) -> Result<()> {
    let source = match (file, code) {
        (Some(path), _) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, Some(code)) => code,
        (None, None) => anyhow::bail!("either --file or --code is required"),
    };

    let engine = Engine::new(load_config(config_path)?)?;
    let result = engine.execute(&ExecutionRequest::new(language, source))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn check_dependencies(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = LanguageRegistry::with_image_overrides(&config.images)?;
    let docker = DockerRuntime::new(config.docker_binary.clone());

    println!("🔍 Checking sandbox dependencies...");
    println!();

    match docker.probe() {
        Ok(version) => {
            println!("✅ {} - OK", docker.binary());
            if verbose {
                println!("  server version -> {}", version);
                println!();
            }
        }
        Err(e) => {
            println!("❌ {} - UNAVAILABLE", docker.binary());
            if verbose {
                println!("  {}", e);
            }
            println!();
            println!("🔧 Install Docker and make sure the daemon is running and reachable");
            println!("   by the current user (e.g. membership in the docker group).");
            std::process::exit(1);
        }
    }

    let mut missing = Vec::new();
    for profile in registry.iter() {
        let present = docker.image_present(&profile.image_ref).unwrap_or_else(|e| {
            log::warn!("image check for {} failed: {}", profile.image_ref, e);
            false
        });

        if present {
            println!("✅ {} - OK", profile.name);
        } else {
            println!("❌ {} - MISSING", profile.name);
            missing.push(profile.image_ref.clone());
        }
        if verbose {
            println!("  image -> {}", profile.image_ref);
            println!("  command -> {}", profile.run_command.join(" "));
            println!();
        }
    }

    println!();

    if missing.is_empty() {
        println!("🎉 All language images are present!");
        println!("✅ snipbox is ready to use");
        if verbose {
            println!();
            println!("💡 Usage examples:");
            println!("  snipbox run --language=python --code='print(\"Hello World\")'");
            println!("  snipbox serve --bind 127.0.0.1:5000");
        }
        Ok(())
    } else {
        println!("❌ Missing images: {}", missing.join(", "));
        println!();
        println!("🔧 Pull them with:");
        for image in &missing {
            println!("   {} pull {}", docker.binary(), image);
        }
        std::process::exit(1);
    }
}

fn list_languages(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = LanguageRegistry::with_image_overrides(&config.images)?;

    for profile in registry.iter() {
        println!(
            "{:<8} {:<26} {}",
            profile.id, profile.name, profile.image_ref
        );
    }
    Ok(())
}
