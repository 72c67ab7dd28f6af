mod ai;
mod analytics;
mod api;
mod cli;
mod config;
mod db;
mod engine;
mod error;
mod service;

use crate::cli::onboard::run_onboarding;
use crate::cli::{AiCommands, Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use crate::engine::curve::curve_table;
use crate::engine::{Engine, Variant};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MAX_CURVE_LEVELS: u32 = 200;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Serve { port } => {
            let mut config = Config::load_or_default()?;
            if let Some(port) = port {
                config.api_port = port;
            }
            run_service(config).await
        }
        Commands::Curve { levels, variant } => handle_curve(levels, variant),
        Commands::Ai { command } => handle_ai_command(command),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_or_default()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = Config::load_or_default()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    println!("LevelUp status");
    println!("- variant: {}", config.variant.as_str());
    println!("- api: http://{}:{}/api/v1", config.bind_address, config.api_port);
    println!("- db_path: {}", config.db_path.display());
    println!("- users: {}", database.count_users()?);
    println!(
        "- ai_coach: {}",
        match (config.ai_enabled, ai::has_api_key(&config)) {
            (false, _) => "disabled",
            (true, true) => "enabled",
            (true, false) => "enabled (API key missing)",
        }
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing");
    }

    let config = Config::load_or_default()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable");
        }
    }

    match config.bind_ip() {
        Ok(ip) => println!("[OK] bind address valid: {ip}:{}", config.api_port),
        Err(error) => {
            println!("[WARN] {error}");
            issues.push("invalid bind address");
        }
    }

    println!("[OK] progression rules: {}", config.variant.as_str());

    if config.ai_enabled {
        if ai::has_api_key(&config) {
            println!("[OK] AI API key is configured");
        } else {
            println!("[WARN] AI coach is enabled but API key is missing");
            issues.push("ai api key missing");
        }
    } else {
        println!("[OK] AI coach disabled");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_curve(levels: u32, variant: Option<String>) -> Result<()> {
    let variant = match variant {
        Some(raw) => Variant::parse(&raw)?,
        None => Config::load_or_default()?.variant,
    };
    let engine = Engine::new(variant);
    let levels = levels.clamp(1, MAX_CURVE_LEVELS);

    println!("{} curve", variant.as_str());
    println!("{:>6}  {:>12}  {:>10}", "level", "total_xp", "span");
    for row in curve_table(engine.curve(), levels) {
        println!("{:>6}  {:>12}  {:>10}", row.level, row.total_xp, row.level_span);
    }

    Ok(())
}

fn handle_ai_command(command: AiCommands) -> Result<()> {
    match command {
        AiCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = Config::load_or_default()?;

            if let Some(value) = key {
                config.ai_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.ai_api_base_url = value;
            }
            if let Some(value) = model {
                config.ai_model = value;
            }

            let response = ai::test_connection(&config)?;
            println!("AI API connection successful");
            println!("{response}");

            Ok(())
        }
    }
}

async fn run_service(config: Config) -> Result<()> {
    let shared_config = Arc::new(config);

    info!(variant = shared_config.variant.as_str(), "LevelUp service started");

    tokio::select! {
        api_result = api::run_server(Arc::clone(&shared_config)) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `levelup onboard` first.".to_string())
}
