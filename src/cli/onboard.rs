use crate::config::{Config, expand_home};
use crate::db::Database;
use crate::engine::Variant;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};
use std::net::IpAddr;

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to LevelUp onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::default();

    println!("\n[1/4] Progression rules");
    println!("  threshold: each level costs floor(100 * level^1.5) XP, flat task rewards.");
    println!("  quadratic: level = sqrt(xp / 100) + 1, task rewards grow with your streak.");

    let variants = [Variant::Threshold, Variant::Quadratic];
    let labels = variants.map(Variant::as_str);
    let selected_index = Select::with_theme(&theme)
        .with_prompt("  Select progression rules")
        .default(0)
        .items(&labels)
        .interact()
        .context("Failed to select progression rules")?;
    let variant = variants
        .get(selected_index)
        .copied()
        .unwrap_or_default();
    println!("  ✓ Using {} rules", variant.as_str());

    println!("\n[2/4] API server");
    let bind_address: String = Input::with_theme(&theme)
        .with_prompt("  Bind address")
        .default(defaults.bind_address.clone())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            input
                .parse::<IpAddr>()
                .map(|_| ())
                .map_err(|_| "Use an IP address (example: 127.0.0.1)")
        })
        .interact_text()
        .context("Failed to read bind address")?;
    let api_port: u16 = Input::with_theme(&theme)
        .with_prompt("  Port")
        .default(defaults.api_port)
        .interact_text()
        .context("Failed to read API port")?;
    println!("  ✓ Listening on {bind_address}:{api_port}");

    println!("\n[3/4] Database location");
    let db_input: String = Input::with_theme(&theme)
        .with_prompt("  SQLite file")
        .default(defaults.db_path.display().to_string())
        .interact_text()
        .context("Failed to read database path")?;
    let db_path = expand_home(&db_input);
    println!("  ✓ {}", db_path.display());

    println!("\n[4/4] AI coach (optional)");
    let ai_enabled = Confirm::with_theme(&theme)
        .with_prompt("  Enable the AI coach?")
        .default(false)
        .interact()
        .context("Failed to read AI coach input")?;

    let ai_api_key = if ai_enabled {
        let key = Password::with_theme(&theme)
            .with_prompt("  API key (leave empty to use LEVELUP_AI_API_KEY)")
            .allow_empty_password(true)
            .interact()
            .context("Failed to read AI API key")?;
        (!key.trim().is_empty()).then_some(key)
    } else {
        None
    };

    let config = Config {
        variant,
        bind_address,
        api_port,
        db_path,
        ai_enabled,
        ai_api_key,
        ..defaults
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    Database::open(&config.db_path)?;

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run `levelup serve` to start the API.");
    println!("  Run `levelup status` to check current state.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
