use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::settings::{Settings, BACKGROUND_COLORS, TOGGLES};

/// Main handler for settings commands
pub fn handle_settings(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => handle_show(),
        Some(("enable", sub_matches)) => handle_toggle(sub_matches, true),
        Some(("disable", sub_matches)) => handle_toggle(sub_matches, false),
        Some(("background", sub_matches)) => handle_background(sub_matches),
        Some(("reset", _)) => handle_reset(),
        _ => {
            println!("Use 'systemizer settings --help' for more information.");
            Ok(())
        }
    }
}

fn handle_show() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    let path = Settings::get_settings_path()?;

    println!("{}", "Statistics".cyan().bold());
    for (name, _) in TOGGLES {
        let state = if settings.is_toggle_enabled(name) {
            "enabled".green()
        } else {
            "disabled".red()
        };
        println!("  {:<12} {}", name, state);
    }

    println!();
    println!("{}", "Theme".cyan().bold());
    let background = settings.background_main();
    let label = BACKGROUND_COLORS
        .iter()
        .find(|(_, hex)| hex.eq_ignore_ascii_case(background))
        .map(|(name, _)| format!(" ({})", name))
        .unwrap_or_default();
    println!("  background_main {}{}", background, label);

    println!();
    println!("{}", format!("Stored at {}", path.display()).dimmed());
    Ok(())
}

fn handle_toggle(matches: &ArgMatches, enabled: bool) -> Result<()> {
    let name = matches
        .get_one::<String>("name")
        .context("Statistic name is required")?;

    let mut settings = Settings::load().context("Failed to load settings")?;
    settings.set_toggle(name, enabled)?;
    settings.save()?;

    let state = if enabled { "enabled".green() } else { "disabled".red() };
    println!("{} {}", name.bold(), state);
    Ok(())
}

fn handle_background(matches: &ArgMatches) -> Result<()> {
    let value = matches
        .get_one::<String>("color")
        .context("Colour is required")?;

    let mut settings = Settings::load().context("Failed to load settings")?;
    settings.set_background(value)?;
    settings.save()?;

    println!("background_main set to {}", settings.background_main().bold());
    Ok(())
}

fn handle_reset() -> Result<()> {
    Settings::default().save()?;
    println!("{}", "Settings reset to defaults".green());
    Ok(())
}
