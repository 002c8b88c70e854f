use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use systemizer::commands;

fn main() -> Result<()> {
    systemizer::init_logging();

    let matches = Command::new("systemizer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-rate host and GPU telemetry collector")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("watch")
                .about("Stream metric snapshots as JSON lines until Ctrl+C")
                .arg(
                    Arg::new("tiers")
                        .long("tiers")
                        .value_name("LIST")
                        .help("Comma-separated tiers to print: fast,medium,slow,gpu"),
                )
                .arg(
                    Arg::new("disable")
                        .long("disable")
                        .value_name("LIST")
                        .help("Comma-separated statistics or metric keys to switch off"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .value_name("MS")
                        .help("Length of one fast tick in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("1000"),
                )
                .arg(
                    Arg::new("once")
                        .long("once")
                        .help("Sample every tier once and exit")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("gpu").about("Show the detected GPU and a single stats sample"))
        .subcommand(
            Command::new("settings")
                .about("Manage persisted statistics toggles and theme")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print current settings"))
                .subcommand(
                    Command::new("enable").about("Enable a statistic").arg(
                        Arg::new("name")
                            .help("Statistic name, e.g. cpu or gpu_temp")
                            .required(true)
                            .index(1),
                    ),
                )
                .subcommand(
                    Command::new("disable").about("Disable a statistic").arg(
                        Arg::new("name")
                            .help("Statistic name, e.g. cpu or gpu_temp")
                            .required(true)
                            .index(1),
                    ),
                )
                .subcommand(
                    Command::new("background")
                        .about("Set the main background colour")
                        .arg(
                            Arg::new("color")
                                .help("Palette name (\"Dark Blue\") or #rrggbb")
                                .required(true)
                                .index(1),
                        ),
                )
                .subcommand(Command::new("reset").about("Restore default settings")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("watch", sub_matches)) => commands::watch(sub_matches)?,
        Some(("gpu", _)) => commands::gpu()?,
        Some(("settings", sub_matches)) => commands::handle_settings(sub_matches)?,
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}
