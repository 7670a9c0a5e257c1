use anyhow::{Context, Result};
use belltower::common::weekday_name;
use belltower::config::ScheduleConfig;
use belltower::prelude::*;
use belltower::settings::EngineSettings;
use chrono::{Datelike, Local, Weekday};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use std::path::PathBuf;
use std::process::ExitCode;

const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(author, version, about = "Inspect belltower schedules", long_about = None)]
struct Args {
    /// Schedule config to read. Defaults to the engine's configured file.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse the config and summarise the weekly table.
    Check,
    /// List today's alerts in firing order.
    Today,
    /// Show the next alert that will fire.
    Next,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let (path, base_dir) = match args.config {
        Some(path) => {
            let base_dir = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            (path, base_dir)
        }
        None => {
            let settings = EngineSettings::load().context("reading engine settings")?;
            (settings.config_path(), settings.install_dir)
        }
    };
    let config = ScheduleConfig::load(&path, &base_dir)?;

    match args.command {
        Command::Check => check(&config, &path),
        Command::Today => today(&config),
        Command::Next => next(&config),
    }
    Ok(())
}

fn kind_label(kind: AlertKind) -> ColoredString {
    match kind {
        AlertKind::Start => "start".green(),
        AlertKind::BeforeEnd => "before_end".yellow(),
        AlertKind::End => "end".red(),
    }
}

fn check(config: &ScheduleConfig, path: &std::path::Path) {
    println!(
        "{} {} (belltower {})",
        "ok".green().bold(),
        path.display(),
        CLI_VERSION.dimmed()
    );
    let week = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    for day in week {
        let events = config.events_on(day).len();
        let alerts = config.alerts_on(day).len();
        let line = format!(
            "  {:<10} {:>3} events {:>3} alerts",
            weekday_name(day),
            events,
            alerts
        );
        if events == 0 {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }
    for clip in [&config.sounds.start, &config.sounds.before_end, &config.sounds.end] {
        if !clip.exists() {
            println!("  {} missing clip {}", "warn".yellow(), clip.display());
        }
    }
}

fn today(config: &ScheduleConfig) {
    let weekday = Local::now().weekday();
    let alerts = config.alerts_on(weekday);
    println!("{}", weekday_name(weekday).cyan().bold());
    if alerts.is_empty() {
        println!("  {}", "no alerts today".dimmed());
    }
    for (at, kind, event) in alerts {
        println!(
            "  {}  {:<20} {}",
            at.format("%H:%M"),
            kind_label(kind),
            event.name
        );
    }
}

fn next(config: &ScheduleConfig) {
    match config.next_alert_after(Local::now().naive_local()) {
        Some((at, kind, event)) => println!(
            "{} {}  {}  {}",
            weekday_name(at.weekday()).cyan(),
            at.format("%H:%M"),
            kind_label(kind),
            event.message_for(kind)
        ),
        None => println!("{}", "no alerts scheduled".dimmed()),
    }
}
