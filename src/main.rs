//! Messej command line.
//!
//! - `run` (default): read replies, compose and send today's digest
//! - `profile`: show what is known about the user and the next question

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use messej::config::Config;
use messej::events::EventBus;
use messej::interaction_log::InteractionLog;
use messej::logging;
use messej::mail::{ImapInbox, SmtpOutbox};
use messej::metrics::MetricsCollector;
use messej::news::NewsApiClient;
use messej::planner;
use messej::profile::ProfileStore;
use messej::runner::{Collaborators, RunOptions, Runner};
use messej::vendors::ModelClient;
use messej::weather::OpenWeatherClient;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "messej")]
#[command(about = "Daily digest email assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file layered over ~/.messej/config.toml and ./messej.toml
    #[arg(long, global = true, env = "MESSEJ_CONFIG")]
    config: Option<PathBuf>,

    /// Print the digest instead of sending it; nothing is saved
    #[arg(long, global = true)]
    dry_run: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read replies, then compose and send today's digest
    Run,
    /// Print the stored profile and the question that would be asked next
    Profile,
}

fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config, cli.dry_run),
        Command::Profile => show_profile(&config),
    }
}

fn run(config: &Config, dry_run: bool) -> Result<()> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let bus = EventBus::for_run(&run_id);
    logging::attach(&bus);
    let metrics = MetricsCollector::new()?;
    metrics.attach(&bus);

    let model = ModelClient::from_config(config, Arc::clone(&bus))?;
    let mut inbox = ImapInbox::from_config(&config.mail)?;
    let outbox = SmtpOutbox::from_config(&config.mail)?;
    let news = NewsApiClient::from_config(&config.news, Arc::clone(&bus));
    let weather = OpenWeatherClient::from_config(&config.weather);

    let options = RunOptions {
        subject_filter: config.mail.subject_filter.clone(),
        recipient: config.mail.recipient()?.to_string(),
        country: config.news.country.clone(),
        page_size: config.news.page_size,
        dry_run,
        time_of_day: None,
    };
    let services = Collaborators {
        model: &model,
        inbox: &mut inbox,
        outbox: &outbox,
        news: &news,
        weather: &weather,
    };
    let mut runner = Runner::new(
        services,
        ProfileStore::new(&config.storage.profile_path, Arc::clone(&bus)),
        InteractionLog::new(&config.storage.log_path),
        options,
        Arc::clone(&bus),
    );
    let result = runner.run();

    if let Some(path) = &config.storage.metrics_path {
        if let Err(e) = metrics.write_to(path) {
            tracing::warn!(error = %e, "metrics not written");
        }
    }

    let report = result?;
    if dry_run {
        println!("Subject: {}\n\n{}", report.digest.subject, report.digest.body);
    }
    Ok(())
}

fn show_profile(config: &Config) -> Result<()> {
    let bus = EventBus::new();
    logging::attach(&bus);
    let profile = ProfileStore::new(&config.storage.profile_path, bus).load();

    let json = serde_json::to_string_pretty(&profile).context("Failed to render profile")?;
    println!("{}", json);
    match planner::next_question(&profile) {
        Some(question) => println!("\nNext question ({}): {}", question.topic, question.text),
        None => println!("\nNo question next: {}", planner::skip_reason(&profile)),
    }
    Ok(())
}
