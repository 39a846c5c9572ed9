//! ForensicBuddy - CLI entry point

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use forensicbuddy::agent::{Answer, ChatTurn};
use forensicbuddy::bootstrap;
use forensicbuddy::cli::{parse_records, replace_category, Args, Commands};
use forensicbuddy::config::Config;
use forensicbuddy::store::Category;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    init_tracing(&args, &config);

    match &args.command {
        Commands::Ask {
            query,
            history,
            json,
        } => ask(&config, query, history.as_deref(), *json).await?,
        Commands::Ingest { category, file } => ingest(&config, category, file).await?,
        Commands::Clear { category } => clear(&config, category).await?,
        Commands::Stats => stats(&config).await?,
        Commands::Config { init } => show_config(&args, &config, *init)?,
    }

    Ok(())
}

/// RUST_LOG wins, then -v/-q, then `logging.level`
fn init_tracing(args: &Args, config: &Config) {
    let fallback = args
        .verbosity()
        .filter()
        .unwrap_or(config.logging.level.as_str())
        .to_string();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_category(name: &str) -> Result<Category> {
    name.parse::<Category>().with_context(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        format!("Unknown category '{}' (expected one of: {})", name, known.join(", "))
    })
}

fn load_history(path: Option<&Path>) -> Result<Vec<ChatTurn>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    serde_json::from_str(&raw).context("History file must be a JSON array of turns")
}

async fn ask(config: &Config, query: &str, history: Option<&Path>, json: bool) -> Result<()> {
    let history = load_history(history)?;
    let assistant = bootstrap::build_assistant(config)
        .await
        .context("Failed to initialise the case assistant")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.set_message("Analysing the case documents...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let deadline = Duration::from_secs(config.agents.query_timeout_secs);
    let result = assistant.answer_within(deadline, query, &history).await;
    spinner.finish_and_clear();
    let answer = result.context("Query failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer)?;
    }
    Ok(())
}

fn print_answer(answer: &Answer) -> Result<()> {
    println!("\n{}\n", answer.text);

    if let Some(chart) = answer.chart() {
        println!("{}", "Chart:".bold());
        println!("{}\n", serde_json::to_string_pretty(chart)?);
    }

    if !answer.sources.is_empty() {
        println!("{}", "Sources:".bold());
        for source in &answer.sources {
            let page = source
                .page
                .map(|p| format!(", p. {}", p))
                .unwrap_or_default();
            println!(
                "  {} {}{} ({})",
                "•".cyan(),
                source.filename,
                page,
                source.category.as_str().dimmed()
            );
        }
        println!();
    }

    let agents: Vec<&str> = answer.agents_used.iter().map(|a| a.as_str()).collect();
    println!("{} {}", "Agents:".bold(), agents.join(", ").green());
    for failure in &answer.failed_agents {
        println!(
            "  {} {} ({}): {}",
            "✗".red(),
            failure.agent,
            failure.kind,
            failure.message.dimmed()
        );
    }
    Ok(())
}

async fn ingest(config: &Config, category: &str, file: &Path) -> Result<()> {
    let category = parse_category(category)?;
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
    );
    let records = parse_records(reader, category)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    if records.is_empty() {
        bail!("{} contains no records", file.display());
    }

    let store = bootstrap::build_store(config).await?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );
    pb.set_message(category.as_str().to_string());

    let total = replace_category(
        &store,
        category,
        records,
        config.embedding.batch_size,
        |stored| pb.inc(stored as u64),
    )
    .await
    .with_context(|| format!("Failed to ingest into {}", category))?;
    pb.finish_and_clear();

    println!(
        "{} {} records ingested into {}",
        "✓".green(),
        total,
        category.as_str().bold()
    );
    Ok(())
}

async fn clear(config: &Config, category: &str) -> Result<()> {
    let category = parse_category(category)?;
    let store = bootstrap::build_store(config).await?;
    store.clear(category).await?;
    println!("{} Cleared {}", "✓".green(), category.as_str().bold());
    Ok(())
}

async fn stats(config: &Config) -> Result<()> {
    let store = bootstrap::build_store(config).await?;
    println!("{}", "Records per category:".bold());
    for category in Category::ALL {
        let count = store.count(category).await?;
        println!("  {:<20} {}", category.as_str(), count);
    }
    Ok(())
}

fn show_config(args: &Args, config: &Config, init: bool) -> Result<()> {
    if init {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => Config::default_path().context("Could not determine home directory")?,
        };
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        Config::default().save(&path)?;
        println!("{} Wrote default configuration to {}", "✓".green(), path.display());
        return Ok(());
    }

    println!("{}", toml::to_string_pretty(config).context("Failed to render config")?);
    Ok(())
}
