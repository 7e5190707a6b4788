use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use borsen_digest::app::{Pipeline, RunOptions};
use borsen_digest::config::Config;
use borsen_digest::error::Result;
use borsen_digest::models::{Article, ProviderStatus, TextKind, TranslationMethod};
use borsen_digest::scheduler::{Scheduler, SchedulerStatus};

#[derive(Parser)]
#[command(name = "borsen-digest", version, about = "Børsen news digest")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the feeds and store new articles
    Fetch {
        /// Translation method: none, deepl, openai, huggingface, togetherai
        #[arg(long)]
        method: Option<TranslationMethod>,

        /// Skip fetching the article pages
        #[arg(long)]
        no_scrape: bool,
    },
    /// Show the most recent stored articles
    Latest {
        #[arg(short, long, default_value_t = 20)]
        n: usize,

        /// Only show articles whose title contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Translate a piece of Danish text
    Translate {
        text: String,

        #[arg(long)]
        method: Option<TranslationMethod>,

        /// Treat the text as a headline
        #[arg(long)]
        title: bool,
    },
    /// Delete articles older than the retention window
    Cleanup {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Delete every stored article
    Wipe {
        #[arg(long)]
        yes: bool,
    },
    /// Run fetches on the configured schedule until interrupted
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let pipeline = Arc::new(Pipeline::new(config.clone()).await?);

    match cli.command {
        Command::Fetch { method, no_scrape } => {
            let options = RunOptions {
                method: method.unwrap_or(config.translation_method),
                scrape: config.scrape_enabled && !no_scrape,
            };
            let summary = pipeline.run(options).await?;

            println!("{}", summary.describe());
            println!(
                "Fetched {}, scraped {}, translated {}, removed {} expired",
                summary.fetched, summary.scraped, summary.translated, summary.deleted_by_retention
            );
            if summary.translation_status == ProviderStatus::NoApiKey {
                println!("No API key configured for {}, summaries were not translated", options.method);
            }
            for error in &summary.errors {
                println!("  {:?} {}: {}", error.stage, error.link, error.message);
            }
        }
        Command::Latest { n, search } => {
            let articles = match search {
                Some(term) => pipeline.search(&term, n).await?,
                None => pipeline.load_latest(n).await?,
            };
            if articles.is_empty() {
                println!("No articles stored");
            }
            for article in &articles {
                print_article(article);
            }
        }
        Command::Translate { text, method, title } => {
            let method = method.unwrap_or(config.translation_method);
            if pipeline.translation_status(method) == ProviderStatus::NoApiKey {
                eprintln!("No API key configured for {}", method);
            }
            let kind = if title { TextKind::Title } else { TextKind::Content };
            println!("{}", pipeline.translate_text(&text, method, kind).await);
        }
        Command::Cleanup { days } => {
            let days = days.unwrap_or(config.retention_days);
            let deleted = pipeline.cleanup_old_articles(days).await?;
            println!("Deleted {} articles older than {} days", deleted, days);
        }
        Command::Wipe { yes } => {
            if !yes {
                return Err(anyhow::anyhow!("Refusing to delete all articles without --yes").into());
            }
            let deleted = pipeline.delete_all_articles().await?;
            println!("Deleted {} articles", deleted);
        }
        Command::Schedule => {
            let scheduler = Scheduler::new(
                Arc::clone(&pipeline),
                config.schedule.clone(),
                config.schedule_tz()?,
            );
            scheduler.start().await?;
            print_status(&scheduler.status().await);

            tokio::signal::ctrl_c().await?;

            scheduler.stop().await?;
            print_status(&scheduler.status().await);
        }
    }

    Ok(())
}

fn print_article(article: &Article) {
    let published = article
        .published
        .map(|p| p.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("{}  {}", published, article.title);
    println!("    {}", article.link);
    if let Some(summary) = article.translated_summary.as_deref().filter(|s| !s.is_empty()) {
        println!("    {}", summary);
    }
}

fn print_status(status: &SchedulerStatus) {
    println!("Scheduler running: {}", status.is_running);
    if let Some(next) = status.next_scheduled_time {
        println!("Next run: {}", next.format("%Y-%m-%d %H:%M %Z"));
    }
    if let Some(last) = status.last_run_time {
        println!(
            "Last run: {} ({})",
            last.format("%Y-%m-%d %H:%M UTC"),
            status.last_run_outcome.as_deref().unwrap_or("")
        );
    }
    println!("Runs so far: {}", status.run_count);
}
