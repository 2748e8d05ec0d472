//! `fairytrail` — drive the visitor instrumentation from a terminal.
//!
//! Records live in a DuckDB file under `FAIRYTRAIL_DATA_DIR`, standing in
//! for a browser's local storage, so a sequence of invocations behaves like
//! one visitor browsing the site.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use fairytrail_client::{client::ApiClient, config::Config, forms::SignupForm};
use fairytrail_core::{context::PageContext, copy_cache::CopyCache, tracker::Tracker};
use fairytrail_duckdb::DuckDbStore;

#[derive(Parser, Debug)]
#[command(name = "fairytrail", about = "Visitor attribution and journey tracking")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a page: capture attribution, record the page view, send a beacon.
    Visit {
        /// Page URL or path+query, e.g. `/?utm_source=newsletter`.
        #[arg(long)]
        url: String,
        #[arg(long)]
        referrer: Option<String>,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Report scroll depth (percent) on the current page.
    Scroll { percent: u8 },
    /// Record a call-to-action click on the current page.
    Click {
        element: String,
        #[arg(long)]
        text: Option<String>,
    },
    /// Print the signup snapshot as JSON.
    Snapshot {
        #[arg(long, default_value = "/signup")]
        url: String,
    },
    /// Print the persisted visitor id.
    VisitorId,
    /// Print the current copy sections as JSON.
    Copy,
    /// Wipe attribution, journey and visitor id.
    Reset,
    /// Validate and submit the signup form with the current snapshot.
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        child_name: Option<String>,
        #[arg(long, default_value = "/signup")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Structured JSON logs on stderr; stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fairytrail=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("creating data dir {}", cfg.data_dir))?;
    let db_path = format!("{}/fairytrail.db", cfg.data_dir);
    let storage = Arc::new(DuckDbStore::open(&db_path, &cfg.duckdb_memory_limit)?);
    storage
        .ping()
        .with_context(|| format!("storage at {db_path} is not usable"))?;

    let tracker = Tracker::new(storage, cfg.site());
    let api = ApiClient::new(&cfg.api_url);

    match args.command {
        Command::Visit {
            url,
            referrer,
            title,
        } => {
            let mut ctx = PageContext::new(url);
            ctx.referrer = referrer;
            let load = tracker.on_page_load(&ctx, &title);
            info!(path = %load.beacon.path, attribution = ?load.attribution, "page loaded");
            if let Some(handle) = api.track_page_view(load.beacon) {
                // Delivery outcome is irrelevant; only keep the process alive for it.
                let _ = handle.await;
            }
        }
        Command::Scroll { percent } => tracker.on_scroll(percent),
        Command::Click { element, text } => {
            let beacon = tracker.on_cta_click(&element, text.as_deref());
            if let Some(handle) = api.track_event(beacon) {
                let _ = handle.await;
            }
        }
        Command::Snapshot { url } => {
            let snapshot = tracker.signup_snapshot(&PageContext::new(url));
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::VisitorId => println!("{}", tracker.visitor_id()),
        Command::Copy => {
            let cache = CopyCache::new(cfg.copy_ttl());
            let sections = api.fetch_copy(&cache).await;
            println!("{}", serde_json::to_string_pretty(&sections)?);
        }
        Command::Reset => {
            tracker.reset();
            info!("visitor records cleared");
        }
        Command::Signup {
            name,
            email,
            child_name,
            url,
        } => {
            let form = SignupForm {
                name,
                email,
                child_name,
            };
            match api
                .signup_from(&tracker, form, &PageContext::new(url))
                .await
            {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
