mod aggregate;
mod api_types;
mod classify;
mod dispatch;
mod fetch;
mod filter;
mod models;
mod normalize;
mod pipeline;
mod query;
mod stage;
mod store;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use pipeline::RunConfig;

/// Social media sentiment funnel analyzer: filter posts with a boolean
/// query, classify emotions, and aggregate weekly funnel metrics.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Boolean search query, e.g. `hydration AND (bottle OR flask) NOT broken`
    query: String,

    /// Load raw posts from a previously saved CSV instead of searching Bluesky
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Root directory for raw/processed CSVs and viz JSON
    #[arg(short, long, default_value = "data")]
    output_dir: PathBuf,

    /// Maximum number of posts to retrieve from Bluesky
    #[arg(short = 'n', long, default_value_t = 1000)]
    limit: usize,

    /// Earliest post date, inclusive (YYYY-MM-DD)
    #[arg(long, default_value = "2025-01-01")]
    date_start: String,

    /// Latest post date, inclusive (YYYY-MM-DD)
    #[arg(long, default_value = "2025-07-31")]
    date_end: String,

    /// Texts per inference batch
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Concurrent inference calls
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Replace a top-ranked `neutral` emotion with the runner-up label
    #[arg(long)]
    suppress_neutral: bool,

    /// Hard character cap on classifier input
    #[arg(long, default_value_t = 512)]
    max_text_len: usize,

    /// Text-classification model to use for emotion labeling
    #[arg(long, default_value = classify::DEFAULT_MODEL)]
    model: String,

    /// Path to JSON file with Bluesky `identifier` and `app_password`
    /// (env vars BSKY_IDENTIFIER / BSKY_APP_PASSWORD take precedence)
    #[arg(long, default_value = "auth.json")]
    auth: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    info!("Starting loyalty-funnel");

    let args = Args::parse();

    let cfg = RunConfig {
        query: args.query,
        input: args.input,
        output_dir: args.output_dir,
        limit: args.limit,
        date_start: args.date_start,
        date_end: args.date_end,
        batch_size: args.batch_size,
        concurrency: args.concurrency,
        suppress_neutral: args.suppress_neutral,
        max_text_len: args.max_text_len,
        model: args.model,
        auth: args.auth,
    };

    pipeline::run(cfg).await
}
