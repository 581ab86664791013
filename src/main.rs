use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use scoped_crawler::analytics::report::DEFAULT_TOP_WORDS;
use scoped_crawler::crawler::checkpoint::JsonCheckpointFile;
use scoped_crawler::crawler::fetcher::HttpFetcher;
use scoped_crawler::{CrawlConfig, CrawlReport, Crawler};

const CONFIG_FILE: &str = "crawler.json";

/// Dispatches to the requested mode (crawl or report).
#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    // Default to "crawl" if no command is given.
    let command = args.get(1).map_or("crawl", |s| s.as_str());

    match command {
        "crawl" => run_crawler(args.get(2).map(PathBuf::from)).await,
        "report" => run_report(&args[2..]),
        _ => print_usage(),
    }
}

fn load_config(path: Option<PathBuf>) -> Option<CrawlConfig> {
    let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    if !path.exists() {
        return Some(CrawlConfig::default());
    }
    match CrawlConfig::load(&path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error: {} ({})", e, path.display());
            None
        }
    }
}

fn init_logging(config: &CrawlConfig) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level.as_level())
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }
}

/// Runs a crawl session, resuming from the checkpoint file when present.
async fn run_crawler(config_path: Option<PathBuf>) {
    let Some(config) = load_config(config_path) else {
        return;
    };
    init_logging(&config);

    let fetcher = match HttpFetcher::from_config(&config) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    let sink = JsonCheckpointFile::new(&config.checkpoint_path);
    let crawler = if sink.exists() {
        match sink.load() {
            Ok(checkpoint) => Crawler::resume(&config, fetcher, checkpoint),
            Err(e) => {
                error!("Cannot read checkpoint {}: {}", sink.path().display(), e);
                return;
            }
        }
    } else {
        Crawler::from_config(&config, fetcher)
    };
    let mut crawler = match crawler {
        Ok(crawler) => crawler.with_checkpoint(Arc::new(sink)),
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing in-flight pages");
            stop.stop();
        }
    });

    match crawler.crawl().await {
        Ok(summary) => {
            println!(
                "Crawl {}: {} pages fetched, {} recorded, {} near-duplicates, {} failed",
                if summary.stopped { "stopped" } else { "finished" },
                summary.dispatched,
                summary.recorded,
                summary.near_duplicates,
                summary.failed
            );
            println!("Checkpoint saved to {}", config.checkpoint_path.display());
        }
        Err(e) => error!("Crawler finished with an error: {}", e),
    }
}

/// Prints the statistics stored in a checkpoint and exports them as CSV.
fn run_report(args: &[String]) {
    let path = args
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| CrawlConfig::default().checkpoint_path);
    let top_n = match args.get(1).map(|n| n.parse::<usize>()) {
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            eprintln!("Error: top_n must be a number");
            return;
        }
        None => DEFAULT_TOP_WORDS,
    };

    let checkpoint = match JsonCheckpointFile::new(&path).load() {
        Ok(checkpoint) => checkpoint,
        Err(e) => {
            eprintln!("Error: cannot read checkpoint '{}': {}", path.display(), e);
            eprintln!("Run a crawl first with: `cargo run -- crawl`");
            return;
        }
    };

    let report = CrawlReport::from_snapshot(&checkpoint.snapshot, top_n);
    print!("{}", report.render());

    let dir = path.parent().unwrap_or(Path::new("."));
    for (name, written) in [
        ("top_words.csv", report.write_words_csv(dir.join("top_words.csv"))),
        ("subdomains.csv", report.write_subdomains_csv(dir.join("subdomains.csv"))),
    ] {
        match written {
            Ok(()) => println!("Wrote {}", dir.join(name).display()),
            Err(e) => eprintln!("Failed to write {}: {}", name, e),
        }
    }
}

/// Prints the help message for the user.
fn print_usage() {
    println!("--- Scoped Crawler ---");
    println!("Usage: cargo run -- [COMMAND]");
    println!("\nCommands:");
    println!("  crawl [config.json]               Crawl the allowed domains (default).");
    println!("  report [checkpoint.json] [top_n]  Print statistics from a checkpoint.");
}
