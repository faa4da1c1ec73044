mod config;
mod review;
mod seed;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use config::{Args, Command, prepare_sqlite_file};
use review_core::model::SessionKey;
use services::{Clock, ReviewSessionService};
use storage::repository::Storage;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- review [--db <sqlite_url>] --lang <code> [--day YYYY-MM-DD]");
    eprintln!("  cargo run -p app -- seed   [--db <sqlite_url>] --lang <code> --file <cards.tsv> [--goal <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {}", config::DEFAULT_DB_URL);
    eprintln!("  --day today (days start at 04:00 local time)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  REVIEW_DB_URL, REVIEW_LANG, REVIEW_DAY, REVIEW_SEED_FILE, RUST_LOG");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means review.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Review,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Review,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(cmd, &mut iter, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    info!(db = %parsed.db_url, language = %parsed.language, ?cmd, "starting");

    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let clock = Clock::default_clock();

    match cmd {
        Command::Review => {
            let key = SessionKey::new(
                parsed.language,
                parsed.day.unwrap_or_else(|| clock.today()),
            );
            let service = ReviewSessionService::new(clock, storage.clone());
            review::run(&service, &storage, key).await
        }
        Command::Seed => {
            let Some(path) = parsed.seed_file.as_deref() else {
                return Err(config::ArgsError::MissingSeedFile.into());
            };
            let imported = seed::import(&storage, &clock, parsed.language, parsed.goal, path).await?;
            println!("imported {imported} cards into {}", parsed.language);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
