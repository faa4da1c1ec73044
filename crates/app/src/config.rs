use std::fmt;
use std::path::PathBuf;

use review_core::model::{Language, ReviewDay};

pub const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingLanguage,
    MissingSeedFile,
    InvalidLanguage { raw: String },
    InvalidDay { raw: String },
    InvalidGoal { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingLanguage => write!(f, "a deck language is required (--lang or REVIEW_LANG)"),
            ArgsError::MissingSeedFile => write!(f, "seed needs a card file (--file or REVIEW_SEED_FILE)"),
            ArgsError::InvalidLanguage { raw } => write!(f, "invalid --lang value: {raw}"),
            ArgsError::InvalidDay { raw } => write!(f, "invalid --day value: {raw} (expected YYYY-MM-DD)"),
            ArgsError::InvalidGoal { raw } => write!(f, "invalid --goal value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Review,
    Seed,
}

impl Command {
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "review" => Some(Self::Review),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub db_url: String,
    pub language: Language,
    /// `None` means today by the local clock.
    pub day: Option<ReviewDay>,
    pub seed_file: Option<PathBuf>,
    pub goal: Option<u32>,
}

impl Args {
    /// Parse flags for `command`, falling back to `env` for anything not
    /// given on the command line.
    pub fn parse(
        command: Command,
        args: &mut impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("REVIEW_DB_URL").map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut language = env("REVIEW_LANG");
        let mut day = env("REVIEW_DAY");
        let mut seed_file = env("REVIEW_SEED_FILE").map(PathBuf::from);
        let mut goal = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--lang" => language = Some(require_value(args, "--lang")?),
                "--day" => day = Some(require_value(args, "--day")?),
                "--file" if command == Command::Seed => {
                    seed_file = Some(PathBuf::from(require_value(args, "--file")?));
                }
                "--goal" if command == Command::Seed => {
                    let value = require_value(args, "--goal")?;
                    let parsed = value
                        .parse::<u32>()
                        .ok()
                        .filter(|goal| *goal > 0)
                        .ok_or(ArgsError::InvalidGoal { raw: value })?;
                    goal = Some(parsed);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let raw = language.ok_or(ArgsError::MissingLanguage)?;
        let language = raw
            .parse::<Language>()
            .map_err(|_| ArgsError::InvalidLanguage { raw })?;
        let day = day
            .map(|raw| raw.parse::<ReviewDay>().map_err(|_| ArgsError::InvalidDay { raw }))
            .transpose()?;
        if command == Command::Seed && seed_file.is_none() {
            return Err(ArgsError::MissingSeedFile);
        }

        Ok(Self {
            db_url,
            language,
            day,
            seed_file,
            goal,
        })
    }
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and its directory) so sqlx can open it.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}
