mod terminal;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use quiz_core::QuizOptions;
use quiz_core::model::UserId;
use services::{
    AttemptHistoryService, AuthState, Clock, HttpAttemptStore, HttpStoreConfig, QuizLoopService,
};
use storage::JsonFileBank;
use storage::repository::AttemptStore;
use storage::sqlite::SqliteRepository;

const DEFAULT_DB_URL: &str = "sqlite://quiz.sqlite3";
const DEFAULT_MODULE: &str = "quiz";
const DEFAULT_HISTORY_LIMIT: u32 = 10;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    MissingBank,
    MissingUser,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::MissingBank => write!(f, "a question bank is required (--bank or QUIZ_BANK)"),
            ArgsError::MissingUser => write!(f, "history needs a user (--user or QUIZ_USER)"),
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

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz [run] --bank <path> [--db <sqlite_url>] [--count <n>] [--time-limit <secs>]");
    eprintln!("             [--user <id>] [--module <name>] [--shuffle]");
    eprintln!("  quiz history --user <id> [--db <sqlite_url>] [--limit <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --module {DEFAULT_MODULE}");
    eprintln!("  --limit {DEFAULT_HISTORY_LIMIT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_BANK, QUIZ_DB_URL, QUIZ_COUNT, QUIZ_TIME_LIMIT, QUIZ_USER, QUIZ_MODULE");
    eprintln!("  QUIZ_API_BASE_URL, QUIZ_API_TOKEN  # save attempts remotely instead of SQLite");
    eprintln!("  RUST_LOG                           # log verbosity");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    bank: Option<PathBuf>,
    db_url: String,
    count: Option<usize>,
    time_limit: Option<u32>,
    user: Option<UserId>,
    module: String,
    shuffle: bool,
    history_limit: u32,
}

impl Args {
    /// Environment first, then flags on top.
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let mut parsed = Self {
            bank: env("QUIZ_BANK").map(PathBuf::from),
            db_url: env("QUIZ_DB_URL").map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
            count: env("QUIZ_COUNT").and_then(|v| v.trim().parse().ok()),
            time_limit: env("QUIZ_TIME_LIMIT").and_then(|v| v.trim().parse().ok()),
            user: env("QUIZ_USER").and_then(|v| v.parse().ok()),
            module: env("QUIZ_MODULE").unwrap_or_else(|| DEFAULT_MODULE.into()),
            shuffle: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--bank" => parsed.bank = Some(PathBuf::from(require_value(args, "--bank")?)),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--count" => {
                    parsed.count = Some(parse_number("--count", require_value(args, "--count")?)?);
                }
                "--time-limit" => {
                    let value = require_value(args, "--time-limit")?;
                    parsed.time_limit = Some(parse_number("--time-limit", value)?);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let user = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?;
                    parsed.user = Some(user);
                }
                "--module" => parsed.module = require_value(args, "--module")?,
                "--limit" => {
                    parsed.history_limit =
                        parse_number("--limit", require_value(args, "--limit")?)?;
                }
                "--shuffle" => parsed.shuffle = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn quiz_options(&self) -> QuizOptions {
        let mut options = QuizOptions::default().with_shuffle(self.shuffle);
        if let Some(count) = self.count {
            options = options.with_limit_count(count);
        }
        if let Some(secs) = self.time_limit {
            options = options.with_time_limit(secs);
        }
        options
    }
}

fn normalize_sqlite_url(raw: String) -> String {
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

async fn open_sqlite(db_url: &str) -> Result<SqliteRepository, Box<dyn std::error::Error>> {
    ensure_db_dir(db_url)?;
    Ok(SqliteRepository::open(db_url).await?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means run.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
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
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    match cmd {
        Command::Run => {
            let bank_path = parsed.bank.clone().ok_or(ArgsError::MissingBank)?;
            let attempts: Arc<dyn AttemptStore> = match HttpStoreConfig::from_env() {
                Some(config) => {
                    log::info!("saving attempts to {}", config.base_url);
                    Arc::new(HttpAttemptStore::new(config))
                }
                None => Arc::new(open_sqlite(&parsed.db_url).await?),
            };

            let service = QuizLoopService::new(
                Clock::system(),
                Arc::new(JsonFileBank::new(bank_path)),
                attempts,
                Arc::new(AuthState::from_user(parsed.user.clone())),
            )
            .with_module(parsed.module.clone())
            .with_options(parsed.quiz_options());

            terminal::run_quiz(&service).await
        }
        Command::History => {
            let user = parsed.user.clone().ok_or(ArgsError::MissingUser)?;
            let repo = open_sqlite(&parsed.db_url).await?;
            let history = AttemptHistoryService::new(Arc::new(repo));
            let items = history.list_recent(&user, parsed.history_limit).await?;

            if items.is_empty() {
                println!("No saved attempts for {user}.");
            }
            for item in items {
                println!(
                    "#{}  {}  {:<12} {:>3}%  {}/{}  {}",
                    item.id,
                    item.saved_at.format("%Y-%m-%d %H:%M"),
                    item.module,
                    item.score_percentage,
                    item.correct_answers,
                    item.total_questions,
                    item.time_taken_label()
                );
            }
            Ok(())
        }
    }
}

/// `SQLite` creates a missing database file but not its directory.
fn ensure_db_dir(db_url: &str) -> std::io::Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::parse(&mut iter)
    }

    #[test]
    fn flags_build_quiz_options() {
        let args = parse(&[
            "--bank",
            "bank.json",
            "--count",
            "5",
            "--time-limit",
            "90",
            "--shuffle",
            "--user",
            "ada",
            "--module",
            "geo",
        ])
        .unwrap();

        assert_eq!(args.bank, Some(PathBuf::from("bank.json")));
        assert_eq!(args.user, Some(UserId::new("ada")));
        assert_eq!(args.module, "geo");
        assert_eq!(
            args.quiz_options(),
            QuizOptions::default()
                .with_limit_count(5)
                .with_time_limit(90)
                .with_shuffle(true)
        );
    }

    #[test]
    fn rejects_bad_numbers_and_unknown_flags() {
        assert!(matches!(
            parse(&["--count", "many"]),
            Err(ArgsError::InvalidNumber { flag: "--count", .. })
        ));
        assert!(matches!(
            parse(&["--time-limit"]),
            Err(ArgsError::MissingValue { flag: "--time-limit" })
        ));
        assert!(matches!(parse(&["--nope"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(
            parse(&["--user", "  "]),
            Err(ArgsError::InvalidUser { .. })
        ));
    }

    #[test]
    fn sqlite_urls_are_normalized() {
        assert_eq!(
            normalize_sqlite_url("sqlite://already.db".into()),
            "sqlite://already.db"
        );
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert!(normalize_sqlite_url("sqlite:rel.db".into()).ends_with("/rel.db"));
    }
}
