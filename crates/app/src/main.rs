use std::fmt;
use std::path::{Path, PathBuf};

use services::assets::AssetConfig;
use services::{AppServices, Clock, SessionMode};
use tracing_subscriber::EnvFilter;

mod quiz;

const DEFAULT_DB_URL: &str = "sqlite://voca.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingPath,
    UnknownArg(String),
    UnknownCommand(String),
    InvalidMode { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingPath => f.write_str("import requires a CSV path"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidMode { raw } => {
                write!(f, "invalid --mode value (expected all, short or wrong): {raw}")
            }
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

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Import { path: PathBuf, name: Option<String> },
    Quiz { mode: SessionMode },
    Export { wrong: bool, out: Option<PathBuf> },
    Wrong {
        clear: bool,
        stat: Option<String>,
        reset: Option<String>,
        reset_all: bool,
    },
    Status,
    Prune { audio: bool, images: bool },
}

struct Args {
    db_url: String,
    command: Command,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  voca import <file.csv> [--name <deck>]   Replace the deck with a CSV");
    eprintln!("  voca quiz [--mode all|short|wrong]       Run a session on stdin");
    eprintln!("  voca export [--wrong] [--out <path>]     Write the deck or wrong list as CSV");
    eprintln!("  voca wrong [--clear] [--stat <word>] [--reset <word>] [--reset-all]");
    eprintln!("  voca status                              Deck, wrong list and cache overview");
    eprintln!("  voca prune [--audio] [--images]          Drop old audio, or clear whole caches");
    eprintln!();
    eprintln!("Every subcommand accepts --db <sqlite_url> (default: {DEFAULT_DB_URL}).");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  VOCA_DB_URL, VOCA_DICTIONARY_URL, VOCA_SPEECH_URL, VOCA_IMAGE_URL,");
    eprintln!("  VOCA_ARCHIVE_URL, VOCA_ARCHIVE_RAW_BASE, VOCA_IMAGE_MIN_WRONG,");
    eprintln!("  VOCA_AUDIO_MAX_AGE_DAYS, RUST_LOG");
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("VOCA_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);

        let Some(sub) = args.next() else {
            print_usage();
            std::process::exit(0);
        };
        if matches!(sub.as_str(), "--help" | "-h" | "help") {
            print_usage();
            std::process::exit(0);
        }

        let mut positional: Vec<String> = Vec::new();
        let mut name = None;
        let mut mode = SessionMode::default();
        let mut wrong = false;
        let mut out = None;
        let mut clear = false;
        let mut stat = None;
        let mut reset = None;
        let mut reset_all = false;
        let mut audio = false;
        let mut images = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--name" => name = Some(require_value(&mut args, "--name")?),
                "--mode" => {
                    let value = require_value(&mut args, "--mode")?;
                    mode = SessionMode::parse(&value)
                        .ok_or_else(|| ArgsError::InvalidMode { raw: value.clone() })?;
                }
                "--wrong" => wrong = true,
                "--out" => out = Some(PathBuf::from(require_value(&mut args, "--out")?)),
                "--clear" => clear = true,
                "--stat" => stat = Some(require_value(&mut args, "--stat")?),
                "--reset" => reset = Some(require_value(&mut args, "--reset")?),
                "--reset-all" => reset_all = true,
                "--audio" => audio = true,
                "--images" => images = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if !arg.starts_with("--") && sub == "import" => positional.push(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match sub.as_str() {
            "import" => {
                let path = positional
                    .into_iter()
                    .next()
                    .map(PathBuf::from)
                    .ok_or(ArgsError::MissingPath)?;
                Command::Import { path, name }
            }
            "quiz" => Command::Quiz { mode },
            "export" => Command::Export { wrong, out },
            "wrong" => Command::Wrong {
                clear,
                stat,
                reset,
                reset_all,
            },
            "status" => Command::Status,
            "prune" => Command::Prune { audio, images },
            _ => return Err(ArgsError::UnknownCommand(sub)),
        };

        Ok(Self { db_url, command })
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
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
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

    let path = Path::new(path);
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn write_output(out: Option<&Path>, text: &str) -> std::io::Result<()> {
    match out {
        Some(path) => tokio::fs::write(path, format!("{text}\n")).await,
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();
    let config = AssetConfig::from_env()?;

    prepare_sqlite_file(&args.db_url)?;
    let app = AppServices::new_sqlite(&args.db_url, Clock::default(), config).await?;
    let decks = app.deck_service();

    match args.command {
        Command::Import { path, name } => {
            let csv = tokio::fs::read_to_string(&path).await?;
            let name = name.unwrap_or_else(|| {
                path.file_stem()
                    .map_or_else(|| "deck".into(), |s| s.to_string_lossy().into_owned())
            });
            let deck = decks.import_csv(&name, &csv).await?;
            println!("Imported {} words into deck {}", deck.len(), deck.name());
        }
        Command::Quiz { mode } => quiz::run(&app, mode).await?,
        Command::Export { wrong, out } => {
            let csv = if wrong {
                decks.wrong_log_csv().await?
            } else {
                decks.export_csv().await?
            };
            write_output(out.as_deref(), &csv).await?;
        }
        Command::Wrong {
            clear,
            stat,
            reset,
            reset_all,
        } => {
            if let Some(word) = stat {
                match decks.wrong_stat(&word).await? {
                    Some(s) => println!(
                        "{}: missed {} times, last {}",
                        s.word(),
                        s.wrong_count(),
                        s.last_wrong_at().to_rfc3339()
                    ),
                    None => println!("{word}: never missed"),
                }
            } else if let Some(word) = reset {
                let removed = decks.reset_wrong_stat(&word).await?;
                println!("{word}: {}", if removed { "reset" } else { "nothing to reset" });
            } else if reset_all {
                println!("Reset {} wrong counters", decks.reset_all_wrong_stats().await?);
            } else if clear {
                decks.clear_wrong_log().await?;
                println!("Wrong list cleared");
            } else {
                let csv = decks.wrong_log_csv().await?;
                if csv.is_empty() {
                    println!("Wrong list is empty");
                } else {
                    println!("{csv}");
                }
            }
        }
        Command::Status => {
            match decks.current_deck().await? {
                Some(deck) => println!("Deck: {} ({} words)", deck.name(), deck.len()),
                None => println!("Deck: none imported"),
            }
            let session_loop = app.session_loop();
            println!("Wrong list: {} words", session_loop.pending_wrong().await?.len());
            if let Some(checkpoint) = session_loop.resumable().await? {
                println!(
                    "Saved session: {} at {}",
                    checkpoint.deck_name,
                    checkpoint.saved_at.to_rfc3339()
                );
            }
            println!(
                "Cached: {} audio, {} images",
                app.audio().cached_count().await?,
                app.images().cached_count().await?
            );
        }
        Command::Prune { audio, images } => {
            if audio {
                println!("Cleared {} audio entries", app.audio().clear_cache().await?);
            } else {
                println!("Pruned {} audio entries", app.prune_audio().await?);
            }
            if images {
                println!("Cleared {} images", app.images().clear_cache().await?);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn import_takes_a_path_and_optional_name() {
        let args = parse(&["import", "words.csv", "--name", "animals", "--db", "sqlite://x.db"])
            .unwrap();
        assert_eq!(args.db_url, "sqlite://x.db");
        assert_eq!(
            args.command,
            Command::Import {
                path: PathBuf::from("words.csv"),
                name: Some("animals".into())
            }
        );
        assert!(matches!(parse(&["import"]), Err(ArgsError::MissingPath)));
    }

    #[test]
    fn quiz_mode_is_validated() {
        let args = parse(&["quiz", "--mode", "wrong"]).unwrap();
        assert_eq!(
            args.command,
            Command::Quiz {
                mode: SessionMode::WrongOnly
            }
        );
        assert!(matches!(
            parse(&["quiz", "--mode", "weekly"]),
            Err(ArgsError::InvalidMode { .. })
        ));
    }

    #[test]
    fn prune_can_clear_each_cache() {
        assert_eq!(
            parse(&["prune"]).unwrap().command,
            Command::Prune {
                audio: false,
                images: false
            }
        );
        assert_eq!(
            parse(&["prune", "--audio", "--images"]).unwrap().command,
            Command::Prune {
                audio: true,
                images: true
            }
        );
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(matches!(parse(&["fly"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(
            parse(&["status", "--verbose"]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            parse(&["quiz", "extra"]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            parse(&["export", "--out"]),
            Err(ArgsError::MissingValue { flag: "--out" })
        ));
    }

    #[test]
    fn relative_db_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/voca.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/voca.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
