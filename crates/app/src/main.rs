use std::fmt;
use std::io::{BufRead, Write};

use drill_core::model::{AnswerKey, ModuleNumber, User};
use services::{AppServices, ModuleCatalog, QuizEvent, QuizOutcome};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidModule { raw: String },
    InvalidSeconds { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "a command is required"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidModule { raw } => write!(f, "invalid --module value: {raw}"),
            ArgsError::InvalidSeconds { raw } => write!(f, "invalid --seconds value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- register --username <name> --password <pass> [--email <addr>]");
    eprintln!("  cargo run -p app -- login    --username <name> --password <pass>");
    eprintln!("  cargo run -p app -- logout");
    eprintln!("  cargo run -p app -- dashboard");
    eprintln!("  cargo run -p app -- study    --module <n> --seconds <s>");
    eprintln!("  cargo run -p app -- quiz     --module <n>");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --db <sqlite_url>      (default sqlite:drillmaster.sqlite3?mode=rwc)");
    eprintln!("  --modules <dir>        (default mcqs)");
    eprintln!("  --session <path>       (default user_data/session.json)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DRILL_DB_URL, DRILL_MODULES_DIR, DRILL_SESSION_FILE");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Register {
        username: String,
        password: String,
        email: Option<String>,
    },
    Login {
        username: String,
        password: String,
    },
    Logout,
    Dashboard,
    Study {
        module: ModuleNumber,
        seconds: u64,
    },
    Quiz {
        module: ModuleNumber,
    },
}

#[derive(Debug)]
struct Args {
    db_url: String,
    modules_dir: String,
    session_path: String,
    command: Command,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, ArgsError> {
    let command_name = raw.next().ok_or(ArgsError::MissingCommand)?;

    let mut db_url = std::env::var("DRILL_DB_URL")
        .unwrap_or_else(|_| "sqlite:drillmaster.sqlite3?mode=rwc".to_string());
    let mut modules_dir = std::env::var("DRILL_MODULES_DIR").unwrap_or_else(|_| "mcqs".to_string());
    let mut session_path = std::env::var("DRILL_SESSION_FILE")
        .unwrap_or_else(|_| "user_data/session.json".to_string());

    let mut username = None;
    let mut password = None;
    let mut email = None;
    let mut module = None;
    let mut seconds = None;

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--db" => db_url = require_value(&mut raw, "--db")?,
            "--modules" => modules_dir = require_value(&mut raw, "--modules")?,
            "--session" => session_path = require_value(&mut raw, "--session")?,
            "--username" => username = Some(require_value(&mut raw, "--username")?),
            "--password" => password = Some(require_value(&mut raw, "--password")?),
            "--email" => email = Some(require_value(&mut raw, "--email")?),
            "--module" => {
                let raw_value = require_value(&mut raw, "--module")?;
                module = Some(raw_value.parse::<ModuleNumber>().map_err(|_| {
                    ArgsError::InvalidModule { raw: raw_value }
                })?);
            }
            "--seconds" => {
                let raw_value = require_value(&mut raw, "--seconds")?;
                seconds = Some(raw_value.parse::<u64>().map_err(|_| {
                    ArgsError::InvalidSeconds { raw: raw_value }
                })?);
            }
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        }
    }

    let credentials = |flag: &'static str, value: Option<String>| {
        value.ok_or(ArgsError::MissingValue { flag })
    };

    let command = match command_name.as_str() {
        "register" => Command::Register {
            username: credentials("--username", username)?,
            password: credentials("--password", password)?,
            email,
        },
        "login" => Command::Login {
            username: credentials("--username", username)?,
            password: credentials("--password", password)?,
        },
        "logout" => Command::Logout,
        "dashboard" => Command::Dashboard,
        "study" => Command::Study {
            module: module.ok_or(ArgsError::MissingValue { flag: "--module" })?,
            seconds: seconds.ok_or(ArgsError::MissingValue { flag: "--seconds" })?,
        },
        "quiz" => Command::Quiz {
            module: module.ok_or(ArgsError::MissingValue { flag: "--module" })?,
        },
        other => return Err(ArgsError::UnknownCommand(other.to_string())),
    };

    Ok(Args {
        db_url,
        modules_dir,
        session_path,
        command,
    })
}

async fn current_user(services: &AppServices) -> Result<User, Box<dyn std::error::Error>> {
    Ok(services.auth.current_user().await.map_err(|e| {
        format!("no active session ({e}); log in first")
    })?)
}

async fn show_dashboard(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let user = current_user(services).await?;
    println!("Logged in as {}", user.username());

    let unlocked = services.progress.unlocked_modules(user.id()).await?;
    println!("Modules ({} total):", services.catalog.total_modules());
    for number in 1..=services.catalog.total_modules() {
        let module = ModuleNumber::new(number);
        let title = services.catalog.title(module).unwrap_or("(untitled)");
        let state = unlocked
            .iter()
            .find(|m| m.module_number == module)
            .map_or("locked", |m| if m.completed { "completed" } else { "open" });
        println!("  {number:>2}. {title:<40} [{state}]");
    }

    let stats = services.progress.stats_or_default(user.id()).await;
    println!(
        "Completed {} of {} | average score {:.2} | study time {}s",
        stats.completed_modules,
        services.catalog.total_modules(),
        stats.average_score,
        stats.total_study_time_secs
    );
    Ok(())
}

fn print_outcome(outcome: &QuizOutcome) {
    let verdict = if outcome.passed { "PASSED" } else { "FAILED" };
    let expired = if outcome.timed_out { " (time expired)" } else { "" };
    println!(
        "{verdict}{expired}: {}/{} in {}s, attempt #{}",
        outcome.score, outcome.total_questions, outcome.time_taken_secs, outcome.attempt_number
    );
    if let Some(next) = outcome.unlocked_next {
        println!("Module {next} unlocked.");
    }
}

async fn run_quiz(
    services: &AppServices,
    module: ModuleNumber,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = current_user(services).await?;
    let mut quiz = services.quiz.start(user.id(), module).await?;
    println!(
        "Quiz for module {module}: {} questions, pass at {}, {}s limit. Answer A-D, or q to quit.",
        services.quiz.policy().questions_per_quiz(),
        services.quiz.policy().pass_threshold(),
        services.quiz.policy().time_limit_secs()
    );

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        if let Some(outcome) = services.quiz.poll_timeout(&mut quiz).await? {
            println!("Time is up.");
            print_outcome(&outcome);
            return Ok(());
        }

        let Some(question) = quiz.session().current_question().cloned() else {
            break;
        };
        println!();
        println!(
            "Q{}/{}: {}",
            quiz.session().answered_count() + 1,
            quiz.session().total_questions(),
            question.text()
        );
        for option in question.options() {
            println!("  {option}");
        }
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            println!("Input closed; abandoning quiz (no attempt recorded).");
            services.quiz.abandon(quiz);
            return Ok(());
        };
        let input = line.trim().to_uppercase();
        if input == "Q" {
            println!("Abandoned; no attempt recorded.");
            services.quiz.abandon(quiz);
            return Ok(());
        }
        let Ok(key) = input.parse::<AnswerKey>() else {
            println!("Please answer A, B, C, or D.");
            continue;
        };

        services.quiz.select_answer(&mut quiz, key)?;
        let correct = services.quiz.submit(&mut quiz)?;
        println!("{}", if correct { "Hit." } else { "Miss." });

        if let QuizEvent::Completed(outcome) = services.quiz.advance(&mut quiz).await? {
            print_outcome(&outcome);
            return Ok(());
        }
    }

    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = ModuleCatalog::from_dir(&args.modules_dir)
        .map_err(|e| format!("failed to load module banks from {}: {e}", args.modules_dir))?;
    let services = AppServices::bootstrap(&args.db_url, catalog, args.session_path.as_str()).await?;
    tracing::debug!(db = %args.db_url, modules = services.catalog.total_modules(), "services ready");

    match args.command {
        Command::Register {
            username,
            password,
            email,
        } => {
            let user = services.auth.register(&username, &password, email).await?;
            println!("Registered {} (user id {}).", user.username(), user.id());
        }
        Command::Login { username, password } => {
            let user = services.auth.login(&username, &password).await?;
            println!("Welcome back, {}.", user.username());
        }
        Command::Logout => {
            services.auth.logout()?;
            println!("Logged out.");
        }
        Command::Dashboard => show_dashboard(&services).await?,
        Command::Study { module, seconds } => {
            let user = current_user(&services).await?;
            services
                .progress
                .record_study_time(user.id(), module, seconds)
                .await?;
            println!("Recorded {seconds}s of study on module {module}.");
        }
        Command::Quiz { module } => run_quiz(&services, module).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        parse_args(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn parses_register_command() {
        let args = parse(&[
            "register",
            "--username",
            "recruit",
            "--password",
            "correct-horse",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Register {
                username: "recruit".to_string(),
                password: "correct-horse".to_string(),
                email: None,
            }
        );
    }

    #[test]
    fn parses_quiz_command_with_db_override() {
        let args = parse(&["quiz", "--module", "3", "--db", "sqlite::memory:"]).unwrap();
        assert_eq!(
            args.command,
            Command::Quiz {
                module: ModuleNumber::new(3)
            }
        );
        assert_eq!(args.db_url, "sqlite::memory:");
    }

    #[test]
    fn rejects_missing_credentials() {
        let err = parse(&["login", "--username", "recruit"]).unwrap_err();
        assert!(matches!(err, ArgsError::MissingValue { flag: "--password" }));
    }

    #[test]
    fn rejects_bad_module_number() {
        let err = parse(&["quiz", "--module", "three"]).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidModule { .. }));
    }

    #[test]
    fn rejects_unknown_command() {
        let err = parse(&["shoot"]).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownCommand(_)));
    }
}
