//! poinsiswa - record and review student violation and achievement points
//! from the terminal.

mod app;
mod commands;

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use poinsiswa_core::config::Config;
use poinsiswa_core::models::PointKind;
use poinsiswa_core::policy::{guard, Route, RouteDecision};
use poinsiswa_core::LedgerError;

use app::App;
use commands::RecordArgs;

/// Log file prefix inside the cache directory (rotated daily).
const LOG_FILE: &str = "poinsiswa.log";

#[derive(Parser)]
#[command(name = "poinsiswa", version)]
#[command(about = "Catat poin pelanggaran dan prestasi siswa")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
        /// Keep the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Sign out
    Logout {
        /// Also delete the remembered password
        #[arg(long)]
        forget: bool,
    },
    /// Show the signed-in account
    Whoami,
    /// Figures for your role
    Dashboard,
    /// List the students of a classroom (your own by default)
    Students {
        #[arg(long)]
        classroom: Option<String>,
    },
    /// Record a violation or achievement
    Record {
        #[arg(long)]
        student: String,
        /// violation | achievement (pelanggaran | prestasi)
        #[arg(long, value_parser = parse_kind)]
        kind: PointKind,
        #[arg(long, allow_negative_numbers = true)]
        points: i64,
        #[arg(long)]
        description: String,
        /// Submission key; repeating a key never records twice
        #[arg(long)]
        key: Option<String>,
        /// Ask for follow-up advice after recording
        #[arg(long)]
        advice: bool,
    },
    /// Point totals and history (your own, or a student's)
    Points {
        #[arg(long)]
        student: Option<String>,
    },
    /// Follow-up advice for a recorded event
    Advice { event_id: String },
    /// Recompute a student's totals from the event log
    Reconcile {
        #[arg(long)]
        student: String,
    },
}

impl Command {
    fn route(&self) -> Route {
        match self {
            Command::Login { .. } => Route::Login,
            Command::Logout { .. } | Command::Whoami => Route::Profile,
            Command::Dashboard => Route::Dashboard,
            Command::Students { classroom: Some(_) } => Route::ManageClasses,
            Command::Students { classroom: None } => Route::MyStudents,
            Command::Record { .. } | Command::Advice { .. } => Route::AddRecord,
            Command::Points { student: Some(_) } => Route::MyStudents,
            Command::Points { student: None } => Route::MyPoints,
            Command::Reconcile { .. } => Route::ManageClasses,
        }
    }
}

fn parse_kind(s: &str) -> Result<PointKind, String> {
    s.parse().map_err(|e: LedgerError| e.to_string())
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE));
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

/// A stored session the backend no longer accepts must not stand in the way
/// of signing in again; everywhere else it is an error.
fn usable_session<T>(resolved: Result<Option<T>>, route: Route) -> Result<Option<T>> {
    match resolved {
        Err(e) if route == Route::Login && matches!(e.downcast_ref::<LedgerError>(), Some(LedgerError::Auth(_))) => {
            warn!(error = %e, "Saved session is no longer usable");
            Ok(None)
        }
        other => other,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = App::load_config();

    if let Command::Logout { forget } = cli.command {
        match App::new(config.clone()) {
            Ok(mut app) => app.logout(forget).await,
            Err(e) => {
                warn!(error = %e, "Backend unavailable, clearing the local session only");
                App::logout_local(&config, forget)?;
            }
        }
        println!("Signed out.");
        return Ok(());
    }

    let mut app = App::new(config)?;
    let route = cli.command.route();
    let signed_in = usable_session(app.signed_in().await, route)?;
    match guard(signed_in.as_ref().map(|s| &s.user.profile), route) {
        RouteDecision::Render => {}
        RouteDecision::RedirectToLogin => bail!("Not signed in. Run `poinsiswa login` first."),
        RouteDecision::RedirectToDashboard => match &signed_in {
            Some(me) if route == Route::Login => {
                println!("Already signed in as {}. Run `poinsiswa logout` first.", me.user.email);
                return Ok(());
            }
            Some(me) => bail!("This command is not available for the {} role.", me.user.profile.role),
            None => bail!("Not signed in. Run `poinsiswa login` first."),
        },
    }

    if let Command::Login { email, remember } = cli.command {
        let user = app.login(email, remember).await?;
        println!("Welcome, {} ({}).", user.profile.name, user.profile.role);
        return Ok(());
    }

    let Some(me) = signed_in else {
        bail!("Not signed in. Run `poinsiswa login` first.");
    };

    match cli.command {
        Command::Whoami => commands::whoami(&me),
        Command::Dashboard => commands::dashboard(&me, app.school_now()?).await?,
        Command::Students { classroom } => commands::students(&me, classroom).await?,
        Command::Record {
            student,
            kind,
            points,
            description,
            key,
            advice,
        } => {
            let args = RecordArgs {
                student,
                kind,
                points,
                description,
                key,
                advice,
            };
            commands::record(&me, args, || app.advisor()).await?
        }
        Command::Points { student } => commands::points(&me, student).await?,
        Command::Advice { event_id } => commands::advice(&me, &event_id, &app.advisor()).await?,
        Command::Reconcile { student } => commands::reconcile(&me, &student).await?,
        Command::Login { .. } | Command::Logout { .. } => {}
    }
    Ok(())
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<LedgerError>() {
        Some(e) if e.is_user_error() => eprintln!("{}", e.user_message()),
        Some(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{}", e.user_message());
        }
        None => eprintln!("Error: {:#}", err),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_dir = Config::cache_dir().ok();
    let _guard = init_tracing(log_dir.as_deref());
    info!("poinsiswa starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
