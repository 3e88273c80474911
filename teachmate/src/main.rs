//! `TeachMate` task client.
//!
//! Renders the task manager or the dashboard widget as text after applying
//! one action. Configuration via CLI flags, environment variables, or
//! config file (`~/.config/teachmate/config.toml`).
//!
//! ```bash
//! # Log in against the configured credentials
//! TEACHMATE_USER_ID=CSEfac101 TEACHMATE_USER_PASSWORD=secret \
//!     cargo run --bin teachmate -- login --user-id CSEfac101 --password secret
//!
//! # Task manager against a local development server
//! cargo run --bin teachmate -- --api-url http://127.0.0.1:8000 tasks add Grade papers
//!
//! # Dashboard against the built-in sample tasks
//! cargo run --bin teachmate -- --offline dashboard --toggle 2
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use teachmate::config::{CliArgs, ClientConfig, Command, ConfigError, TaskCommand};
use teachmate::remote::{TaskRemote, TransportError};
use teachmate::remote::http::HttpTaskRemote;
use teachmate::remote::memory::InMemoryRemote;
use teachmate::session::{AuthError, Authenticator, Session, SessionError, SessionStore};
use teachmate::tasks::TaskStore;
use teachmate::views::{DashboardTaskWidget, TaskListView, TaskView, ViewAction, ViewError, dispatch};

/// A requested action whose task id is still the text the user typed.
///
/// Ids are resolved against the loaded collection, so `7` can name a task
/// with string id `"7"` as well as one with integer id `7`.
enum Request {
    Create(String),
    Toggle(String),
    Remove(String),
}

impl Request {
    fn resolve<R: TaskRemote>(self, store: &TaskStore<R>) -> ViewAction {
        match self {
            Self::Create(title) => ViewAction::Create(title),
            Self::Toggle(raw) => ViewAction::Toggle(store.resolve_id(&raw)),
            Self::Remove(raw) => ViewAction::Remove(store.resolve_id(&raw)),
        }
    }
}

/// Failures that end the command.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The view was rendered (with the error line) before giving up.
    #[error("{0}")]
    Reported(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file so stdout carries only the rendered view.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("teachmate starting");
    let result = run(cli, &config).await;
    tracing::info!(ok = result.is_ok(), "teachmate exiting");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("teachmate.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(cli: CliArgs, config: &ClientConfig) -> Result<(), CliError> {
    let authenticator = Authenticator::from_config(&config.auth);
    let sessions = SessionStore::new(config.session_path()?);

    let command = cli.command.unwrap_or(Command::Dashboard { toggle: None });
    let (session, view, request): (Session, Box<dyn TaskView>, Option<Request>) = match command {
        Command::Login { user_id, password } => {
            let session = authenticator.login(&user_id, &password)?;
            sessions.save(&session)?;
            println!("Logged in as {}", session.user_id());
            return Ok(());
        }
        Command::Logout => {
            sessions.clear()?;
            println!("Logged out");
            return Ok(());
        }
        Command::Dashboard { toggle } => {
            let session = authenticator.resume(&sessions)?;
            let widget = DashboardTaskWidget::new(session.user_id());
            (session, Box::new(widget), toggle.map(Request::Toggle))
        }
        Command::Tasks { action } => {
            let session = authenticator.resume(&sessions)?;
            (session, Box::new(TaskListView::new()), action.and_then(task_request))
        }
    };

    if cli.offline {
        tracing::info!(user = session.user_id(), "using in-memory sample tasks");
        let store = TaskStore::new(InMemoryRemote::sample()).with_max_title_len(config.max_title_len);
        show(&store, view.as_ref(), request).await
    } else {
        let remote = HttpTaskRemote::new(&config.api, session)?;
        let store = TaskStore::new(remote).with_max_title_len(config.max_title_len);
        show(&store, view.as_ref(), request).await
    }
}

fn task_request(command: TaskCommand) -> Option<Request> {
    match command {
        TaskCommand::List => None,
        TaskCommand::Add { title } => Some(Request::Create(title.join(" "))),
        TaskCommand::Toggle { id } => Some(Request::Toggle(id)),
        TaskCommand::Rm { id } => Some(Request::Remove(id)),
    }
}

/// Loads the collection, applies `request` and prints the view.
async fn show<R: TaskRemote>(
    store: &TaskStore<R>,
    view: &dyn TaskView,
    request: Option<Request>,
) -> Result<(), CliError> {
    let mut outcome = store.load().await.map_err(|e| CliError::Reported(e.message()));

    if outcome.is_ok() {
        if let Some(request) = request {
            outcome = match dispatch(view, store, request.resolve(store)).await {
                Ok(()) => Ok(()),
                Err(ViewError::Store(e)) => Err(CliError::Reported(e.message())),
                Err(e) => Err(CliError::Reported(e.to_string())),
            };
        }
    }

    print!("{}", view.render(&store.snapshot()));
    outcome
}
