use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use telederm::services::incoming_call::HttpNotificationService;
use telederm::{
    AppConfig, AuthDecision, ClientCore, ConfigError, FileSessionStore, GateError, GateSnapshot, GateView, Location,
    Navigator, Redirect, Session, SessionError, UserProfile,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("session storage error: {0}")]
    Session(#[from] SessionError),
    #[error("auth gate error: {0}")]
    Gate(#[from] GateError),
    #[error("timed out waiting for the auth gate to settle")]
    Timeout,
    #[error("no session stored; run `login` first")]
    NoSession,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "telederm-cli", about = "Drive the telederm session gate against a local session store")]
struct Cli {
    #[arg(long, env = "TELEDERM_SESSION_DIR")]
    session_dir: Option<PathBuf>,

    #[arg(long, default_value = "/", help = "Location the gate is mounted at")]
    at: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mount the gate and report its decision and redirect.
    Status,
    /// Store a session as a successful login would.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        token: String,
        #[arg(long, default_value_t = false)]
        verified: bool,
    },
    /// Mark the stored user's email as verified.
    Verify,
    /// Clear the stored session.
    Logout,
    /// Poll the notification service and print incoming calls.
    WatchCalls {
        #[arg(long, help = "Stop after this many calls")]
        count: Option<usize>,
    },
}

/// Navigator that prints each redirect it is asked to apply.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn replace(&self, redirect: &Redirect) {
        println!("redirect {redirect}");
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = cli.session_dir {
        config.session_dir = dir;
    }

    let store = Arc::new(FileSessionStore::new(config.session_dir.clone()));
    let core = ClientCore::start(config.clone(), store, Arc::new(PrintNavigator), Location::parse(&cli.at));
    settle(&core, |s| !s.decision_loading).await?;

    let result = match cli.command {
        Command::Status => run_status(&core),
        Command::Login { email, name, token, verified } => run_login(&core, email, name, token, verified).await,
        Command::Verify => run_verify(&core).await,
        Command::Logout => run_logout(&core).await,
        Command::WatchCalls { count } => run_watch_calls(&core, &config, count).await,
    };

    core.shutdown().await;
    result
}

async fn settle<F>(core: &ClientCore, pred: F) -> Result<GateSnapshot, CliError>
where
    F: FnMut(&GateSnapshot) -> bool,
{
    let mut rx = core.gate().watch();
    let guard = tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(pred))
        .await
        .map_err(|_| CliError::Timeout)?
        .map_err(|_| CliError::Gate(GateError::Closed))?;
    Ok(GateSnapshot::clone(&guard))
}

fn run_status(core: &ClientCore) -> Result<(), CliError> {
    let snap = core.gate().snapshot();
    let view = match core.gate().render(()) {
        GateView::Loading => "loading",
        GateView::Content(()) => "content",
    };
    print_snapshot(&snap, view)
}

async fn run_login(
    core: &ClientCore,
    email: String,
    full_name: String,
    token: String,
    verified: bool,
) -> Result<(), CliError> {
    let committed = core.gate().snapshot().committed_seq;
    let session = Session {
        token,
        user: UserProfile { id: None, email, full_name, is_verified: verified, phone: None },
    };
    core.complete_login(session).await?;
    let snap = settle(core, |s| s.committed_seq > committed).await?;
    print_snapshot(&snap, "content")
}

async fn run_verify(core: &ClientCore) -> Result<(), CliError> {
    let committed = core.gate().snapshot().committed_seq;
    if !core.mark_verified().await? {
        return Err(CliError::NoSession);
    }
    let snap = settle(core, |s| s.committed_seq > committed && s.decision == AuthDecision::Authenticated).await?;
    print_snapshot(&snap, "content")
}

async fn run_logout(core: &ClientCore) -> Result<(), CliError> {
    core.logout().await?;
    print_snapshot(&core.gate().snapshot(), "content")
}

async fn run_watch_calls(core: &ClientCore, config: &AppConfig, count: Option<usize>) -> Result<(), CliError> {
    if core.gate().snapshot().decision == AuthDecision::Unauthenticated {
        return Err(CliError::NoSession);
    }
    let service = Arc::new(HttpNotificationService::new(&config.api_base_url));
    let (poller, mut calls) = core.poll_incoming_calls(service);
    tracing::info!(base_url = %config.api_base_url, "watching for incoming calls");

    let mut seen = 0usize;
    while let Some(call) = calls.recv().await {
        println!("{}", serde_json::to_string(&call)?);
        seen += 1;
        if count.is_some_and(|max| seen >= max) {
            break;
        }
    }
    poller.stop().await;
    Ok(())
}

fn print_snapshot(snap: &GateSnapshot, view: &str) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(&json!({
        "decision": snap.decision.as_str(),
        "email": snap.email,
        "location": snap.location.to_string(),
        "view": view,
    }))?;
    println!("{rendered}");
    Ok(())
}
