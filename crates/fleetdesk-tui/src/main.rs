//! fleetdesk - a terminal console for administering users and devices.
//!
//! Without arguments this starts the full-screen console. `--login`,
//! `--logout` and `--whoami` manage the stored session from the shell.

mod app;
mod forms;
mod notify;
mod ui;
mod utils;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fleetdesk_core::auth::{CredentialStore, Credentials, SessionController};
use fleetdesk_core::config::Config;
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Prefix of the daily log file in the cache directory
const LOG_FILE: &str = "fleetdesk.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a daily file so they never draw over the terminal UI. The
/// returned guard flushes the writer on drop and must outlive the app.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = match config.log_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Logging disabled: {}", e);
            return None;
        }
    };
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Using default configuration: {:#}", e);
        Config::default()
    });
    let _guard = init_tracing(&config);
    let store = config.open_store()?;

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--login") => return login_command(&config, store).await,
        Some("--logout") => return logout_command(&config, store).await,
        Some("--whoami") => return whoami_command(&config, store),
        Some(other) => {
            anyhow::bail!("Unknown argument: {} (expected --login, --logout or --whoami)", other)
        }
        None => {}
    }

    info!(api = %config.api_base_url, "fleetdesk starting");

    // Create app before touching the terminal so setup errors print normally
    let mut app = App::new(&config, store)?;
    app.start();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("fleetdesk shutting down");
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key)? {
                    return Ok(());
                }
            }
        }

        // Apply finished tasks and session changes
        app.tick();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// Shell commands
// ============================================================================

async fn login_command(config: &Config, store: Arc<dyn CredentialStore>) -> Result<()> {
    let mut session = SessionController::new(config, store)?;

    let remembered = session.remembered_username();
    match remembered.as_deref() {
        Some(name) => print!("Tên đăng nhập [{}]: ", name),
        None => print!("Tên đăng nhập: "),
    }
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin()
        .lock()
        .read_line(&mut username)
        .context("Failed to read username")?;
    let username = match username.trim() {
        "" => remembered.unwrap_or_default(),
        name => name.to_string(),
    };
    let password = rpassword::prompt_password("Mật khẩu: ").context("Failed to read password")?;

    // Replace whatever session was stored
    if session.is_authenticated() {
        session.logout().await;
    }

    let credentials = Credentials::new(username, password);
    match session.login(&credentials, true).await {
        Ok(user) => {
            println!("Chào mừng {}!", user.username);
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Shell login failed");
            anyhow::bail!(e.user_message(fleetdesk_core::Operation::Login))
        }
    }
}

async fn logout_command(config: &Config, store: Arc<dyn CredentialStore>) -> Result<()> {
    let mut session = SessionController::new(config, store)?;
    if !session.is_authenticated() {
        println!("Chưa đăng nhập");
        return Ok(());
    }
    session.logout().await;
    println!("{}", app::LOGGED_OUT_MESSAGE);
    Ok(())
}

fn whoami_command(config: &Config, store: Arc<dyn CredentialStore>) -> Result<()> {
    let session = SessionController::new(config, store)?;
    match session.current_user() {
        Some(user) => println!("{}", serde_json::to_string_pretty(user)?),
        None => println!("Chưa đăng nhập"),
    }
    Ok(())
}
