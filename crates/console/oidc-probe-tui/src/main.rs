mod app;
mod bridge;
mod ui;

use anyhow::{Context, Result};
use app::{AppEvent, AppScreen, AppState};
use bridge::{LoginMethod, LogoutMethod, SessionBridge};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use oidc_probe_agent::{AgentConfig, OidcAgent};
use oidc_probe_core::{LogLevel, OidcSettings};
use oidc_probe_storage::{
    CLIENT_STORAGE_PREFIX, FileStore, KeyValueStore, SettingsStore, base_url, default_settings,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{io, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging()?;

    let store: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::default_location().context("opening storage directory")?);
    let settings_store = SettingsStore::with_defaults(store.clone(), default_settings());
    let settings = settings_store.load();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, settings, settings_store, store).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

/// The terminal owns stdout, so traces go to a file when requested and
/// nowhere otherwise.
fn init_logging() -> Result<()> {
    if let Ok(path) = std::env::var("OIDC_PROBE_LOG") {
        let file = std::fs::File::create(&path).context("creating trace log file")?;
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(file)
            .with_ansi(false)
            .init();
    }
    Ok(())
}

fn build_agent(
    settings: &OidcSettings,
    store: Arc<dyn KeyValueStore>,
) -> Result<Arc<OidcAgent>> {
    let config = AgentConfig::from_settings(settings, &base_url(), store);
    Ok(Arc::new(OidcAgent::new(config)?))
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    settings: OidcSettings,
    settings_store: SettingsStore,
    store: Arc<dyn KeyValueStore>,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();

    let mut app = AppState::new(settings);
    app.record(
        LogLevel::Info,
        "Debug console initialized",
        Some(format!("Authority: {}", app.settings.authority)),
    );

    // The bridge subscribes before start() so the initial cache restore
    // is observed like any other lifecycle event.
    let mut agent = build_agent(&app.settings, store.clone())?;
    let mut session = SessionBridge::new(agent.clone(), event_tx.clone());
    agent.start();
    info!(authority = %app.settings.authority, "console started");

    loop {
        session.observe();
        let snapshot = session.snapshot();
        let refreshing = session.is_refreshing();
        terminal.draw(|f| ui::draw(f, &app, &snapshot, refreshing))?;

        // Poll fast enough for the countdown to tick every second.
        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match app.screen {
                    AppScreen::Console => {
                        handle_console_key(&mut app, &session, &snapshot, key.code)
                    }
                    AppScreen::Settings => {
                        if key.code == KeyCode::Char('r')
                            && key.modifiers.contains(KeyModifiers::CONTROL)
                        {
                            handle_settings_reset(&mut app, &settings_store);
                        } else if key.code == KeyCode::Char('s')
                            && key.modifiers.contains(KeyModifiers::CONTROL)
                        {
                            handle_settings_save(&mut app, &settings_store);
                        } else {
                            handle_settings_key(
                                &mut app,
                                &mut session,
                                &mut agent,
                                &settings_store,
                                &store,
                                key.code,
                            )?;
                        }
                    }
                }
            }
        }

        while let Ok(event) = event_rx.try_recv() {
            match event {
                AppEvent::Log {
                    level,
                    message,
                    data,
                } => {
                    app.record(level, message, data);
                }
                AppEvent::RefreshFinished => app.refreshing = false,
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_console_key(
    app: &mut AppState,
    session: &SessionBridge,
    snapshot: &oidc_probe_agent::SessionSnapshot,
    code: KeyCode,
) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('s') => app.open_settings(),
        KeyCode::Char('c') => app.log.clear(),
        KeyCode::Tab => app.selected_token = app.selected_token.next(),
        KeyCode::Char('y') => copy_selected_token(app, snapshot),
        KeyCode::Char('l') => {
            session.login(LoginMethod::Redirect);
        }
        KeyCode::Char('p') => {
            session.login(LoginMethod::Popup);
        }
        KeyCode::Char('r') => {
            if snapshot.is_authenticated && !app.refreshing && session.refresh().is_some() {
                app.refreshing = true;
            }
        }
        KeyCode::Char('o') => {
            session.logout(LogoutMethod::Redirect);
        }
        KeyCode::Char('i') => {
            session.logout(LogoutMethod::Silent);
        }
        KeyCode::Char('x') => {
            session.logout(LogoutMethod::Local);
        }
        _ => {}
    }
}

fn copy_selected_token(app: &mut AppState, snapshot: &oidc_probe_agent::SessionSnapshot) {
    let token = snapshot.user.as_ref().and_then(|user| match app.selected_token {
        app::TokenSlot::Access => Some(user.access_token.clone()),
        app::TokenSlot::Id => user.id_token.clone(),
        app::TokenSlot::Refresh => user.refresh_token.clone(),
    });
    let Some(token) = token else {
        app.record(
            LogLevel::Warning,
            "Nothing to copy",
            Some(format!("{} not present", app.selected_token.label())),
        );
        return;
    };

    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(token)) {
        Ok(()) => app.record(
            LogLevel::Success,
            "Copied to clipboard",
            Some(app.selected_token.label().to_string()),
        ),
        Err(error) => app.record(
            LogLevel::Error,
            "Clipboard unavailable",
            Some(error.to_string()),
        ),
    }
}

fn handle_settings_key(
    app: &mut AppState,
    session: &mut SessionBridge,
    agent: &mut Arc<OidcAgent>,
    settings_store: &SettingsStore,
    store: &Arc<dyn KeyValueStore>,
    code: KeyCode,
) -> Result<()> {
    match code {
        KeyCode::Esc => app.close_settings(),
        KeyCode::Tab => app.form.focus = app.form.focus.next(),
        KeyCode::BackTab => app.form.focus = app.form.focus.prev(),
        KeyCode::Backspace => app.form.backspace(),
        KeyCode::Char(c) => app.form.push(c),
        KeyCode::Enter => {
            let settings = app.form.to_settings();
            if let Err(error) = settings_store.save(&settings) {
                app.record(
                    LogLevel::Error,
                    "Failed to save settings",
                    Some(error.to_string()),
                );
                return Ok(());
            }
            // Purge the old client's cached session before reconnecting;
            // a realm switch must never resurrect the previous user.
            if let Err(error) = store.remove_prefix(CLIENT_STORAGE_PREFIX) {
                app.record(
                    LogLevel::Warning,
                    "Failed to clear cached session",
                    Some(error.to_string()),
                );
            }
            app.settings = settings;
            app.record(
                LogLevel::Info,
                "Settings updated, reconnecting...",
                Some(format!("Authority: {}", app.settings.authority)),
            );

            let new_agent = build_agent(&app.settings, store.clone())?;
            session.reconfigure(new_agent.clone());
            new_agent.start();
            *agent = new_agent;

            app.close_settings();
        }
        _ => {}
    }
    Ok(())
}

/// Persist the form without touching the live client. The running
/// session keeps its current configuration until Save & Reconnect.
fn handle_settings_save(app: &mut AppState, settings_store: &SettingsStore) {
    let settings = app.form.to_settings();
    match settings_store.save(&settings) {
        Ok(()) => app.record(
            LogLevel::Info,
            "Settings saved",
            Some(format!("Authority: {}", settings.authority)),
        ),
        Err(error) => app.record(
            LogLevel::Error,
            "Failed to save settings",
            Some(error.to_string()),
        ),
    }
}

/// Two-step reset: wipe persisted state now, reconnect only on save.
fn handle_settings_reset(app: &mut AppState, settings_store: &SettingsStore) {
    match settings_store.reset() {
        Ok(()) => {
            app.form = app::SettingsForm::from_settings(settings_store.defaults());
            app.record(LogLevel::Info, "Settings reset to defaults", None);
        }
        Err(error) => app.record(
            LogLevel::Error,
            "Failed to reset settings",
            Some(error.to_string()),
        ),
    }
}
