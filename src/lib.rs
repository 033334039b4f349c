pub mod audio;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod session;
pub mod settings;
pub mod theme;
pub mod ui;
mod utils;

use std::{
    io::{BufRead, Write},
    sync::Arc,
    thread,
};

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use tokio::sync::{broadcast::error::RecvError, mpsc};

use audio::AudioEngineHandle;
use catalog::{Catalog, ScriptCatalog};
use cli::{Cli, Command, ThemeAction};
use config::AppConfig;
use db::{Database, SessionLock};
use history::{recover_interrupted, HistoryWorker};
use session::{
    commands::{execute, SessionCommand, HELP},
    SessionController, SessionEvent,
};
use settings::SettingsStore;
use theme::{ColorSchemeSignal, ThemeResolver};
use ui::{format_clock, script_cards, SessionView, TerminalSurface};

pub use error::{Error, Result};

pub(crate) struct AppState {
    pub(crate) config: AppConfig,
    pub(crate) db: Database,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) theme: ThemeResolver,
    pub(crate) surface: Arc<TerminalSurface>,
}

impl AppState {
    fn init(config: AppConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let db = Database::new(config.db_path())?;

        let catalog = match &config.catalog_path {
            Some(path) => Catalog::from_file(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?,
            None => Catalog::builtin(),
        };

        let settings = Arc::new(SettingsStore::new(config.settings_path())?);
        let surface = Arc::new(TerminalSurface::new(config.color));
        let theme = ThemeResolver::new(settings, surface.clone(), config.prefers_dark);

        Ok(Self {
            config,
            db,
            catalog: Arc::new(catalog),
            theme,
            surface,
        })
    }
}

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    cli.apply(&mut config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mindful-rt")
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let state = AppState::init(config)?;

        // Finalize sessions that were running when the app last exited.
        let recovered = recover_interrupted(&state.db).await?;
        if recovered > 0 {
            info!("Marked {recovered} unfinished session(s) as interrupted");
        }

        dispatch(&state, cli.command).await
    })
}

async fn dispatch(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Scripts => {
            for card in script_cards(&state.catalog.list_scripts()) {
                println!(
                    "{:<16} {:>7}  {}  ({})",
                    card.script_id, card.duration_text, card.title, card.test_id
                );
            }
        }
        Command::Start {
            script_id,
            volume,
            muted,
        } => run_session(state, &script_id, volume, muted).await?,
        Command::History { limit, offset } => {
            let entries = state.db.list_sessions_paginated(limit, offset).await?;
            if entries.is_empty() {
                println!("No sessions yet.");
            }
            for entry in entries {
                println!(
                    "{}  {:<16} {:<11} {} / {}  {}",
                    entry.started_at.format("%Y-%m-%d %H:%M"),
                    entry.script_id,
                    entry.status.as_str(),
                    format_clock(entry.elapsed_seconds),
                    format_clock(entry.planned_seconds),
                    entry.id
                );
            }
        }
        Command::Delete { session_id } => {
            if !state.db.delete_session(&session_id).await? {
                return Err(Error::not_found(format!("session '{session_id}'")).into());
            }
            println!("Deleted {session_id}");
        }
        Command::Theme { action } => {
            match action {
                Some(ThemeAction::Set { mode }) => {
                    state.theme.set_preference(&mode)?;
                }
                Some(ThemeAction::Toggle) => {
                    state.theme.toggle();
                }
                None => {}
            }
            println!(
                "theme: {} (showing {})",
                state.theme.mode(),
                state.theme.resolved()
            );
        }
    }
    Ok(())
}

/// Stdin is read on a plain thread; blocking reads would otherwise pin a
/// runtime worker until the process exits.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = thread::Builder::new()
        .name("mindful-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    if let Err(err) = spawned {
        warn!("Failed to spawn stdin reader: {err}");
    }
    rx
}

async fn run_session(
    state: &AppState,
    script_id: &str,
    volume: Option<f32>,
    muted: bool,
) -> anyhow::Result<()> {
    let Some(_session_lock) = SessionLock::try_acquire(&state.db.session_lock_path())? else {
        return Err(Error::invalid_state("a session is already running in another process").into());
    };

    let (history, worker) = HistoryWorker::spawn(state.db.clone());
    let controller = SessionController::new(
        state.catalog.clone(),
        Arc::new(AudioEngineHandle::new()),
        history,
        state.config.controller_config(),
    );

    // A terminal has no live appearance notification, so the OS signal is
    // fixed at `--prefers-dark` / `MINDFUL_PREFERS_DARK` for the whole run.
    // Embedders with a real source drive their own `ColorSchemeSignal`.
    let signal = ColorSchemeSignal::new(state.config.prefers_dark);
    let theme_subscription = state.theme.attach(&signal);

    if let Some(volume) = volume {
        controller.set_volume(volume).await?;
    }
    if muted {
        controller.set_muted(true).await?;
    }

    let mut events = controller.subscribe();
    let mut input = spawn_stdin_reader();
    let mut input_open = true;
    controller.start(script_id).await?;
    println!("{HELP}");
    print_view(state, &controller.view().await);

    loop {
        tokio::select! {
            line = input.recv(), if input_open => {
                let Some(line) = line else {
                    // stdin closed: end the session rather than leave it dangling.
                    input_open = false;
                    controller.stop().await;
                    continue;
                };
                match line.parse::<SessionCommand>() {
                    Ok(SessionCommand::Help) => println!("{HELP}"),
                    Ok(command) => match execute(&controller, command).await {
                        Ok(view) => print_view(state, &view),
                        Err(err) => eprintln!("{err}"),
                    },
                    Err(err) => eprintln!("{err}"),
                }
            }
            event = events.recv() => match event {
                Ok(SessionEvent::StateChanged(snapshot)) => {
                    print_view(state, &SessionView::from_session(&snapshot.session));
                }
                Ok(SessionEvent::Completed(summary)) => {
                    println!("\nお疲れさまでした. Session complete ({}).", format_clock(summary.elapsed_seconds));
                    break;
                }
                Ok(SessionEvent::Stopped(summary)) => {
                    println!("\nSession stopped at {}.", format_clock(summary.elapsed_seconds));
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("UI fell behind by {skipped} session events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    controller.shutdown().await;
    theme_subscription.close().await;
    drop(controller);
    worker.shutdown().await;
    Ok(())
}

fn print_view(state: &AppState, view: &SessionView) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\r\x1b[2K{}", state.surface.render(view));
    let _ = stdout.flush();
}
