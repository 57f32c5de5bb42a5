// src/main.rs
//
// nextplayer [PATH | LOCATOR]
//
// Without arguments: sync the library and print it.
// With an argument: play it through mpv until it ends or Ctrl-C.

use anyhow::{Context, Result};
use std::path::PathBuf;

use nextplayer::application::{AppState, SyncState};
use nextplayer::config::Config;
use nextplayer::player::PlayerInput;

fn input_from_arg(arg: String) -> PlayerInput {
    if arg.contains("://") {
        PlayerInput::ContentLocator(arg)
    } else {
        PlayerInput::FilePath(PathBuf::from(arg))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 1. CONFIGURATION
    let config = Config::load().context("failed to load configuration")?;

    // 2. APPLICATION STATE
    let state = AppState::new(config).context("failed to open the catalog")?;

    // 3. RUN
    match std::env::args().nth(1) {
        Some(arg) => play(&state, input_from_arg(arg)).await,
        None => list_library(&state).await,
    }
}

async fn list_library(state: &AppState) -> Result<()> {
    let screen = state.media_screen()?;
    let summary = screen.sync_media().await.context("library sync failed")?;

    if let SyncState::PermissionDenied(roots) = &*screen.sync_state().borrow() {
        for root in roots {
            eprintln!("no permission to read {}", root.display());
        }
    }

    let folders = state
        .library_service
        .sorted_folders_stream()
        .next()
        .await
        .transpose()?
        .unwrap_or_default();

    for entry in &folders {
        println!("{} ({} videos)", entry.folder.path.display(), entry.media.len());
        for media in &entry.media {
            println!("    {}", media.title);
        }
    }

    log::info!(
        "{} folders listed ({} new since last sync)",
        folders.len(),
        summary.discovered
    );
    Ok(())
}

#[cfg(unix)]
async fn play(state: &AppState, input: PlayerInput) -> Result<()> {
    use nextplayer::integrations::MpvEngine;
    use nextplayer::player::{GestureConfig, PlaybackEngine, PlaybackState, PlayerController};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    let session = state.playback_service.open(input)?;
    let engine: Arc<dyn PlaybackEngine> = Arc::new(MpvEngine::new(&state.config.mpv));
    let gesture_config = GestureConfig::new(
        state.config.display.density,
        state.config.display.screen_width_px,
    );

    let (controller, events) = PlayerController::open(
        engine,
        session,
        state.preferences_service.player_preferences(),
        gesture_config,
    )
    .context("failed to start playback")?;
    let persistence = Arc::clone(&state.playback_service).spawn_persistence(events);

    if controller.ui_state().resume_prompt.is_some() {
        // No prompt UI on the command line: resume
        controller.answer_resume_prompt(true);
    }

    let mut playback_state = controller.state().playback_state.subscribe();
    let mut player_error = controller.state().player_error.subscribe();
    let mut tick = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tick.tick() => controller.tick(Instant::now()),
            changed = playback_state.changed() => {
                if changed.is_err() || *playback_state.borrow() == PlaybackState::Ended {
                    break;
                }
            }
            changed = player_error.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(error) = player_error.borrow().clone() {
                    log::error!("playback failed: {}", error);
                    break;
                }
            }
        }
    }

    controller.on_pause();
    controller.release();
    drop(controller);

    // The event stream closes with the controller
    persistence.await.context("persistence task failed")?;
    Ok(())
}

#[cfg(not(unix))]
async fn play(_state: &AppState, _input: PlayerInput) -> Result<()> {
    anyhow::bail!("playback needs the mpv adapter, which is only available on Unix")
}
