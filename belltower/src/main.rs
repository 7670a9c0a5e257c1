use anyhow::Result;
use belltower::dispatch::TonePlayer;
use belltower::prelude::*;
use belltower::settings::install_dir;
use belltower::{ENGINE_NAME, VERSION};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 1. Read engine settings. Unusable settings fall back to the defaults.
    let (settings, rejected) = match install_dir() {
        Ok(dir) => EngineSettings::load_or_defaults(&dir),
        Err(e) => (EngineSettings::defaults(Path::new(".")), Some(e)),
    };

    // 2. Initialize structured logging.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    info!("{} v{} starting.", ENGINE_NAME, VERSION);
    if let Some(e) = rejected {
        warn!(error = %e, "Ignoring engine settings, running with built-in defaults.");
    }

    // 3. Make sure we are the only engine on this host.
    let mut guard = InstanceGuard::new(settings.lock_path());
    if !guard.acquire() {
        error!(
            path = %guard.path().display(),
            "Another instance is already running, exiting."
        );
        return Ok(ExitCode::from(1));
    }

    // 4. Wire up the engine.
    let watcher = ConfigWatcher::open(settings.config_path(), &settings.install_dir);
    let dispatcher = AlertDispatcher::new(
        tone_player(),
        Arc::new(LogBanner),
        tokio::runtime::Handle::current(),
    );
    let mut engine = TriggerEngine::new(watcher, dispatcher)
        .with_timing(settings.sample_interval(), settings.error_backoff());

    // 5. Log what the engine reports.
    spawn_event_listeners(&engine);

    // 6. Run until Ctrl+C, then give the lock back.
    let outcome = engine.run().await;
    guard.release();
    outcome?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "audio")]
fn tone_player() -> Arc<dyn TonePlayer> {
    Arc::new(belltower::collaborators::RodioTonePlayer)
}

#[cfg(not(feature = "audio"))]
fn tone_player() -> Arc<dyn TonePlayer> {
    Arc::new(SilentTonePlayer)
}

/// Spawns tasks that log the engine's system and alert streams.
fn spawn_event_listeners(engine: &TriggerEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            match event {
                SystemEvent::ConfigReloadFailed { path, reason } => {
                    warn!("[SYSTEM] => reload of {} failed: {}", path.display(), reason)
                }
                other => info!("[SYSTEM] => {:?}", other),
            }
        }
    });

    let mut alert_rx = engine.subscribe_alert_events();
    tokio::spawn(async move {
        while let Ok(alert) = alert_rx.recv().await {
            info!("[ALERT] => {} ({})", alert.text, alert.key);
        }
    });
}
