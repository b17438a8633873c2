pub mod config;
pub mod controller;
pub mod hotkey;
pub mod persistence;
pub mod recording;

use crate::config::RecorderConfig;
use crate::controller::{ChannelNormalizer, GamepadDevice};
use crate::hotkey::HotkeyBindings;
use crate::persistence::{MacroStore, MacroWriter};
use crate::recording::{run_frame_loop, FrameDriver, FrameLoopSettings, Recorder};
use color_eyre::{eyre::eyre, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = RecorderConfig::load_or_create()
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))?;

    // No controller is fatal before anything can be recorded
    let device = GamepadDevice::create()?
        .initialize()
        .map_err(|e| eyre!("{}. Connect a controller and try again.", e))?;

    let (hotkey_tx, hotkey_rx) = mpsc::unbounded_channel();
    let bindings = HotkeyBindings::from_config(&config.hotkeys)?;
    let _listener = hotkey::spawn_listener(bindings, hotkey_tx)?;
    info!(
        "Global hotkeys: {} = start/stop recording, {} = quit (works while unfocused)",
        config.hotkeys.toggle_record, config.hotkeys.request_stop
    );

    let (store, persistence_worker) = MacroStore::spawn(MacroWriter::new(
        config.output_dir.clone(),
        config.file_prefix.clone(),
    ));

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                ctrl_c.cancel();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    let driver = FrameDriver::new(
        device,
        ChannelNormalizer::new(&config),
        Recorder::new(config.downtime_cap),
    );
    let settings = FrameLoopSettings {
        fps: config.fps,
        ..FrameLoopSettings::default()
    };

    let result = run_frame_loop(driver, hotkey_rx, store, shutdown, settings).await;

    // The loop owned the last store handle, so the worker drains and ends
    if let Err(e) = persistence_worker.await {
        warn!("Persistence worker ended abnormally: {}", e);
    }

    info!("Exiting");
    result.map_err(|e| eyre!("Last recording could not be saved: {}", e))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    // RUST_LOG=debug also prints every emitted opcode
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
