pub mod dashboard;
pub mod mqtt;
pub mod persistence;
pub mod ui;

use crate::dashboard::Canvas;
use crate::mqtt::MqttHandle;
use crate::persistence::{PersistenceManager, SettingsStore, WindowSettings};
use crate::ui::DashboardApp;
use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Capacity of the channel carrying broker messages to the UI
const TRANSPORT_EVENT_BUFFER: usize = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let store = SettingsStore::default_location();
    let settings = store.load().await;
    let layout_dir = store.layout_dir();
    let persistence = PersistenceManager::spawn(store);

    let (mut mqtt_handle, transport_events) = MqttHandle::spawn(TRANSPORT_EVENT_BUFFER);
    let mqtt_worker = mqtt_handle.take_worker();
    let mut canvas = Canvas::new(Box::new(mqtt_handle));
    if settings.auto_connect {
        info!("Auto-connecting to {}", settings.broker);
        canvas.connect(settings.broker.clone());
    }

    info!("Starting dashboard UI");
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("OpenDash")
            .with_inner_size([settings.window.width, settings.window.height])
            .with_min_inner_size(WindowSettings::MIN_SIZE)
            .with_fullscreen(settings.window.fullscreen),
        ..Default::default()
    };

    let settings_client = persistence.client();
    eframe::run_native(
        "OpenDash",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(DashboardApp::new(
                cc,
                canvas,
                transport_events,
                settings,
                settings_client,
                layout_dir,
            )))
        }),
    )
    .map_err(|e| eyre!("Failed to run the dashboard window: {}", e))?;

    if let Some(worker) = mqtt_worker {
        worker.shutdown().await;
    }
    persistence.shutdown().await;
    info!("Dashboard closed");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
