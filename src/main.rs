mod nfc_service;
mod ws;

use crossbeam_channel::unbounded;
use log::{error, info};
use tokio::sync::broadcast;

use simplenfc::NfcConfig;
use simplenfc::types::{NfcCommand, OutgoingMessage};

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("Starting NFC Rust Service...");

    let config = match NfcConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let bind_addr = config.bind_addr;

    // Channel: WS -> NFC (Commands)
    // Crossbeam (Sync) because the NFC thread is blocking
    let (cmd_tx, cmd_rx) = unbounded::<NfcCommand>();

    // Channel: NFC -> WS (Events)
    let (event_tx, event_rx) = broadcast::channel::<OutgoingMessage>(100);

    std::thread::spawn(move || {
        // The controller is single-threaded and lives on its own thread;
        // events come back through a crossbeam bridge into the broadcast.
        let (bridge_tx, bridge_rx) = unbounded::<OutgoingMessage>();

        std::thread::spawn(move || {
            nfc_service::run(bridge_tx, cmd_rx, config);
        });

        while let Ok(msg) = bridge_rx.recv() {
            let _ = event_tx.send(msg);
        }
    });

    ws::start_server(bind_addr, cmd_tx, event_rx).await;
}
