// src/ws.rs
use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use warp::Filter;

use simplenfc::LifecyclePhase;
use simplenfc::types::{IncomingMessage, NfcCommand, OutgoingMessage};

/// Reports connects and disconnects to the NFC thread, which counts clients
/// and derives the lifecycle phase in command order.
#[derive(Clone)]
struct Clients {
    nfc_cmd_tx: Sender<NfcCommand>,
}

impl Clients {
    fn connected(&self) {
        let _ = self.nfc_cmd_tx.send(NfcCommand::ClientConnected);
    }

    fn disconnected(&self) {
        let _ = self.nfc_cmd_tx.send(NfcCommand::ClientDisconnected);
    }
}

pub async fn start_server(
    bind_addr: SocketAddr,
    nfc_cmd_tx: Sender<NfcCommand>,
    mut nfc_event_rx: broadcast::Receiver<OutgoingMessage>,
) {
    // Shared Broadcast Channel for WS Clients
    let (ws_tx, _) = broadcast::channel::<OutgoingMessage>(32);
    let ws_tx = Arc::new(ws_tx);

    // 1. Task to forward NFC Events -> All WS Clients
    let ws_tx_clone = ws_tx.clone();
    tokio::spawn(async move {
        loop {
            match nfc_event_rx.recv().await {
                Ok(msg) => {
                    let _ = ws_tx_clone.send(msg);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Dropped {} NFC events for slow clients", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let _ = nfc_cmd_tx.send(NfcCommand::Lifecycle(LifecyclePhase::Created));
    let clients = Clients { nfc_cmd_tx };

    // 2. Define WS Route (Matches root path "/")
    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let clients = clients.clone();
            let ws_tx = ws_tx.clone();
            ws.on_upgrade(move |socket| handle_connection(socket, clients, ws_tx))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    info!("WebSocket server running on ws://{}", bind_addr);
    warp::serve(routes).run(bind_addr).await;
}

async fn handle_connection(
    ws: warp::ws::WebSocket,
    clients: Clients,
    ws_tx: Arc<broadcast::Sender<OutgoingMessage>>,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_broadcast = ws_tx.subscribe();
    clients.connected();

    // Spawn task to send Broadcasts -> Client
    let forward = tokio::spawn(async move {
        while let Ok(msg) = rx_broadcast.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if client_ws_tx.send(warp::ws::Message::text(json)).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages from Client
    while let Some(result) = client_ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        };
        let Ok(text) = msg.to_str() else {
            continue;
        };
        match serde_json::from_str::<IncomingMessage>(text) {
            Ok(parsed) => {
                let _ = clients.nfc_cmd_tx.send(to_command(parsed));
            }
            Err(e) => warn!("Ignoring invalid client message: {}", e),
        }
    }

    forward.abort();
    clients.disconnected();
}

fn to_command(msg: IncomingMessage) -> NfcCommand {
    match msg {
        IncomingMessage::GET_READER_STATUS => NfcCommand::CheckReaderStatus,
        IncomingMessage::WRITE_MESSAGE { message } => NfcCommand::Write(message),
        IncomingMessage::PUSH_MESSAGE { message } => NfcCommand::Push(message),
        IncomingMessage::BEAM_MESSAGE { message } => NfcCommand::Beam(message),
        IncomingMessage::START_FOREGROUND => NfcCommand::StartForeground,
        IncomingMessage::RESET => NfcCommand::Reset,
        IncomingMessage::REGISTER_HANDLER {
            message_id,
            destination,
        } => NfcCommand::RegisterHandler {
            message_id,
            destination,
        },
    }
}
