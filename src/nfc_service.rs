// src/nfc_service.rs
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use pcsc::{Context, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State};
use std::ffi::{CStr, CString};
use std::time::Duration;

use simplenfc::reader::{PcscTag, PcscTransport};
use simplenfc::types::{MessageJson, NfcCommand, OutgoingMessage, RecordJson};
use simplenfc::{
    ActivityRouter, HandlerRegistry, LifecyclePhase, MessageCodec, Mode, NfcConfig, NfcController, NfcMessage,
    Received, TagTarget,
};

type Controller = NfcController<PcscTransport>;

/// WebSocket clients currently connected. The first one in resumes the
/// controller and the last one out pauses it.
#[derive(Debug, Default)]
struct ClientPresence {
    count: usize,
}

impl ClientPresence {
    fn connected(&mut self) -> Option<LifecyclePhase> {
        self.count += 1;
        (self.count == 1).then_some(LifecyclePhase::Resumed)
    }

    fn disconnected(&mut self) -> Option<LifecyclePhase> {
        if self.count == 0 {
            warn!("Disconnect reported with no client connected");
            return None;
        }
        self.count -= 1;
        (self.count == 0).then_some(LifecyclePhase::Paused)
    }
}

struct Service {
    tx: Sender<OutgoingMessage>,
    controller: Controller,
    registry: HandlerRegistry,
    presence: ClientPresence,
    last_mode: Mode,
}

pub fn run(tx: Sender<OutgoingMessage>, rx: Receiver<NfcCommand>, config: NfcConfig) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            let _ = tx.send(OutgoingMessage::READER_ERROR {
                error: err.to_string(),
            });
            return;
        }
    };

    let registry = match &config.handler_store {
        Some(path) => HandlerRegistry::open(path),
        None => HandlerRegistry::in_memory(),
    };
    let codec = MessageCodec::new(&config.app_scope);
    info!("Identity record type: {}", codec.mime_type());
    let mut service = Service {
        tx: tx.clone(),
        controller: NfcController::with_policy(codec, PcscTransport::default(), config.pending_policy),
        registry,
        presence: ClientPresence::default(),
        last_mode: Mode::Sleep,
    };

    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();
    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];
    let poll_interval = config.poll_interval();

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(poll_interval, &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. CHECK FOR COMMANDS
        while let Ok(cmd) = rx.try_recv() {
            if let NfcCommand::CheckReaderStatus = cmd {
                refresh_readers(&ctx, &mut readers_buf, &mut reader_names, &mut reader_states, &mut service);
            } else {
                service.handle_command(cmd);
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for i in 1..reader_states.len() {
            let rs = &reader_states[i];
            if !rs.event_state().intersects(State::CHANGED) {
                continue;
            }
            let current = rs.event_state();
            let Some(name) = reader_names.get(i - 1).cloned() else {
                continue;
            };

            // Card Inserted
            if current.intersects(State::PRESENT) && !rs.current_state().intersects(State::PRESENT) {
                info!("Card Inserted on {:?}", name);
                service.handle_card_insertion(&ctx, &name);
            }

            // Card Removed
            if current.intersects(State::EMPTY) && rs.current_state().intersects(State::PRESENT) {
                info!("Card Removed from {:?}", name);
                let _ = tx.send(OutgoingMessage::CARD_STATUS {
                    success: false,
                    message: "Card removed!".into(),
                });
            }

            reader_states[i].sync_current_state();
        }

        // 4. REFRESH LIST
        if readers_changed {
            refresh_readers(&ctx, &mut readers_buf, &mut reader_names, &mut reader_states, &mut service);
        }
    }
}

fn refresh_readers(
    ctx: &Context,
    readers_buf: &mut [u8],
    reader_names: &mut Vec<CString>,
    reader_states: &mut Vec<ReaderState>,
    service: &mut Service,
) {
    // Index 0 is the PnP state and survives the refresh
    reader_states.truncate(1);
    match ctx.list_readers(readers_buf) {
        Ok(iter) => {
            *reader_names = iter.map(CString::from).collect();
            for name in reader_names.iter() {
                reader_states.push(ReaderState::new(name.clone(), State::UNAWARE));
            }
        }
        Err(err) => {
            debug!("No readers listed: {}", err);
            reader_names.clear();
        }
    }

    let present = !reader_names.is_empty();
    service.controller.transport_mut().set_reader_present(present);
    let _ = service.tx.send(OutgoingMessage::READER_STATUS { success: present });
}

impl Service {
    fn handle_command(&mut self, cmd: NfcCommand) {
        match cmd {
            NfcCommand::Write(json) => {
                if let Some(message) = self.decode(json) {
                    let tx = self.tx.clone();
                    let res = self.controller.request_write(&message, move |outcome| {
                        let _ = tx.send(OutgoingMessage::WRITE_RESULT {
                            success: outcome.is_success(),
                            outcome,
                        });
                    });
                    self.report(res);
                }
            }
            NfcCommand::Push(json) => {
                if let Some(message) = self.decode(json) {
                    let res = self.controller.request_push(&message);
                    self.report(res);
                }
            }
            NfcCommand::Beam(json) => {
                if let Some(message) = self.decode(json) {
                    let tx = self.tx.clone();
                    let res = self.controller.request_beam(&message, move || {
                        let _ = tx.send(OutgoingMessage::MESSAGE_PUSHED);
                    });
                    self.report(res);
                }
            }
            NfcCommand::StartForeground => {
                let tx = self.tx.clone();
                let res = self.controller.request_foreground_dispatch(move |received| {
                    let event = match received {
                        Received::Message(message) => OutgoingMessage::MESSAGE_RECEIVED {
                            message: MessageJson::from(&message),
                        },
                        Received::Ndef(records) => OutgoingMessage::NDEF_RECEIVED {
                            records: records.iter().map(raw_record_json).collect(),
                        },
                    };
                    let _ = tx.send(event);
                });
                self.report(res);
            }
            NfcCommand::Reset => self.controller.reset(),
            NfcCommand::RegisterHandler {
                message_id,
                destination,
            } => match self.registry.register(message_id.clone(), destination.clone()) {
                Ok(()) => {
                    let _ = self.tx.send(OutgoingMessage::HANDLER_REGISTERED {
                        message_id,
                        destination,
                    });
                }
                Err(e) => self.send_error(e.to_string()),
            },
            NfcCommand::Lifecycle(phase) => self.controller.on_lifecycle(phase),
            NfcCommand::ClientConnected => {
                if let Some(phase) = self.presence.connected() {
                    self.controller.on_lifecycle(phase);
                }
            }
            NfcCommand::ClientDisconnected => {
                if let Some(phase) = self.presence.disconnected() {
                    self.controller.on_lifecycle(phase);
                }
            }
            NfcCommand::CheckReaderStatus => {}
        }
        self.sync_mode();
    }

    fn handle_card_insertion(&mut self, ctx: &Context, reader_name: &CStr) {
        let _ = self.tx.send(OutgoingMessage::CARD_STATUS {
            success: true,
            message: "Card detected!".into(),
        });

        let card = match ctx.connect(reader_name, ShareMode::Shared, Protocols::ANY) {
            Ok(card) => card,
            Err(e) => {
                error!("Failed to connect to card: {}", e);
                return;
            }
        };
        let mut tag = PcscTag::new(&card);

        if !self.controller.on_tag_discovered(&mut tag) {
            // nothing armed: route by message id
            match tag.read_ndef() {
                Ok(bytes) => {
                    let tx = self.tx.clone();
                    let mut launcher = move |destination: &str, message: &NfcMessage| {
                        let _ = tx.send(OutgoingMessage::MESSAGE_ROUTED {
                            destination: destination.to_string(),
                            message: MessageJson::from(message),
                        });
                    };
                    let router = ActivityRouter::new(self.controller.codec(), &self.registry);
                    let report = router.route(&[bytes], &mut launcher);
                    debug!("Route report: {:?}", report);
                }
                Err(e) => warn!("Could not read tag: {}", e),
            }
        }
        self.sync_mode();
    }

    fn decode(&self, json: MessageJson) -> Option<NfcMessage> {
        match NfcMessage::try_from(json) {
            Ok(message) => Some(message),
            Err(e) => {
                self.send_error(format!("Invalid message: {}", e));
                None
            }
        }
    }

    fn report(&self, res: simplenfc::NfcResult<()>) {
        if let Err(e) = res {
            self.send_error(e.to_string());
        }
    }

    fn send_error(&self, error: String) {
        warn!("{}", error);
        let _ = self.tx.send(OutgoingMessage::READER_ERROR { error });
    }

    fn sync_mode(&mut self) {
        let mode = self.controller.mode();
        if mode != self.last_mode {
            self.last_mode = mode;
            let _ = self.tx.send(OutgoingMessage::MODE_CHANGED { mode });
        }
    }
}

fn raw_record_json(record: &simplenfc::NdefRecord) -> RecordJson {
    RecordJson::Raw {
        id: String::from_utf8_lossy(record.id_bytes()).into_owned(),
        tnf: record.tnf,
        record_type: hex::encode(&record.record_type),
        payload: hex::encode(&record.payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_client_resumes_and_last_pauses() {
        let mut presence = ClientPresence::default();
        assert_eq!(presence.connected(), Some(LifecyclePhase::Resumed));
        assert_eq!(presence.connected(), None);
        assert_eq!(presence.disconnected(), None);
        assert_eq!(presence.disconnected(), Some(LifecyclePhase::Paused));
        assert_eq!(presence.disconnected(), None);
    }

    fn service() -> (Service, Receiver<OutgoingMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let service = Service {
            tx,
            controller: NfcController::new(MessageCodec::new("svc.test"), PcscTransport::default()),
            registry: HandlerRegistry::in_memory(),
            presence: ClientPresence::default(),
            last_mode: Mode::Sleep,
        };
        (service, rx)
    }

    #[test]
    fn leave_and_join_in_any_order_ends_resumed() {
        // client A leaves while client B joins; either arrival order leaves
        // one client connected and the controller resumed
        let orders = [
            [NfcCommand::ClientDisconnected, NfcCommand::ClientConnected],
            [NfcCommand::ClientConnected, NfcCommand::ClientDisconnected],
        ];
        for order in orders {
            let (mut service, _events) = service();
            service.handle_command(NfcCommand::ClientConnected);
            for cmd in order {
                service.handle_command(cmd);
            }
            assert_eq!(service.presence.count, 1);
            assert_eq!(service.controller.phase(), LifecyclePhase::Resumed);
        }
    }

    #[test]
    fn foreground_arms_for_a_client_that_joined_during_a_leave() {
        let (mut service, events) = service();
        service.handle_command(NfcCommand::ClientConnected);
        service.handle_command(NfcCommand::ClientDisconnected);
        service.handle_command(NfcCommand::ClientConnected);
        service.handle_command(NfcCommand::StartForeground);

        assert_eq!(service.controller.armed(), Some(Mode::Foreground));
        assert!(
            events
                .try_iter()
                .any(|e| matches!(e, OutgoingMessage::MODE_CHANGED { mode: Mode::Foreground }))
        );
    }
}
