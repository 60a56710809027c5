// src/controller.rs
//! Transfer mode state machine bound to the host lifecycle.
//!
//! The controller owns at most one pending operation. The platform transport is
//! armed for it only while the host is resumed, and every completion clears the
//! pending state before the caller's listener runs, so a listener may call back
//! into the controller (for example to [`NfcController::reset`] or queue the
//! next write).

use std::cell::{Ref, RefCell, RefMut};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{NfcError, NfcResult};
use crate::message::{MessageCodec, NfcMessage};
use crate::ndef;
use crate::tag::{self, TagTarget};
use crate::types::{DiscoveryFilter, LifecyclePhase, Mode, NdefRecord, WriteOutcome};

/// The platform's NFC radio, as seen by the controller.
pub trait Transport {
    /// Whether the radio is switched on.
    fn is_enabled(&self) -> bool;

    /// Registers for encounters of the given kind. `outbound` carries the
    /// composed message for write and push modes.
    fn arm(&mut self, mode: Mode, filter: DiscoveryFilter, outbound: Option<&[u8]>);

    fn disarm(&mut self, mode: Mode);
}

pub type WriteListener = Box<dyn FnOnce(WriteOutcome)>;
pub type PushListener = Box<dyn FnOnce()>;
pub type ForegroundListener = Box<dyn FnMut(Received)>;

/// What a foreground listener is handed for each tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// A message composed by this application.
    Message(NfcMessage),
    /// NDEF written by someone else.
    Ndef(Vec<NdefRecord>),
}

/// What happens to a pending operation when a new one is requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingPolicy {
    /// The previous operation is dropped and its listener never runs.
    #[default]
    Replace,
    /// The request fails with [`NfcError::Busy`].
    Reject,
}

enum Pending {
    Idle,
    Write {
        message: Vec<u8>,
        listener: Option<WriteListener>,
    },
    Push {
        message: Vec<u8>,
    },
    Beam {
        message: Vec<u8>,
        listener: Option<PushListener>,
    },
    Foreground {
        // None while the listener is running
        listener: Option<ForegroundListener>,
    },
}

impl Pending {
    fn mode(&self) -> Mode {
        match self {
            Pending::Idle => Mode::Sleep,
            Pending::Write { .. } => Mode::Write,
            Pending::Push { .. } => Mode::Push,
            Pending::Beam { .. } => Mode::Beam,
            Pending::Foreground { .. } => Mode::Foreground,
        }
    }
}

struct State {
    phase: LifecyclePhase,
    pending: Pending,
    armed: Option<Mode>,
    // bumped for every new request and reset, so a foreground listener taken
    // out for a callback is not put back into a newer operation
    epoch: u64,
}

pub struct NfcController<T: Transport> {
    codec: MessageCodec,
    policy: PendingPolicy,
    transport: RefCell<T>,
    state: RefCell<State>,
}

impl<T: Transport> NfcController<T> {
    pub fn new(codec: MessageCodec, transport: T) -> Self {
        Self::with_policy(codec, transport, PendingPolicy::default())
    }

    pub fn with_policy(codec: MessageCodec, transport: T, policy: PendingPolicy) -> Self {
        NfcController {
            codec,
            policy,
            transport: RefCell::new(transport),
            state: RefCell::new(State {
                phase: LifecyclePhase::Created,
                pending: Pending::Idle,
                armed: None,
                epoch: 0,
            }),
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.borrow().pending.mode()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.state.borrow().phase
    }

    pub fn armed(&self) -> Option<Mode> {
        self.state.borrow().armed
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    pub fn transport(&self) -> Ref<'_, T> {
        self.transport.borrow()
    }

    pub fn transport_mut(&self) -> RefMut<'_, T> {
        self.transport.borrow_mut()
    }

    /// Waits for the next tag and writes `message` to it. Arms right away when
    /// the host is resumed, otherwise on the next resume.
    pub fn request_write<F>(&self, message: &NfcMessage, listener: F) -> NfcResult<()>
    where
        F: FnOnce(WriteOutcome) + 'static,
    {
        let bytes = self.codec.compose_message(message)?;
        info!("Write requested for message '{}' ({} bytes)", message.id(), bytes.len());
        self.begin(Pending::Write {
            message: bytes,
            listener: Some(Box::new(listener)),
        })?;
        self.arm_if_resumed();
        Ok(())
    }

    /// Offers `message` to peer devices for as long as the host stays resumed.
    pub fn request_push(&self, message: &NfcMessage) -> NfcResult<()> {
        let bytes = self.codec.compose_message(message)?;
        info!("Push requested for message '{}'", message.id());
        self.begin(Pending::Push { message: bytes })?;
        self.arm_if_resumed();
        Ok(())
    }

    /// Pushes `message` to one peer device. Arms immediately, whatever the
    /// lifecycle phase, and returns to sleep after the first completed push.
    pub fn request_beam<F>(&self, message: &NfcMessage, listener: F) -> NfcResult<()>
    where
        F: FnOnce() + 'static,
    {
        let bytes = self.codec.compose_message(message)?;
        info!("Beam requested for message '{}'", message.id());
        self.begin(Pending::Beam {
            message: bytes,
            listener: Some(Box::new(listener)),
        })?;
        self.arm_pending();
        Ok(())
    }

    /// Reports every tag to `listener` until [`reset`](Self::reset).
    pub fn request_foreground_dispatch<F>(&self, listener: F) -> NfcResult<()>
    where
        F: FnMut(Received) + 'static,
    {
        info!("Foreground dispatch requested");
        self.begin(Pending::Foreground {
            listener: Some(Box::new(listener)),
        })?;
        self.arm_if_resumed();
        Ok(())
    }

    pub fn on_lifecycle(&self, phase: LifecyclePhase) {
        debug!("Lifecycle -> {:?}", phase);
        self.state.borrow_mut().phase = phase;
        match phase {
            LifecyclePhase::Created => {}
            LifecyclePhase::Resumed => {
                let rearm = {
                    let state = self.state.borrow();
                    state.armed.is_none()
                        && matches!(state.pending.mode(), Mode::Write | Mode::Push | Mode::Foreground)
                };
                if rearm {
                    self.arm_pending();
                }
            }
            LifecyclePhase::Paused => self.disarm(),
        }
    }

    /// Drops whatever is pending and returns to sleep. Safe to call at any
    /// time, including from inside a listener.
    pub fn reset(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.epoch += 1;
            if !matches!(state.pending, Pending::Idle) {
                info!("Reset from {:?}", state.pending.mode());
            }
            state.pending = Pending::Idle;
        }
        self.disarm();
    }

    /// Handles a tag entering the field. Returns false when no armed mode
    /// wanted it, leaving the tag to the caller's default routing.
    pub fn on_tag_discovered(&self, tag: &mut dyn TagTarget) -> bool {
        let armed = self.state.borrow().armed;
        match armed {
            Some(Mode::Write) => {
                let Some((message, listener)) = self.take_write() else {
                    return false;
                };
                let outcome = if self.transport.borrow().is_enabled() {
                    tag::write_message(tag, &message)
                } else {
                    WriteOutcome::TransportDisabled
                };
                Self::notify_write(listener, outcome);
                true
            }
            Some(Mode::Foreground) => {
                match tag.read_ndef() {
                    Ok(bytes) => {
                        self.on_ndef_received(&bytes);
                    }
                    Err(e) => warn!("Could not read tag in foreground mode: {}", e),
                }
                true
            }
            _ => false,
        }
    }

    /// Reports the outcome of a write the transport carried out itself. A
    /// stale outcome, with no write armed, is ignored and returns false.
    pub fn complete_write(&self, outcome: WriteOutcome) -> bool {
        if self.state.borrow().armed != Some(Mode::Write) {
            debug!("Ignoring write outcome with no write armed: {}", outcome);
            return false;
        }
        match self.take_write() {
            Some((_, listener)) => {
                Self::notify_write(listener, outcome);
                true
            }
            None => false,
        }
    }

    /// Delivers NDEF bytes read while foreground dispatch is armed.
    pub fn on_ndef_received(&self, bytes: &[u8]) -> bool {
        let (mut listener, epoch) = {
            let mut state = self.state.borrow_mut();
            if state.armed != Some(Mode::Foreground) {
                return false;
            }
            let epoch = state.epoch;
            match &mut state.pending {
                Pending::Foreground { listener } => match listener.take() {
                    Some(l) => (l, epoch),
                    None => return false,
                },
                _ => return false,
            }
        };

        debug!("Foreground NDEF: {}", hex::encode(bytes));
        match ndef::parse_ndef_records(bytes) {
            Ok(records) => {
                let received = match records.first() {
                    Some(first) if self.codec.is_identity(first) => match self.codec.parse_records(&records) {
                        Ok(message) => Received::Message(message),
                        Err(e) => {
                            warn!("Dropping malformed message: {}", e);
                            Received::Ndef(records)
                        }
                    },
                    _ => Received::Ndef(records),
                };
                listener(received);
            }
            Err(e) => warn!("Dropping unreadable NDEF in foreground mode: {}", e),
        }

        // put the listener back unless it was replaced or reset meanwhile
        let mut state = self.state.borrow_mut();
        if state.epoch == epoch {
            if let Pending::Foreground { listener: slot } = &mut state.pending {
                if slot.is_none() {
                    *slot = Some(listener);
                }
            }
        }
        true
    }

    /// Handles the platform's "push complete" callback.
    pub fn on_push_complete(&self) -> bool {
        let armed = self.state.borrow().armed;
        match armed {
            Some(Mode::Beam) => {
                let listener = {
                    let mut state = self.state.borrow_mut();
                    state.epoch += 1;
                    match std::mem::replace(&mut state.pending, Pending::Idle) {
                        Pending::Beam { listener, .. } => listener,
                        _ => None,
                    }
                };
                self.disarm();
                info!("Beam completed");
                if let Some(listener) = listener {
                    listener();
                }
                true
            }
            Some(Mode::Push) => {
                info!("Push completed, still offering message");
                true
            }
            _ => false,
        }
    }

    fn begin(&self, next: Pending) -> NfcResult<()> {
        let current = self.mode();
        if current != Mode::Sleep {
            if self.policy == PendingPolicy::Reject {
                return Err(NfcError::Busy { pending: current });
            }
            warn!("Abandoning pending {:?} operation for {:?}", current, next.mode());
        }
        self.disarm();
        let mut state = self.state.borrow_mut();
        state.epoch += 1;
        state.pending = next;
        Ok(())
    }

    fn arm_if_resumed(&self) {
        if self.phase() == LifecyclePhase::Resumed {
            self.arm_pending();
        } else {
            debug!("Host not resumed, arming deferred");
        }
    }

    fn arm_pending(&self) {
        let mut state = self.state.borrow_mut();
        let mut transport = self.transport.borrow_mut();
        let (mode, filter, outbound) = match &state.pending {
            Pending::Idle => return,
            Pending::Write { message, .. } => (Mode::Write, DiscoveryFilter::SingleTag, Some(message.as_slice())),
            Pending::Push { message } => (Mode::Push, DiscoveryFilter::Peer, Some(message.as_slice())),
            Pending::Beam { message, .. } => (Mode::Beam, DiscoveryFilter::Peer, Some(message.as_slice())),
            Pending::Foreground { .. } => (Mode::Foreground, DiscoveryFilter::AnyTag, None),
        };
        info!("Arming transport for {:?}", mode);
        transport.arm(mode, filter, outbound);
        state.armed = Some(mode);
    }

    fn disarm(&self) {
        let armed = self.state.borrow_mut().armed.take();
        if let Some(mode) = armed {
            info!("Disarming transport for {:?}", mode);
            self.transport.borrow_mut().disarm(mode);
        }
    }

    fn take_write(&self) -> Option<(Vec<u8>, Option<WriteListener>)> {
        let taken = {
            let mut state = self.state.borrow_mut();
            if !matches!(state.pending, Pending::Write { .. }) {
                return None;
            }
            state.epoch += 1;
            match std::mem::replace(&mut state.pending, Pending::Idle) {
                Pending::Write { message, listener } => Some((message, listener)),
                _ => None,
            }
        };
        self.disarm();
        taken
    }

    fn notify_write(listener: Option<WriteListener>, outcome: WriteOutcome) {
        if let Some(listener) = listener {
            listener(outcome);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::NfcRecord;
    use crate::tag::tests::FakeTag;
    use crate::types::TNF_WELL_KNOWN;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Records every arm/disarm call.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub disabled: bool,
        pub armed: Vec<(Mode, DiscoveryFilter)>,
        pub disarmed: Vec<Mode>,
        pub last_outbound: Option<Vec<u8>>,
    }

    impl Transport for RecordingTransport {
        fn is_enabled(&self) -> bool {
            !self.disabled
        }

        fn arm(&mut self, mode: Mode, filter: DiscoveryFilter, outbound: Option<&[u8]>) {
            self.armed.push((mode, filter));
            self.last_outbound = outbound.map(<[u8]>::to_vec);
        }

        fn disarm(&mut self, mode: Mode) {
            self.disarmed.push(mode);
        }
    }

    fn controller() -> NfcController<RecordingTransport> {
        NfcController::new(MessageCodec::new("test.app"), RecordingTransport::default())
    }

    fn resumed() -> NfcController<RecordingTransport> {
        let c = controller();
        c.on_lifecycle(LifecyclePhase::Resumed);
        c
    }

    fn ping() -> NfcMessage {
        NfcMessage::with_records("ping", vec![NfcRecord::text("greeting", "hi")])
    }

    fn outcomes() -> (Rc<RefCell<Vec<WriteOutcome>>>, impl FnOnce(WriteOutcome) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |o| sink.borrow_mut().push(o))
    }

    #[test]
    fn starts_asleep_and_created() {
        let c = controller();
        assert_eq!(c.mode(), Mode::Sleep);
        assert_eq!(c.phase(), LifecyclePhase::Created);
        assert_eq!(c.armed(), None);
    }

    #[test]
    fn write_arms_immediately_when_resumed() {
        let c = resumed();
        c.request_write(&ping(), |_| {}).unwrap();
        assert_eq!(c.mode(), Mode::Write);
        assert_eq!(c.armed(), Some(Mode::Write));
        assert_eq!(c.transport().armed, vec![(Mode::Write, DiscoveryFilter::SingleTag)]);
        assert_eq!(
            c.transport().last_outbound.as_deref(),
            Some(c.codec().compose_message(&ping()).unwrap().as_slice())
        );
    }

    #[test]
    fn write_is_deferred_until_resume() {
        let c = controller();
        c.request_write(&ping(), |_| {}).unwrap();
        assert_eq!(c.armed(), None);
        assert!(c.transport().armed.is_empty());

        c.on_lifecycle(LifecyclePhase::Resumed);
        assert_eq!(c.armed(), Some(Mode::Write));
    }

    #[test]
    fn created_phase_has_no_side_effects() {
        let c = resumed();
        c.request_write(&ping(), |_| {}).unwrap();
        c.on_lifecycle(LifecyclePhase::Created);
        assert_eq!(c.transport().armed.len(), 1);
        assert!(c.transport().disarmed.is_empty());
    }

    #[test]
    fn pause_disarms_and_resume_rearms() {
        let c = resumed();
        c.request_foreground_dispatch(|_| {}).unwrap();
        c.on_lifecycle(LifecyclePhase::Paused);
        assert_eq!(c.armed(), None);
        assert_eq!(c.transport().disarmed, vec![Mode::Foreground]);
        assert_eq!(c.mode(), Mode::Foreground);

        c.on_lifecycle(LifecyclePhase::Resumed);
        assert_eq!(c.armed(), Some(Mode::Foreground));
        assert_eq!(c.transport().armed.len(), 2);
    }

    #[test]
    fn success_invokes_listener_once_and_sleeps() {
        let c = resumed();
        let (seen, listener) = outcomes();
        c.request_write(&ping(), listener).unwrap();

        assert!(c.complete_write(WriteOutcome::Written));
        assert_eq!(c.mode(), Mode::Sleep);
        assert_eq!(c.armed(), None);
        assert_eq!(*seen.borrow(), vec![WriteOutcome::Written]);

        // stale outcome for the finished operation
        assert!(!c.complete_write(WriteOutcome::Written));
        assert!(!c.complete_write(WriteOutcome::ReadOnlyTarget));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn failure_is_terminal() {
        let c = resumed();
        let (seen, listener) = outcomes();
        c.request_write(&ping(), listener).unwrap();
        c.complete_write(WriteOutcome::CapacityExceeded {
            available: 10,
            required: 40,
        });
        assert_eq!(c.mode(), Mode::Sleep);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn tag_discovery_writes_pending_message() {
        let c = resumed();
        let (seen, listener) = outcomes();
        c.request_write(&ping(), listener).unwrap();

        let mut tag = FakeTag::ndef(512);
        assert!(c.on_tag_discovered(&mut tag));
        assert_eq!(*seen.borrow(), vec![WriteOutcome::Written]);
        assert_eq!(c.codec().parse(&tag.stored).unwrap(), ping());

        // a second tag is not written
        let mut other = FakeTag::ndef(512);
        assert!(!c.on_tag_discovered(&mut other));
        assert_eq!(other.writes, 0);
    }

    #[test]
    fn disabled_transport_reports_disabled() {
        let c = resumed();
        c.transport_mut().disabled = true;
        let (seen, listener) = outcomes();
        c.request_write(&ping(), listener).unwrap();
        let mut tag = FakeTag::ndef(512);
        c.on_tag_discovered(&mut tag);
        assert_eq!(*seen.borrow(), vec![WriteOutcome::TransportDisabled]);
        assert_eq!(tag.writes, 0);
    }

    #[test]
    fn push_replaces_pending_write() {
        let c = resumed();
        let (seen, listener) = outcomes();
        c.request_write(&ping(), listener).unwrap();
        c.request_push(&ping()).unwrap();

        assert_eq!(c.mode(), Mode::Push);
        assert_eq!(c.armed(), Some(Mode::Push));
        assert!(!c.complete_write(WriteOutcome::Written));
        assert!(seen.borrow().is_empty());
        assert_eq!(c.transport().disarmed, vec![Mode::Write]);
    }

    #[test]
    fn reject_policy_reports_busy() {
        let c = NfcController::with_policy(
            MessageCodec::new("test.app"),
            RecordingTransport::default(),
            PendingPolicy::Reject,
        );
        c.on_lifecycle(LifecyclePhase::Resumed);
        c.request_write(&ping(), |_| {}).unwrap();
        let err = c.request_push(&ping()).unwrap_err();
        assert!(matches!(err, NfcError::Busy { pending: Mode::Write }));
        assert_eq!(c.mode(), Mode::Write);

        c.reset();
        assert!(c.request_push(&ping()).is_ok());
    }

    #[test]
    fn beam_arms_while_paused_and_completes_once() {
        let c = controller();
        c.on_lifecycle(LifecyclePhase::Paused);
        let pushed = Rc::new(Cell::new(0));
        let counter = pushed.clone();
        c.request_beam(&ping(), move || counter.set(counter.get() + 1)).unwrap();
        assert_eq!(c.armed(), Some(Mode::Beam));
        assert_eq!(c.transport().armed, vec![(Mode::Beam, DiscoveryFilter::Peer)]);

        assert!(c.on_push_complete());
        assert_eq!(pushed.get(), 1);
        assert_eq!(c.mode(), Mode::Sleep);
        assert!(!c.on_push_complete());
        assert_eq!(pushed.get(), 1);
    }

    #[test]
    fn beam_is_not_rearmed_on_resume() {
        let c = resumed();
        c.request_beam(&ping(), || {}).unwrap();
        c.on_lifecycle(LifecyclePhase::Paused);
        c.on_lifecycle(LifecyclePhase::Resumed);
        assert_eq!(c.armed(), None);
        assert_eq!(c.mode(), Mode::Beam);
    }

    #[test]
    fn push_stays_armed_after_completion() {
        let c = resumed();
        c.request_push(&ping()).unwrap();
        assert!(c.on_push_complete());
        assert_eq!(c.mode(), Mode::Push);
        assert_eq!(c.armed(), Some(Mode::Push));
    }

    #[test]
    fn reset_is_idempotent() {
        let c = resumed();
        c.request_write(&ping(), |_| {}).unwrap();
        c.reset();
        c.reset();
        assert_eq!(c.mode(), Mode::Sleep);
        assert_eq!(c.transport().disarmed, vec![Mode::Write]);
    }

    #[test]
    fn foreground_is_reusable() {
        let c = resumed();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        c.request_foreground_dispatch(move |r| sink.borrow_mut().push(r)).unwrap();

        let bytes = c.codec().compose_message(&ping()).unwrap();
        let mut tag = FakeTag::holding(bytes.clone());
        assert!(c.on_tag_discovered(&mut tag));
        assert!(c.on_ndef_received(&bytes));
        assert_eq!(c.mode(), Mode::Foreground);
        assert_eq!(
            *received.borrow(),
            vec![Received::Message(ping()), Received::Message(ping())]
        );
    }

    #[test]
    fn foreground_hands_over_foreign_ndef() {
        let c = resumed();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        c.request_foreground_dispatch(move |r| sink.borrow_mut().push(r)).unwrap();

        let foreign = NdefRecord::new(TNF_WELL_KNOWN, b"U", b"", b"\x04example.com");
        assert!(c.on_ndef_received(&ndef::encode_message(std::slice::from_ref(&foreign)).unwrap()));
        assert_eq!(*received.borrow(), vec![Received::Ndef(vec![foreign])]);
    }

    #[test]
    fn events_after_pause_are_ignored() {
        let c = resumed();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        c.request_foreground_dispatch(move |_| counter.set(counter.get() + 1)).unwrap();
        let (seen, listener) = outcomes();
        c.on_lifecycle(LifecyclePhase::Paused);

        let bytes = c.codec().compose_message(&ping()).unwrap();
        assert!(!c.on_ndef_received(&bytes));
        assert!(!c.on_tag_discovered(&mut FakeTag::holding(bytes)));
        assert_eq!(hits.get(), 0);

        c.request_write(&ping(), listener).unwrap();
        assert!(!c.complete_write(WriteOutcome::Written));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn listener_may_reset_from_inside_callback() {
        let c = Rc::new(resumed());
        let weak = Rc::downgrade(&c);
        c.request_foreground_dispatch(move |_| {
            if let Some(c) = weak.upgrade() {
                c.reset();
            }
        })
        .unwrap();

        let bytes = c.codec().compose_message(&ping()).unwrap();
        assert!(c.on_ndef_received(&bytes));
        assert_eq!(c.mode(), Mode::Sleep);
        assert_eq!(c.armed(), None);
    }

    #[test]
    fn write_listener_may_queue_next_write() {
        let c = Rc::new(resumed());
        let weak = Rc::downgrade(&c);
        c.request_write(&ping(), move |_| {
            if let Some(c) = weak.upgrade() {
                c.request_write(&ping(), |_| {}).unwrap();
            }
        })
        .unwrap();

        assert!(c.complete_write(WriteOutcome::Written));
        assert_eq!(c.mode(), Mode::Write);
        assert_eq!(c.armed(), Some(Mode::Write));
    }

    #[test]
    fn unencodable_message_is_refused_without_touching_pending() {
        let c = resumed();
        let (seen, listener) = outcomes();
        c.request_write(&ping(), listener).unwrap();

        let too_long = NfcMessage::with_records("m", vec![NfcRecord::text("k".repeat(300), "v")]);
        let err = c.request_push(&too_long).unwrap_err();
        assert!(matches!(err, NfcError::Encode(_)));
        assert!(matches!(c.request_write(&too_long, |_| {}), Err(NfcError::Encode(_))));

        assert_eq!(c.mode(), Mode::Write);
        assert_eq!(c.armed(), Some(Mode::Write));
        assert!(c.complete_write(WriteOutcome::Written));
        assert_eq!(*seen.borrow(), vec![WriteOutcome::Written]);
    }
}
