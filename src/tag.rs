// src/tag.rs
use log::{info, warn};

use crate::error::TagIoError;
use crate::types::WriteOutcome;

/// How a discovered tag can take an NDEF message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTech {
    /// Already NDEF formatted.
    Ndef { writable: bool, max_size: usize },
    /// Blank, can be formatted with an initial message.
    Formatable,
    /// Neither.
    Unsupported,
}

/// A tag currently in the field, as exposed by the platform.
pub trait TagTarget {
    fn tech(&mut self) -> Result<TagTech, TagIoError>;

    /// Raw NDEF message bytes currently stored on the tag.
    fn read_ndef(&mut self) -> Result<Vec<u8>, TagIoError>;

    fn write_ndef(&mut self, message: &[u8]) -> Result<(), TagIoError>;

    fn format_ndef(&mut self, message: &[u8]) -> Result<(), TagIoError>;
}

/// Writes an NDEF message, reporting the outcome instead of failing.
pub fn write_message(tag: &mut dyn TagTarget, message: &[u8]) -> WriteOutcome {
    let size = message.len();

    let outcome = match tag.tech() {
        Err(e) => from_io(e),
        Ok(TagTech::Ndef { writable: false, .. }) => WriteOutcome::ReadOnlyTarget,
        Ok(TagTech::Ndef { max_size, .. }) if max_size < size => WriteOutcome::CapacityExceeded {
            available: max_size,
            required: size,
        },
        Ok(TagTech::Ndef { .. }) => tag.write_ndef(message).map_or_else(from_io, |_| WriteOutcome::Written),
        Ok(TagTech::Formatable) => tag.format_ndef(message).map_or_else(from_io, |_| WriteOutcome::Written),
        Ok(TagTech::Unsupported) => WriteOutcome::UnsupportedTag,
    };

    if outcome.is_success() {
        info!("Wrote {} byte NDEF message to tag", size);
    } else {
        warn!("Tag write failed: {}", outcome);
    }
    outcome
}

fn from_io(err: TagIoError) -> WriteOutcome {
    match err {
        TagIoError::Io(reason) => WriteOutcome::TransportIoFailure { reason },
        TagIoError::Format(reason) => WriteOutcome::IncompatibleFormat { reason },
    }
}
