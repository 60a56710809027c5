// src/message.rs
//! Messages: an identity record followed by the caller's records.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::error::{DecodeError, EncodeError};
use crate::ndef;
use crate::record::{self, NfcRecord};
use crate::types::{MessageJson, NdefRecord, RecordJson, TNF_MIME_MEDIA};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcMessage {
    id: String,
    records: Vec<NfcRecord>,
}

impl NfcMessage {
    pub fn new(id: impl Into<String>) -> Self {
        NfcMessage {
            id: id.into(),
            records: Vec::new(),
        }
    }

    pub fn with_records(id: impl Into<String>, records: Vec<NfcRecord>) -> Self {
        NfcMessage {
            id: id.into(),
            records,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Records in insertion order, identity record excluded.
    pub fn records(&self) -> &[NfcRecord] {
        &self.records
    }

    pub fn add_record(&mut self, record: NfcRecord) -> &mut Self {
        self.records.push(record);
        self
    }

    pub fn add_text(&mut self, id: impl Into<String>, content: &str) -> &mut Self {
        self.add_record(NfcRecord::text(id, content))
    }

    pub fn add_map(&mut self, id: impl Into<String>, map: &BTreeMap<String, String>) -> &mut Self {
        self.add_record(NfcRecord::map(id, map))
    }

    pub fn add_raw(&mut self, id: impl Into<String>, tnf: u8, record_type: &[u8], payload: &[u8]) -> &mut Self {
        self.add_record(NfcRecord::raw(id, tnf, record_type, payload))
    }

    /// Last record carrying `id`.
    pub fn record(&self, id: &str) -> Option<&NfcRecord> {
        self.records.iter().rev().find(|r| r.id == id)
    }

    /// Records keyed by id; a later record shadows an earlier one with the same id.
    pub fn record_set(&self) -> BTreeMap<&str, &NfcRecord> {
        self.records.iter().map(|r| (r.id.as_str(), r)).collect()
    }
}

impl fmt::Display for NfcMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = std::iter::once(self.id.as_str())
            .chain(self.records.iter().map(|r| r.id.as_str()))
            .collect();
        write!(
            f,
            "NfcMessage '{}' with {} records ({})",
            self.id,
            ids.len(),
            ids.join(", ")
        )
    }
}

impl From<&NfcMessage> for MessageJson {
    fn from(message: &NfcMessage) -> Self {
        MessageJson {
            id: message.id.clone(),
            records: message.records.iter().map(RecordJson::from).collect(),
        }
    }
}

impl TryFrom<MessageJson> for NfcMessage {
    type Error = DecodeError;

    fn try_from(json: MessageJson) -> Result<Self, Self::Error> {
        let records = json
            .records
            .into_iter()
            .map(NfcRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NfcMessage::with_records(json.id, records))
    }
}

/// Composes and parses messages scoped to one application.
///
/// The identity record is a MIME media record of type `application/<scope>`
/// whose id is the message id and whose payload is empty.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    mime_type: String,
}

impl MessageCodec {
    pub fn new(app_scope: &str) -> Self {
        MessageCodec {
            mime_type: format!("application/{}", app_scope),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn identity_record(&self, id: &str) -> NdefRecord {
        NdefRecord::new(TNF_MIME_MEDIA, self.mime_type.as_bytes(), id.as_bytes(), &[])
    }

    pub fn to_ndef_records(&self, id: &str, records: &[NfcRecord]) -> Result<Vec<NdefRecord>, EncodeError> {
        std::iter::once(Ok(self.identity_record(id)))
            .chain(records.iter().map(record::encode))
            .collect()
    }

    /// Fails when an id or type does not fit its NDEF length field, or a raw
    /// record cannot be told apart from a typed one.
    pub fn compose(&self, id: &str, records: &[NfcRecord]) -> Result<Vec<u8>, EncodeError> {
        let bytes = ndef::encode_message(&self.to_ndef_records(id, records)?)?;
        debug!("composed message '{}': {}", id, hex::encode(&bytes));
        Ok(bytes)
    }

    pub fn compose_message(&self, message: &NfcMessage) -> Result<Vec<u8>, EncodeError> {
        self.compose(&message.id, &message.records)
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<NfcMessage, DecodeError> {
        let records = ndef::parse_ndef_records(bytes)?;
        self.parse_records(&records)
    }

    /// Whether `record` is this application's identity record.
    pub fn is_identity(&self, record: &NdefRecord) -> bool {
        record.tnf == TNF_MIME_MEDIA && record.record_type == self.mime_type.as_bytes()
    }

    pub fn parse_records(&self, records: &[NdefRecord]) -> Result<NfcMessage, DecodeError> {
        let (identity, rest) = records.split_first().ok_or(DecodeError::EmptyMessage)?;
        if !self.is_identity(identity) {
            return Err(DecodeError::MissingIdentity);
        }
        let id = std::str::from_utf8(identity.id_bytes())
            .map_err(|_| DecodeError::InvalidUtf8("message id"))?
            .to_string();

        let mut decoded: Vec<NfcRecord> = Vec::with_capacity(rest.len());
        for raw in rest {
            let rec = record::decode(raw)?;
            match decoded.iter_mut().find(|r| r.id == rec.id) {
                Some(existing) => *existing = rec,
                None => decoded.push(rec),
            }
        }

        Ok(NfcMessage::with_records(id, decoded))
    }
}
