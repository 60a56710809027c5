// src/record.rs
//! Typed records and their mapping onto NDEF records.

use std::collections::BTreeMap;
use std::str;

use crate::error::{DecodeError, EncodeError};
use crate::types::{MAP_RECORD_TYPE, NdefRecord, RecordJson, STRING_RECORD_TYPE, TNF_WELL_KNOWN};

/// Version byte leading every map payload.
pub const MAP_ENCODING_VERSION: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Text,
    Map,
    /// Foreign record kept as-is, with its own TNF and type.
    Raw { tnf: u8, record_type: Vec<u8> },
}

impl RecordKind {
    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::Text => "STRING",
            RecordKind::Map => "MAP",
            RecordKind::Raw { .. } => "RAW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcRecord {
    pub id: String,
    pub kind: RecordKind,
    pub payload: Vec<u8>,
}

impl NfcRecord {
    pub fn text(id: impl Into<String>, content: &str) -> Self {
        NfcRecord {
            id: id.into(),
            kind: RecordKind::Text,
            payload: content.as_bytes().to_vec(),
        }
    }

    pub fn map(id: impl Into<String>, map: &BTreeMap<String, String>) -> Self {
        NfcRecord {
            id: id.into(),
            kind: RecordKind::Map,
            payload: encode_map(map),
        }
    }

    /// A record with caller-chosen TNF and type, for other NDEF consumers.
    pub fn raw(id: impl Into<String>, tnf: u8, record_type: &[u8], payload: &[u8]) -> Self {
        NfcRecord {
            id: id.into(),
            kind: RecordKind::Raw {
                tnf,
                record_type: record_type.to_vec(),
            },
            payload: payload.to_vec(),
        }
    }

    pub fn as_text(&self) -> Result<&str, DecodeError> {
        str::from_utf8(&self.payload).map_err(|_| DecodeError::InvalidUtf8("string record"))
    }

    pub fn as_map(&self) -> Result<BTreeMap<String, String>, DecodeError> {
        decode_map(&self.payload)
    }
}

/// A raw record may not borrow the string or map type, or it would come back
/// as one of them.
pub fn encode(record: &NfcRecord) -> Result<NdefRecord, EncodeError> {
    let (tnf, record_type) = match &record.kind {
        RecordKind::Text => (TNF_WELL_KNOWN, STRING_RECORD_TYPE),
        RecordKind::Map => (TNF_WELL_KNOWN, MAP_RECORD_TYPE),
        RecordKind::Raw { tnf, record_type } => {
            if *tnf == TNF_WELL_KNOWN && (record_type == STRING_RECORD_TYPE || record_type == MAP_RECORD_TYPE) {
                return Err(EncodeError::ReservedType {
                    id: record.id.clone(),
                    record_type: String::from_utf8_lossy(record_type).into_owned(),
                });
            }
            (*tnf, record_type.as_slice())
        }
    };
    Ok(NdefRecord::new(tnf, record_type, record.id.as_bytes(), &record.payload))
}

/// Maps an NDEF record back to a typed record. Unknown types come back as
/// [`RecordKind::Raw`]; a map record whose payload does not decode is an error.
pub fn decode(record: &NdefRecord) -> Result<NfcRecord, DecodeError> {
    let id = str::from_utf8(record.id_bytes())
        .map_err(|_| DecodeError::InvalidUtf8("record id"))?
        .to_string();

    let kind = if record.tnf == TNF_WELL_KNOWN && record.record_type == STRING_RECORD_TYPE {
        if str::from_utf8(&record.payload).is_err() {
            return Err(DecodeError::InvalidUtf8("string record"));
        }
        RecordKind::Text
    } else if record.tnf == TNF_WELL_KNOWN && record.record_type == MAP_RECORD_TYPE {
        decode_map(&record.payload)?;
        RecordKind::Map
    } else {
        RecordKind::Raw {
            tnf: record.tnf,
            record_type: record.record_type.clone(),
        }
    };

    Ok(NfcRecord {
        id,
        kind,
        payload: record.payload.clone(),
    })
}

// Layout: [version][count: u32 BE] then per entry [len: u32 BE][key][len: u32 BE][value],
// entries in key order so equal maps give equal bytes.
pub fn encode_map(map: &BTreeMap<String, String>) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(MAP_ENCODING_VERSION);
    out.extend_from_slice(&(map.len() as u32).to_be_bytes());
    for (key, value) in map {
        out.extend_from_slice(&(key.len() as u32).to_be_bytes());
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&(value.len() as u32).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    out
}

pub fn decode_map(bytes: &[u8]) -> Result<BTreeMap<String, String>, DecodeError> {
    let (&version, rest) = bytes
        .split_first()
        .ok_or_else(|| DecodeError::CorruptedMap("empty payload".into()))?;
    if version != MAP_ENCODING_VERSION {
        return Err(DecodeError::UnsupportedMapVersion(version));
    }

    let mut rest = rest;
    let count = read_u32(&mut rest)? as usize;
    // every entry needs at least its two length prefixes
    if count > rest.len() / 8 {
        return Err(DecodeError::CorruptedMap(format!(
            "{} entries cannot fit in {} bytes",
            count,
            rest.len()
        )));
    }

    let mut map = BTreeMap::new();
    for _ in 0..count {
        let key = read_string(&mut rest)?;
        let value = read_string(&mut rest)?;
        if map.insert(key.clone(), value).is_some() {
            return Err(DecodeError::CorruptedMap(format!("duplicate key '{}'", key)));
        }
    }

    if !rest.is_empty() {
        return Err(DecodeError::CorruptedMap(format!(
            "{} trailing bytes",
            rest.len()
        )));
    }
    Ok(map)
}

fn read_u32(input: &mut &[u8]) -> Result<u32, DecodeError> {
    if input.len() < 4 {
        return Err(DecodeError::CorruptedMap("truncated length prefix".into()));
    }
    let (head, tail) = input.split_at(4);
    *input = tail;
    Ok(u32::from_be_bytes([head[0], head[1], head[2], head[3]]))
}

fn read_string(input: &mut &[u8]) -> Result<String, DecodeError> {
    let len = read_u32(input)? as usize;
    if input.len() < len {
        return Err(DecodeError::CorruptedMap("truncated entry".into()));
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    String::from_utf8(head.to_vec()).map_err(|_| DecodeError::InvalidUtf8("map entry"))
}

impl From<&NfcRecord> for RecordJson {
    fn from(record: &NfcRecord) -> Self {
        let as_raw = |tnf: u8, record_type: &[u8]| RecordJson::Raw {
            id: record.id.clone(),
            tnf,
            record_type: hex::encode(record_type),
            payload: hex::encode(&record.payload),
        };
        match &record.kind {
            RecordKind::Text => match record.as_text() {
                Ok(value) => RecordJson::Text {
                    id: record.id.clone(),
                    value: value.to_string(),
                },
                Err(_) => as_raw(TNF_WELL_KNOWN, STRING_RECORD_TYPE),
            },
            RecordKind::Map => match record.as_map() {
                Ok(value) => RecordJson::Map {
                    id: record.id.clone(),
                    value,
                },
                Err(_) => as_raw(TNF_WELL_KNOWN, MAP_RECORD_TYPE),
            },
            RecordKind::Raw { tnf, record_type } => as_raw(*tnf, record_type),
        }
    }
}

impl TryFrom<RecordJson> for NfcRecord {
    type Error = DecodeError;

    fn try_from(json: RecordJson) -> Result<Self, Self::Error> {
        match json {
            RecordJson::Text { id, value } => Ok(NfcRecord::text(id, &value)),
            RecordJson::Map { id, value } => Ok(NfcRecord::map(id, &value)),
            RecordJson::Raw {
                id,
                tnf,
                record_type,
                payload,
            } => {
                let record_type = hex::decode(&record_type).map_err(|e| DecodeError::InvalidHex {
                    field: "record_type",
                    reason: e.to_string(),
                })?;
                let payload = hex::decode(&payload).map_err(|e| DecodeError::InvalidHex {
                    field: "payload",
                    reason: e.to_string(),
                })?;
                Ok(NfcRecord::raw(id, tnf, &record_type, &payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TNF_EXTERNAL, TNF_MIME_MEDIA};

    fn sample_map() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("room".to_string(), "B-204".to_string());
        map.insert("floor".to_string(), "2".to_string());
        map.insert("".to_string(), "empty key".to_string());
        map
    }

    #[test]
    fn text_record_encodes_as_well_known_string() {
        let ndef = encode(&NfcRecord::text("greeting", "hi")).unwrap();
        assert_eq!(ndef.tnf, TNF_WELL_KNOWN);
        assert_eq!(ndef.record_type, b"string");
        assert_eq!(ndef.id_bytes(), b"greeting");
        assert_eq!(ndef.payload, b"hi");

        let back = decode(&ndef).unwrap();
        assert_eq!(back.kind, RecordKind::Text);
        assert_eq!(back.as_text().unwrap(), "hi");
    }

    #[test]
    fn map_record_survives_encode_decode() {
        let record = NfcRecord::map("meta", &sample_map());
        let back = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(back.kind, RecordKind::Map);
        assert_eq!(back.as_map().unwrap(), sample_map());
    }

    #[test]
    fn map_bytes_are_stable() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), "2".to_string());
        map.insert("a".to_string(), "1".to_string());
        assert_eq!(
            encode_map(&map),
            vec![
                0x01, 0, 0, 0, 2, //
                0, 0, 0, 1, b'a', 0, 0, 0, 1, b'1', //
                0, 0, 0, 1, b'b', 0, 0, 0, 1, b'2',
            ]
        );
    }

    #[test]
    fn unknown_type_decodes_as_raw() {
        let ndef = NdefRecord::new(TNF_EXTERNAL, b"android.com:pkg", b"", b"de.example.app");
        let record = decode(&ndef).unwrap();
        assert_eq!(record.id, "");
        assert_eq!(
            record.kind,
            RecordKind::Raw {
                tnf: TNF_EXTERNAL,
                record_type: b"android.com:pkg".to_vec()
            }
        );
        assert_eq!(encode(&record).unwrap(), ndef);
    }

    #[test]
    fn string_type_under_other_tnf_is_raw() {
        let ndef = NdefRecord::new(TNF_MIME_MEDIA, b"string", b"x", b"y");
        assert_eq!(decode(&ndef).unwrap().kind.name(), "RAW");
    }

    #[test]
    fn corrupted_map_payload_is_a_decode_error() {
        let mut payload = encode_map(&sample_map());
        payload.truncate(payload.len() - 3);
        let ndef = NdefRecord::new(TNF_WELL_KNOWN, MAP_RECORD_TYPE, b"meta", &payload);
        assert!(matches!(decode(&ndef), Err(DecodeError::CorruptedMap(_))));

        assert!(matches!(decode_map(&[]), Err(DecodeError::CorruptedMap(_))));
        assert_eq!(
            decode_map(&[0xAC, 0xED, 0x00, 0x05]),
            Err(DecodeError::UnsupportedMapVersion(0xAC))
        );
    }

    #[test]
    fn oversized_count_is_rejected_before_allocating() {
        let bytes = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0];
        assert!(matches!(decode_map(&bytes), Err(DecodeError::CorruptedMap(_))));
    }

    #[test]
    fn duplicate_and_trailing_bytes_are_rejected() {
        let dup = [
            0x01, 0, 0, 0, 2, //
            0, 0, 0, 1, b'a', 0, 0, 0, 0, //
            0, 0, 0, 1, b'a', 0, 0, 0, 0,
        ];
        assert!(matches!(decode_map(&dup), Err(DecodeError::CorruptedMap(_))));

        let mut trailing = encode_map(&BTreeMap::new());
        trailing.push(0);
        assert!(matches!(decode_map(&trailing), Err(DecodeError::CorruptedMap(_))));
    }

    #[test]
    fn invalid_utf8_string_record_is_rejected() {
        let ndef = NdefRecord::new(TNF_WELL_KNOWN, STRING_RECORD_TYPE, b"s", &[0xFF, 0xFE]);
        assert_eq!(decode(&ndef), Err(DecodeError::InvalidUtf8("string record")));
    }

    #[test]
    fn json_conversion_keeps_raw_bytes_as_hex() {
        let record = NfcRecord::raw("r", TNF_MIME_MEDIA, b"text/x", &[0xDE, 0xAD]);
        let json = RecordJson::from(&record);
        assert_eq!(
            json,
            RecordJson::Raw {
                id: "r".into(),
                tnf: TNF_MIME_MEDIA,
                record_type: "746578742f78".into(),
                payload: "dead".into(),
            }
        );
        assert_eq!(NfcRecord::try_from(json).unwrap(), record);
    }

    #[test]
    fn json_with_bad_hex_fails() {
        let json = RecordJson::Raw {
            id: "r".into(),
            tnf: 2,
            record_type: "zz".into(),
            payload: "".into(),
        };
        assert!(matches!(
            NfcRecord::try_from(json),
            Err(DecodeError::InvalidHex { field: "record_type", .. })
        ));
    }

    #[test]
    fn raw_record_cannot_pose_as_string_or_map() {
        for reserved in [STRING_RECORD_TYPE, MAP_RECORD_TYPE] {
            let record = NfcRecord::raw("r", TNF_WELL_KNOWN, reserved, &[0xFF]);
            assert!(matches!(encode(&record), Err(EncodeError::ReservedType { .. })));
        }

        // same type under another TNF, or another well-known type, stays raw
        let mime = NfcRecord::raw("r", TNF_MIME_MEDIA, b"string", b"ok");
        assert_eq!(decode(&encode(&mime).unwrap()).unwrap(), mime);
        let uri = NfcRecord::raw("u", TNF_WELL_KNOWN, b"U", b"\x04example.com");
        assert_eq!(decode(&encode(&uri).unwrap()).unwrap(), uri);
    }
}
