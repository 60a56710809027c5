// src/ndef.rs
//! NDEF record wire format and the TLV container tags store it in.

use crate::error::{DecodeError, EncodeError};
use crate::types::{NdefRecord, TNF_EMPTY, TNF_UNCHANGED};

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

const TLV_NULL: u8 = 0x00;
const TLV_NDEF: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;

impl NdefRecord {
    pub fn new(tnf: u8, record_type: &[u8], id: &[u8], payload: &[u8]) -> Self {
        NdefRecord {
            tnf,
            record_type: record_type.to_vec(),
            payload: payload.to_vec(),
            id: if id.is_empty() {
                None
            } else {
                Some(id.to_vec())
            },
        }
    }

    pub fn id_bytes(&self) -> &[u8] {
        self.id.as_deref().unwrap_or(&[])
    }
}

/// Type, id and payload lengths must fit their length fields; TNF must be
/// one a standalone record may carry.
fn check_record(record: &NdefRecord) -> Result<(), EncodeError> {
    if record.tnf > TNF_MASK || record.tnf == TNF_UNCHANGED {
        return Err(EncodeError::InvalidTnf(record.tnf));
    }
    let limits = [
        ("record type", record.record_type.len(), u8::MAX as usize),
        ("record id", record.id_bytes().len(), u8::MAX as usize),
        ("payload", record.payload.len(), u32::MAX as usize),
    ];
    for (field, len, max) in limits {
        if len > max {
            return Err(EncodeError::TooLong { field, len, max });
        }
    }
    Ok(())
}

pub fn encode_record(record: &NdefRecord, mb: bool, me: bool) -> Result<Vec<u8>, EncodeError> {
    check_record(record)?;
    let id = record.id_bytes();
    let short = record.payload.len() <= u8::MAX as usize;

    // Bit 7: MB, Bit 6: ME, Bit 5: CF(0), Bit 4: SR, Bit 3: IL, Bits 2-0: TNF
    let mut header = record.tnf & TNF_MASK;
    if mb {
        header |= FLAG_MB;
    }
    if me {
        header |= FLAG_ME;
    }
    if short {
        header |= FLAG_SR;
    }
    if !id.is_empty() {
        header |= FLAG_IL;
    }

    let mut out = Vec::with_capacity(6 + record.record_type.len() + id.len() + record.payload.len());
    out.push(header);
    out.push(record.record_type.len() as u8); // Type Length
    if short {
        out.push(record.payload.len() as u8);
    } else {
        out.extend_from_slice(&(record.payload.len() as u32).to_be_bytes());
    }
    if !id.is_empty() {
        out.push(id.len() as u8);
    }
    out.extend_from_slice(&record.record_type);
    out.extend_from_slice(id);
    out.extend_from_slice(&record.payload);
    Ok(out)
}

/// Serializes records into one NDEF message, setting MB on the first and ME on
/// the last. An empty slice yields a single empty record.
pub fn encode_message(records: &[NdefRecord]) -> Result<Vec<u8>, EncodeError> {
    if records.is_empty() {
        return Ok(vec![FLAG_MB | FLAG_ME | FLAG_SR | TNF_EMPTY, 0, 0]);
    }
    let mut full_message = Vec::new();
    for (i, r) in records.iter().enumerate() {
        let mb = i == 0;
        let me = i == records.len() - 1;
        full_message.extend(encode_record(r, mb, me)?);
    }
    Ok(full_message)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::Truncated {
            needed: usize::MAX,
            available: self.data.len() - self.pos,
        })?;
        if end > self.data.len() {
            return Err(DecodeError::Truncated {
                needed: n,
                available: self.data.len() - self.pos,
            });
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }
}

pub fn parse_ndef_records(data: &[u8]) -> Result<Vec<NdefRecord>, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::EmptyMessage);
    }

    let mut records = Vec::new();
    let mut cursor = Cursor { data, pos: 0 };

    while cursor.pos < data.len() {
        let header = cursor.byte()?;
        let tnf = header & TNF_MASK;
        let is_short_record = (header & FLAG_SR) != 0;
        let has_id = (header & FLAG_IL) != 0;
        let is_me = (header & FLAG_ME) != 0;

        if (header & FLAG_CF) != 0 || tnf == TNF_UNCHANGED {
            return Err(DecodeError::ChunkedRecord);
        }

        let type_len = cursor.byte()? as usize;

        // 1 byte for Short Record, 4 bytes otherwise
        let payload_len = if is_short_record {
            cursor.byte()? as usize
        } else {
            let b = cursor.take(4)?;
            u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
        };

        let id_len = if has_id { cursor.byte()? as usize } else { 0 };

        let record_type = cursor.take(type_len)?.to_vec();
        let id = if has_id {
            Some(cursor.take(id_len)?.to_vec())
        } else {
            None
        };
        let payload = cursor.take(payload_len)?.to_vec();

        records.push(NdefRecord {
            tnf,
            record_type,
            payload,
            id,
        });

        if is_me {
            break;
        }
    }

    Ok(records)
}

pub fn wrap_in_tlv(ndef_bytes: &[u8]) -> Vec<u8> {
    let mut tlv = Vec::with_capacity(ndef_bytes.len() + 5);
    tlv.push(TLV_NDEF);

    // L: one byte below 0xFF, otherwise 0xFF followed by a 16-bit length
    if ndef_bytes.len() < 0xFF {
        tlv.push(ndef_bytes.len() as u8);
    } else {
        tlv.push(0xFF);
        tlv.extend_from_slice(&(ndef_bytes.len() as u16).to_be_bytes());
    }

    tlv.extend_from_slice(ndef_bytes);
    tlv.push(TLV_TERMINATOR);
    tlv
}

/// Bytes needed to store `ndef_len` bytes of NDEF as a terminated TLV.
pub fn tlv_size(ndef_len: usize) -> usize {
    let header = if ndef_len < 0xFF { 2 } else { 4 };
    header + ndef_len + 1
}

/// Finds the first NDEF TLV in a tag memory image and returns its value.
pub fn unwrap_tlv(buffer: &[u8]) -> Result<&[u8], DecodeError> {
    let mut pos = 0;
    while pos < buffer.len() {
        let tag = buffer[pos];
        match tag {
            TLV_NULL => {
                pos += 1;
                continue;
            }
            TLV_TERMINATOR => break,
            _ => {}
        }

        let (len, value_start) = match buffer.get(pos + 1) {
            Some(0xFF) => match (buffer.get(pos + 2), buffer.get(pos + 3)) {
                (Some(&hi), Some(&lo)) => (u16::from_be_bytes([hi, lo]) as usize, pos + 4),
                _ => return Err(DecodeError::Tlv("Invalid buffer length".into())),
            },
            Some(&l) => (l as usize, pos + 2),
            None => return Err(DecodeError::Tlv("Invalid buffer length".into())),
        };

        if value_start + len > buffer.len() {
            return Err(DecodeError::Tlv("Incomplete data".into()));
        }

        if tag == TLV_NDEF {
            return Ok(&buffer[value_start..value_start + len]);
        }
        // lock / memory control / proprietary TLVs are skipped
        pos = value_start + len;
    }
    Err(DecodeError::Tlv("No NDEF TLV found".into()))
}
