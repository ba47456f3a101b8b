//! Commit log entries and their on-disk framing.
//!
//! ```text
//! | magic "OFSL" (4) | version (2) | type (1) | length (4) | payload | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The payload is the CBOR encoding of the
//! entry. The CRC covers every byte before it.

use crate::error::{CoreError, CoreResult};
use crate::event::{EventStatus, SyncEvent};
use crate::record::Record;
use offsync_sync_protocol::{from_cbor, to_cbor, EventId};
use serde::{Deserialize, Serialize};

/// Magic bytes opening every frame.
pub const LOG_MAGIC: [u8; 4] = *b"OFSL";

/// Current frame format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum FrameType {
    Commit = 1,
    Snapshot = 2,
}

impl FrameType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Commit),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// A single state change inside a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Insert or replace a record.
    Put {
        /// Target collection.
        collection: String,
        /// New record state.
        record: Record,
    },
    /// Remove a record.
    Delete {
        /// Target collection.
        collection: String,
        /// Record id.
        id: String,
    },
    /// Add an event to the outbox.
    Enqueue {
        /// The event, always pending.
        event: SyncEvent,
    },
    /// Move a pending event to a terminal status.
    Settle {
        /// Event id.
        id: EventId,
        /// Terminal status.
        status: EventStatus,
    },
    /// Flag a record as held by the remote.
    MarkRecordSynced {
        /// Target collection.
        collection: String,
        /// Record id.
        id: String,
    },
    /// Drop synced events from the outbox.
    Purge {
        /// Event ids.
        ids: Vec<EventId>,
    },
}

/// One atomic transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit sequence number, strictly increasing.
    pub sequence: u64,
    /// Changes, applied in order.
    pub ops: Vec<WriteOp>,
}

/// Full store state written by compaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sequence of the last commit folded in.
    pub sequence: u64,
    /// Last local clock value.
    pub clock: u64,
    /// Records grouped by collection.
    pub collections: Vec<(String, Vec<Record>)>,
    /// Outbox events in delivery order.
    pub events: Vec<SyncEvent>,
}

/// Anything that can appear in the log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// A committed transaction.
    Commit(Commit),
    /// A compacted state image. Replaces everything before it.
    Snapshot(Snapshot),
}

/// Outcome of decoding a frame at the start of a buffer.
#[derive(Debug)]
pub(crate) enum Decoded {
    /// A valid frame and its length in bytes.
    Entry(LogEntry, usize),
    /// The buffer ends before the frame does.
    Incomplete,
    /// The frame is present but unusable. `len` is its full size when the
    /// header could be trusted.
    Damaged {
        reason: String,
        len: Option<usize>,
    },
}

/// Encodes an entry into a framed byte sequence.
pub fn encode_frame(entry: &LogEntry) -> CoreResult<Vec<u8>> {
    let (frame_type, payload) = match entry {
        LogEntry::Commit(commit) => (FrameType::Commit, to_cbor(commit)?),
        LogEntry::Snapshot(snapshot) => (FrameType::Snapshot, to_cbor(snapshot)?),
    };
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::invalid_operation("commit too large for one log frame"))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.push(frame_type as u8);
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Decodes the frame at the start of `buf`.
pub(crate) fn decode_frame(buf: &[u8]) -> Decoded {
    if buf.len() < HEADER_SIZE {
        return Decoded::Incomplete;
    }
    if buf[0..4] != LOG_MAGIC {
        return Decoded::Damaged {
            reason: "bad magic".into(),
            len: None,
        };
    }
    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if version != LOG_VERSION {
        return Decoded::Damaged {
            reason: format!("unsupported frame version {version}"),
            len: None,
        };
    }
    let frame_type = buf[6];
    let payload_len = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize;
    let total = HEADER_SIZE + payload_len + CRC_SIZE;
    if buf.len() < total {
        return Decoded::Incomplete;
    }

    let body_end = HEADER_SIZE + payload_len;
    let stored = u32::from_le_bytes([
        buf[body_end],
        buf[body_end + 1],
        buf[body_end + 2],
        buf[body_end + 3],
    ]);
    if stored != compute_crc32(&buf[..body_end]) {
        return Decoded::Damaged {
            reason: "checksum mismatch".into(),
            len: Some(total),
        };
    }

    let payload = &buf[HEADER_SIZE..body_end];
    let entry = match FrameType::from_byte(frame_type) {
        Some(FrameType::Commit) => from_cbor(payload).map(LogEntry::Commit),
        Some(FrameType::Snapshot) => from_cbor(payload).map(LogEntry::Snapshot),
        None => {
            return Decoded::Damaged {
                reason: format!("unknown frame type {frame_type}"),
                len: Some(total),
            }
        }
    };
    match entry {
        Ok(entry) => Decoded::Entry(entry, total),
        Err(e) => Decoded::Damaged {
            reason: e.to_string(),
            len: Some(total),
        },
    }
}

/// CRC-32 (IEEE polynomial).
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_sync_protocol::MutationKind;
    use serde_json::json;

    fn sample_commit() -> LogEntry {
        let event = SyncEvent::new(MutationKind::create("clients"), "c-1", json!({"name": "Ana"}), 4);
        LogEntry::Commit(Commit {
            sequence: 1,
            ops: vec![
                WriteOp::Put {
                    collection: "clients".into(),
                    record: Record::new("c-1", json!({"name": "Ana"}), 4),
                },
                WriteOp::Enqueue { event },
            ],
        })
    }

    #[test]
    fn crc32_check_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn frame_decodes_to_same_entry() {
        let entry = sample_commit();
        let bytes = encode_frame(&entry).unwrap();
        match decode_frame(&bytes) {
            Decoded::Entry(decoded, len) => {
                assert_eq!(decoded, entry);
                assert_eq!(len, bytes.len());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_buffers_are_incomplete() {
        let bytes = encode_frame(&sample_commit()).unwrap();
        assert!(matches!(decode_frame(&bytes[..5]), Decoded::Incomplete));
        assert!(matches!(
            decode_frame(&bytes[..bytes.len() - 1]),
            Decoded::Incomplete
        ));
    }

    #[test]
    fn flipped_payload_byte_is_detected() {
        let mut bytes = encode_frame(&sample_commit()).unwrap();
        bytes[HEADER_SIZE + 2] ^= 0xFF;
        let total = bytes.len();
        match decode_frame(&bytes) {
            Decoded::Damaged { len, .. } => assert_eq!(len, Some(total)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_filled_tail_is_damaged() {
        let zeros = vec![0u8; 32];
        assert!(matches!(
            decode_frame(&zeros),
            Decoded::Damaged { len: None, .. }
        ));
    }
}
