//! Core types emitted by the BLF reader.
//!
//! This module defines the record metadata the reader hands to its caller
//! for every framed object, the interface-description callback surface,
//! and the error taxonomy. The reader is deliberately minimal: it reshapes
//! payloads into canonical on-the-wire frames but never interprets their
//! semantics.

use thiserror::Error;

/// Result type for reader operations
pub type Result<T> = std::result::Result<T, BlfError>;

/// Largest capture length a synthesised interface advertises to the host.
pub const SNAPLEN_STANDARD: u32 = 262_144;

/// Errors that can occur while reading a BLF file
#[derive(Debug, Error)]
pub enum BlfError {
    /// The file does not start with the BLF magic. The caller may hand the
    /// byte source to another reader.
    #[error("not a BLF file")]
    NotMine,

    /// The file declares sizes or offsets that contradict its own layout.
    #[error("malformed BLF file: {0}")]
    BadFile(String),

    /// A structurally valid construct the reader does not handle, e.g. an
    /// unknown compression method or a nested log container.
    #[error("unsupported BLF construct: {0}")]
    Unsupported(String),

    /// Inflating a compressed log container did not produce the declared
    /// number of bytes.
    #[error("log container decompression failed: {0}")]
    Decompress(String),

    /// An object or payload extends past the end of the virtual stream.
    #[error("short read inside BLF object")]
    ShortRead,

    /// A reader-side inconsistency, kept separate from file errors.
    #[error("internal reader error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Link-type tag naming how a record's payload bytes are to be interpreted
/// downstream.
///
/// The numeric values follow the pcap LINKTYPE registry so consumers can
/// map records without a translation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encap {
    Ethernet,
    Ieee80211,
    FlexRay,
    Lin,
    SocketCan,
    /// Exported-PDU envelope carrying synthetic (non-link-layer) data with
    /// a dissector hint.
    UpperPdu,
    Unknown,
}

impl Encap {
    /// pcap LINKTYPE value for this encapsulation.
    pub fn linktype(self) -> u32 {
        match self {
            Encap::Ethernet => 1,
            Encap::Ieee80211 => 105,
            Encap::FlexRay => 210,
            Encap::Lin => 212,
            Encap::SocketCan => 227,
            Encap::UpperPdu => 252,
            Encap::Unknown => 0xffff_ffff,
        }
    }
}

/// Direction of a captured frame relative to the logging node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Unknown,
    Inbound,
    Outbound,
}

impl Direction {
    /// Numeric value used by the pcapng packet-flags option.
    pub fn flag_value(self) -> u32 {
        match self {
            Direction::Unknown => 0,
            Direction::Inbound => 1,
            Direction::Outbound => 2,
        }
    }
}

/// Resolution of an object's timestamp as declared by its log object header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPrecision {
    Nanoseconds,
    TenMicroseconds,
}

/// Options attached to a single record.
///
/// The reader only ever emits these two; both are optional per record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOptions {
    pub direction: Option<Direction>,
    /// Hardware queue the frame was captured on.
    pub packet_queue: Option<u32>,
}

/// Metadata for one framed record.
///
/// The payload itself is appended to the caller-supplied scratch buffer;
/// `caplen` always equals the number of bytes the translator appended for
/// this record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Timestamp seconds since the UTC epoch
    pub ts_secs: u64,
    /// Timestamp nanosecond remainder
    pub ts_nsecs: u32,
    pub ts_precision: TimestampPrecision,
    /// Bytes captured into the output buffer
    pub caplen: u32,
    /// Original on-the-wire length
    pub len: u32,
    pub encap: Encap,
    /// Stable interface id assigned by the registry, dense from 0
    pub interface_id: u32,
    /// Timestamp relative to the capture start, in nanoseconds
    pub ts_rel_cap_ns: i64,
    pub options: RecordOptions,
}

/// Description of an interface the reader synthesises while framing.
///
/// Handed to the host exactly once per new `(encap, channel, hw-channel)`
/// combination, in interface-id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescription {
    pub encap: Encap,
    pub name: String,
    pub time_units_per_second: u32,
    /// Timestamp resolution as a power-of-ten exponent (9 = nanoseconds)
    pub tsresol: u8,
    pub snaplen: u32,
}

/// Host callback invoked for every interface the reader creates.
///
/// The interface id is not part of the description: it is the caller-local
/// sequence number of the callback invocation, starting at 0.
pub trait InterfaceSink {
    fn register_interface(&mut self, desc: &InterfaceDescription);
}

impl<F: FnMut(&InterfaceDescription)> InterfaceSink for F {
    fn register_interface(&mut self, desc: &InterfaceDescription) {
        self(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encap_linktypes_are_distinct() {
        let all = [
            Encap::Ethernet,
            Encap::Ieee80211,
            Encap::FlexRay,
            Encap::Lin,
            Encap::SocketCan,
            Encap::UpperPdu,
            Encap::Unknown,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.linktype(), b.linktype());
            }
        }
    }

    #[test]
    fn direction_flag_values() {
        assert_eq!(Direction::Unknown.flag_value(), 0);
        assert_eq!(Direction::Inbound.flag_value(), 1);
        assert_eq!(Direction::Outbound.flag_value(), 2);
    }
}
