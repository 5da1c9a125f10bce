//! Reader for the Vector Informatik Binary Logging Format (BLF).
//!
//! BLF files aggregate automotive-bus traces (CAN/CAN-FD, LIN, FlexRay,
//! Ethernet, WLAN) together with status and application-text records. The
//! physical file is a sequence of *log containers* whose payloads are raw
//! or DEFLATE-compressed; the decompressed concatenation forms a virtual
//! byte stream in which the actual log objects live, possibly straddling
//! container boundaries.
//!
//! # Architecture
//!
//! - the container layer scans the file once at open, then maps virtual
//!   byte ranges onto containers, decompressing lazily and caching the
//!   result for the lifetime of the reader
//! - the object framer locates `LOBJ` headers in the virtual stream
//!   (resynchronising over padding), selects the log-object header
//!   variant and extracts flags and timestamp
//! - one translator per object type reshapes the bus-specific payload
//!   into a canonical on-the-wire frame (SocketCAN for all CAN variants,
//!   reassembled Ethernet headers, FlexRay measurement headers, LIN
//!   frames, exported-PDU envelopes for text and status records)
//!
//! The reader does not interpret payloads, does not write BLF files and
//! skips unknown object types.
//!
//! # Example
//!
//! ```no_run
//! use blf_log_reader::BlfReader;
//! use std::fs::File;
//!
//! let sequential = File::open("trace.blf").unwrap();
//! let random = File::open("trace.blf").unwrap();
//! let mut reader = BlfReader::open(sequential, random).unwrap();
//!
//! let mut buf = Vec::new();
//! while let Some((record, data_offset)) = reader.read(&mut buf).unwrap() {
//!     println!(
//!         "{}.{:09} iface {} caplen {} (offset {})",
//!         record.ts_secs, record.ts_nsecs, record.interface_id, record.caplen, data_offset
//!     );
//! }
//! ```

pub mod epdu;
pub mod format;
pub mod types;

mod container;
mod interface;
mod reader;
mod translate;

pub use interface::NO_HW_CHANNEL;
pub use reader::{BlfReader, FileStats};
pub use types::{
    BlfError, Direction, Encap, InterfaceDescription, InterfaceSink, Record, RecordOptions,
    Result, TimestampPrecision, SNAPLEN_STANDARD,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
