//! Per-object-type translators.
//!
//! Every translator follows the same template: validate that the object is
//! large enough for its payload header, parse the header out of the virtual
//! stream, compute the destination byte layout, append the synthesised
//! prefix and then the raw payload bytes to the caller's buffer, and build
//! the record metadata. The number of bytes a translator appends always
//! equals the record's capture length.

pub(crate) mod can;
pub(crate) mod ethernet;
pub(crate) mod flexray;
pub(crate) mod lin;
pub(crate) mod text;

use std::io::{Read, Seek};

use crate::container::VirtualReader;
use crate::format;
use crate::types::{BlfError, Direction, Result};

/// Reject objects whose declared length cannot hold the payload header.
pub(crate) fn check_payload_header(
    object_length: u64,
    header_span: u64,
    payload_header_size: usize,
    what: &str,
) -> Result<()> {
    if object_length < header_span + payload_header_size as u64 {
        log::debug!("not enough bytes for {what} header in object");
        return Err(BlfError::BadFile(format!(
            "{what}: not enough bytes for payload header in object"
        )));
    }
    Ok(())
}

/// Append `len` bytes from the virtual stream to the output buffer.
pub(crate) fn append_from_stream<R: Read + Seek>(
    vr: &mut VirtualReader<'_, R>,
    buf: &mut Vec<u8>,
    pos: u64,
    len: usize,
) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    let offset = buf.len();
    buf.resize(offset + len, 0);
    vr.read(pos, &mut buf[offset..])
}

/// Map an on-disk direction field to the record option value.
pub(crate) fn direction_from(raw: u16) -> Direction {
    match raw {
        format::DIR_RX => Direction::Inbound,
        format::DIR_TX | format::DIR_TX_RQ => Direction::Outbound,
        _ => Direction::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_mapping() {
        assert_eq!(direction_from(format::DIR_RX), Direction::Inbound);
        assert_eq!(direction_from(format::DIR_TX), Direction::Outbound);
        assert_eq!(direction_from(format::DIR_TX_RQ), Direction::Outbound);
        assert_eq!(direction_from(7), Direction::Unknown);
    }

    #[test]
    fn undersized_object_is_rejected() {
        let err = check_payload_header(40, 32, 12, "FLEXRAY_DATA").unwrap_err();
        assert!(matches!(err, BlfError::BadFile(_)));
        assert!(check_payload_header(44, 32, 12, "FLEXRAY_DATA").is_ok());
    }
}
