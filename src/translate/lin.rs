//! LIN message translator.

use std::io::{Read, Seek};

use crate::format::{self, LinMessage};
use crate::interface::NO_HW_CHANNEL;
use crate::reader::ReadCtx;
use crate::translate::{check_payload_header, direction_from};
use crate::types::{Encap, Record, Result};

/// LIN message: an 8-byte header carrying format revision, DLC, frame id
/// and checksum, followed by the data bytes.
pub(crate) fn read_message<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    check_payload_header(object_length, data_start - block_start, LinMessage::SIZE, "LIN_MESSAGE")?;

    let mut raw = [0u8; LinMessage::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: LinMessage = format::read_struct(&raw)?;

    let dlc = header.dlc & 0x0f;
    let id = header.id & 0x3f;
    let payload_length = dlc.min(8) as usize;

    buf.extend_from_slice(&[
        1, // message format revision
        0,
        0,
        0,
        dlc << 4, // dlc (4 bit) | type (2 bit) | checksum type (2 bit)
        id,       // parity (2 bit) | id (6 bit)
        (header.crc & 0xff) as u8,
        0, // errors
    ]);
    buf.extend_from_slice(&header.data[..payload_length]);

    let len = 8 + payload_length as u32;
    let mut record = ctx.init_rec(
        flags,
        timestamp,
        Encap::Lin,
        header.channel,
        NO_HW_CHANNEL,
        len,
        len,
    );
    record.options.direction = Some(direction_from(header.direction as u16));
    Ok(record)
}
