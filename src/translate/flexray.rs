//! FlexRay translators.
//!
//! All three object shapes are rendered as a 7-byte synthetic header — a
//! measurement byte selecting channel A/B, an error-flags byte, then the
//! 5-byte FlexRay frame header — followed by the payload bytes.

use std::io::{Read, Seek};

use crate::format::{self, FlexRayData, FlexRayMessage, FlexRayRcvMessage};
use crate::interface::NO_HW_CHANNEL;
use crate::reader::ReadCtx;
use crate::translate::{append_from_stream, check_payload_header, direction_from};
use crate::types::{Encap, Record, Result};

fn measurement_byte(channel_b: bool) -> u8 {
    if channel_b {
        format::FLEXRAY_FRAME | format::FLEXRAY_CHANNEL_B
    } else {
        format::FLEXRAY_FRAME
    }
}

/// Pack frame id, payload length, header CRC and cycle into the 5-byte
/// FlexRay frame header; `state_bits` carries the PPI/SFI/NFI/STFI flags.
fn frame_header(state_bits: u8, frame_id: u16, payload_length: u8, header_crc: u16, cycle: u8) -> [u8; 5] {
    [
        state_bits | ((frame_id >> 8) as u8 & 0x07),
        (frame_id & 0xff) as u8,
        (payload_length & 0xfe) | ((header_crc >> 10) as u8 & 0x01),
        ((header_crc >> 2) & 0xff) as u8,
        (((header_crc & 0x0003) as u8) << 6) | (cycle & 0x3f),
    ]
}

fn warn_on_odd_length(payload_length: u16) {
    if payload_length & 0x01 == 0x01 {
        log::debug!("reading odd payload length in FlexRay");
    }
}

fn warn_on_bad_channel(channel: u16) {
    if channel != 0 && channel != 1 {
        log::debug!("FlexRay supports only two channels");
    }
}

/// FlexRay data frame
pub(crate) fn read_data<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, FlexRayData::SIZE, "FLEXRAY_DATA")?;

    let mut raw = [0u8; FlexRayData::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: FlexRayData = format::read_struct(&raw)?;

    let payload_length = header.len as u16;
    warn_on_odd_length(payload_length);
    warn_on_bad_channel(header.channel);

    let available = object_length - header_span - FlexRayData::SIZE as u64;
    let mut payload_length_valid = payload_length;
    if payload_length_valid as u64 > available {
        log::debug!("shortening FlexRay payload because object is too short");
        payload_length_valid = available as u16;
    }

    buf.push(measurement_byte(header.channel != 0));
    buf.push(0); // error flags
    // Data frames are never null frames, so NFI is always set.
    buf.extend_from_slice(&frame_header(
        format::FLEXRAY_HDR_NFI,
        header.message_id,
        header.len,
        header.crc,
        header.mux,
    ));

    append_from_stream(
        &mut ctx.vr,
        buf,
        data_start + FlexRayData::SIZE as u64,
        payload_length_valid as usize,
    )?;

    let caplen = 7 + payload_length_valid as u32;
    let len = 7 + payload_length as u32;
    let mut record = ctx.init_rec(
        flags,
        timestamp,
        Encap::FlexRay,
        header.channel,
        NO_HW_CHANNEL,
        caplen,
        len,
    );
    record.options.direction = Some(direction_from(header.direction as u16));
    Ok(record)
}

/// FlexRay V6 message
pub(crate) fn read_message<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, FlexRayMessage::SIZE, "FLEXRAY_MESSAGE")?;

    let mut raw = [0u8; FlexRayMessage::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: FlexRayMessage = format::read_struct(&raw)?;

    let payload_length = header.length as u16;
    warn_on_odd_length(payload_length);
    warn_on_bad_channel(header.channel);

    let available = object_length - header_span - FlexRayMessage::SIZE as u64;
    let mut payload_length_valid = payload_length;
    if payload_length_valid as u64 > available {
        log::debug!("shortening FlexRay payload because object is too short");
        payload_length_valid = available as u16;
    }

    let mut state_bits = 0u8;
    if header.frame_state & format::FLEXRAYMESSAGE_STATE_PPI != 0 {
        state_bits |= format::FLEXRAY_HDR_PPI;
    }
    if header.frame_state & format::FLEXRAYMESSAGE_STATE_SFI != 0 {
        state_bits |= format::FLEXRAY_HDR_SFI;
    }
    if header.frame_state & format::FLEXRAYMESSAGE_STATE_NFI == 0 {
        // NFI is stored inverted relative to the wire representation
        state_bits |= format::FLEXRAY_HDR_NFI;
    }
    if header.frame_state & format::FLEXRAYMESSAGE_STATE_STFI != 0 {
        state_bits |= format::FLEXRAY_HDR_STFI;
    }

    buf.push(measurement_byte(header.channel != 0));
    buf.push(0); // error flags
    buf.extend_from_slice(&frame_header(
        state_bits,
        header.frame_id,
        header.length,
        header.header_crc,
        header.cycle,
    ));

    append_from_stream(
        &mut ctx.vr,
        buf,
        data_start + FlexRayMessage::SIZE as u64,
        payload_length_valid as usize,
    )?;

    let caplen = 7 + payload_length_valid as u32;
    let len = 7 + payload_length as u32;
    let mut record = ctx.init_rec(
        flags,
        timestamp,
        Encap::FlexRay,
        header.channel,
        NO_HW_CHANNEL,
        caplen,
        len,
    );
    record.options.direction = Some(direction_from(header.direction as u16));
    Ok(record)
}

/// FlexRay receive message, plain or extended
#[allow(clippy::too_many_arguments)]
pub(crate) fn read_rcv_message<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
    ext: bool,
) -> Result<Record> {
    let what = if ext { "FLEXRAY_RCVMESSAGE_EX" } else { "FLEXRAY_RCVMESSAGE" };
    let header_size = if ext {
        FlexRayRcvMessage::SIZE + FlexRayRcvMessage::EXT_EXTRA
    } else {
        FlexRayRcvMessage::SIZE
    };
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, header_size, what)?;

    let mut raw = [0u8; FlexRayRcvMessage::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let mut header: FlexRayRcvMessage = format::read_struct(&raw)?;

    if !ext {
        // High bytes are reserved in the plain variant
        header.direction &= 0xff;
        header.cycle &= 0xff;
    }

    let payload_length = header.payload_length;
    warn_on_odd_length(payload_length);

    let available = object_length - header_span - header_size as u64;
    let mut payload_length_valid = header.payload_length_valid;
    if payload_length_valid as u64 > available {
        log::debug!("shortening FlexRay payload because object is too short");
        payload_length_valid = available as u16;
    }

    let mut state_bits = 0u8;
    if header.data & format::FLEXRAYRCVMSG_DATA_FLAG_PAYLOAD_PREAM != 0 {
        state_bits |= format::FLEXRAY_HDR_PPI;
    }
    if header.data & format::FLEXRAYRCVMSG_DATA_FLAG_SYNC != 0 {
        state_bits |= format::FLEXRAY_HDR_SFI;
    }
    if header.data & format::FLEXRAYRCVMSG_DATA_FLAG_NULL_FRAME == 0 {
        // NFI is stored inverted relative to the wire representation
        state_bits |= format::FLEXRAY_HDR_NFI;
    }
    if header.data & format::FLEXRAYRCVMSG_DATA_FLAG_STARTUP != 0 {
        state_bits |= format::FLEXRAY_HDR_STFI;
    }

    buf.push(measurement_byte(
        header.channel_mask != format::FLEXRAYRCVMSG_CHANNELMASK_A,
    ));
    buf.push(0); // error flags
    buf.extend_from_slice(&frame_header(
        state_bits,
        header.frame_id,
        header.payload_length as u8,
        header.header_crc1,
        header.cycle as u8,
    ));

    append_from_stream(
        &mut ctx.vr,
        buf,
        data_start + header_size as u64,
        payload_length_valid as usize,
    )?;

    let caplen = 7 + payload_length_valid as u32;
    let len = 7 + payload_length as u32;
    let mut record = ctx.init_rec(
        flags,
        timestamp,
        Encap::FlexRay,
        header.channel_mask,
        NO_HW_CHANNEL,
        caplen,
        len,
    );
    record.options.direction = Some(direction_from(header.direction));
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_header_packs_fields() {
        // frame id 0x2a5 spills its top bits into byte 0
        let header = frame_header(format::FLEXRAY_HDR_NFI, 0x02a5, 4, 0x0400, 3);
        assert_eq!(header[0], format::FLEXRAY_HDR_NFI | 0x02);
        assert_eq!(header[1], 0xa5);
        assert_eq!(header[2], 0x04 | 0x01); // even length plus CRC bit 10
        assert_eq!(header[3], 0x00);
        assert_eq!(header[4], 0x03);
    }

    #[test]
    fn measurement_byte_selects_channel() {
        assert_eq!(measurement_byte(false), format::FLEXRAY_FRAME);
        assert_eq!(
            measurement_byte(true),
            format::FLEXRAY_FRAME | format::FLEXRAY_CHANNEL_B
        );
    }
}
