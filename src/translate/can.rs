//! CAN family translators.
//!
//! All CAN variants converge on the canonical SocketCAN layout: a 4-byte
//! big-endian CAN id (with flag bits folded in), one length byte, three
//! zero bytes, then the payload. Error objects become 16-byte SocketCAN
//! error frames with the error class in the id and detail codes in the
//! payload.

use std::io::{Read, Seek};

use crate::format::{self, CanError, CanErrorExt, CanFdError64, CanFdMessage, CanFdMessage64, CanMessage, CanMessage2Trailer};
use crate::interface::NO_HW_CHANNEL;
use crate::reader::ReadCtx;
use crate::translate::{append_from_stream, check_payload_header, direction_from};
use crate::types::{Direction, Encap, Record, Result};

/// Append the SocketCAN prefix and payload and build the record.
///
/// `dlc_byte` lands in the length byte of the prefix, `cap_payload` bytes
/// are copied from the stream, and `wire_payload` feeds the on-the-wire
/// length so a clamped capture never shrinks the reported frame.
#[allow(clippy::too_many_arguments)]
fn fill_can_record<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    can_id: u32,
    dlc_byte: u8,
    wire_payload: u8,
    cap_payload: u8,
    payload_pos: u64,
    flags: u32,
    timestamp: u64,
    channel: u16,
) -> Result<Record> {
    let mut prefix = [0u8; 8];
    prefix[0..4].copy_from_slice(&can_id.to_be_bytes());
    prefix[4] = dlc_byte;
    buf.extend_from_slice(&prefix);

    append_from_stream(&mut ctx.vr, buf, payload_pos, cap_payload as usize)?;

    let caplen = prefix.len() as u32 + cap_payload as u32;
    let len = prefix.len() as u32 + wire_payload as u32;
    Ok(ctx.init_rec(flags, timestamp, Encap::SocketCan, channel, NO_HW_CHANNEL, caplen, len))
}

/// CAN message / CAN message 2 (the latter carries a trailer to validate)
#[allow(clippy::too_many_arguments)]
pub(crate) fn read_can_message<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
    can_message2: bool,
) -> Result<Record> {
    let what = if can_message2 { "CAN_MESSAGE2" } else { "CAN_MESSAGE" };
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, CanMessage::SIZE, what)?;

    let mut raw = [0u8; CanMessage::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: CanMessage = format::read_struct(&raw)?;

    let dlc = header.dlc & 0x0f;
    let mut payload_length = dlc;
    if payload_length > 8 {
        log::debug!("regular CAN tries more than 8 bytes, cutting to 8");
        payload_length = 8;
    }

    let mut can_id = header.id;
    if header.flags & format::CANMESSAGE_FLAG_RTR != 0 {
        can_id |= format::CAN_RTR_FLAG;
        payload_length = 0;
    }

    let mut record = fill_can_record(
        ctx,
        buf,
        can_id,
        payload_length,
        payload_length,
        payload_length,
        data_start + CanMessage::SIZE as u64,
        flags,
        timestamp,
        header.channel,
    )?;

    if can_message2 {
        let trailer_start = header_span + CanMessage::SIZE as u64 + 8;
        if object_length < trailer_start + CanMessage2Trailer::SIZE as u64 {
            log::debug!("not enough bytes for CAN message 2 trailer");
            return Err(crate::types::BlfError::BadFile(
                "CAN_MESSAGE2: not enough bytes for trailer".into(),
            ));
        }
        let mut raw = [0u8; CanMessage2Trailer::SIZE];
        ctx.vr
            .read(data_start + CanMessage::SIZE as u64 + 8, &mut raw)?;
        let _trailer: CanMessage2Trailer = format::read_struct(&raw)?;
    }

    record.options.direction = Some(if header.flags & format::CANMESSAGE_FLAG_TX != 0 {
        Direction::Outbound
    } else {
        Direction::Inbound
    });
    Ok(record)
}

/// Derive the wire and capture payload lengths for a CAN-FD frame.
///
/// The wire length comes from the DLC alone; the capture length is clamped
/// by the valid-data-bytes field and later by the bytes remaining in the
/// object.
fn fd_lengths(dlc: u8, fd: bool, valid_data_bytes: u8) -> (u8, u8) {
    let wire = if fd {
        format::CANFD_DLC_TO_LENGTH[dlc as usize]
    } else {
        if dlc > 8 {
            log::debug!("regular CAN tries more than 8 bytes?");
        }
        format::CAN_DLC_TO_LENGTH[dlc as usize]
    };
    let mut cap = wire;
    if cap > valid_data_bytes {
        log::debug!("shortening CAN FD payload because valid data bytes is smaller");
        cap = valid_data_bytes;
    }
    (wire, cap)
}

/// CAN-FD message
pub(crate) fn read_can_fd_message<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, CanFdMessage::SIZE, "CAN_FD_MESSAGE")?;

    let mut raw = [0u8; CanFdMessage::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: CanFdMessage = format::read_struct(&raw)?;

    let dlc = header.dlc & 0x0f;
    let fd = header.canfd_flags & format::CANFDMESSAGE_FLAG_EDL != 0;
    let (mut wire, mut cap) = fd_lengths(dlc, fd, header.valid_data_bytes);

    let mut can_id = header.id;
    if !fd && header.flags & format::CANMESSAGE_FLAG_RTR != 0 {
        can_id |= format::CAN_RTR_FLAG;
        wire = 0;
        cap = 0;
    }

    let dlc_byte = cap;
    let remaining = object_length - header_span - CanFdMessage::SIZE as u64;
    if cap as u64 > remaining {
        log::debug!("shortening CAN FD payload because object is too short");
        cap = remaining as u8;
    }

    let mut record = fill_can_record(
        ctx,
        buf,
        can_id,
        dlc_byte,
        wire,
        cap,
        data_start + CanFdMessage::SIZE as u64,
        flags,
        timestamp,
        header.channel,
    )?;
    record.options.direction = Some(if header.flags & format::CANMESSAGE_FLAG_TX != 0 {
        Direction::Outbound
    } else {
        Direction::Inbound
    });
    Ok(record)
}

/// CAN-FD message 64
pub(crate) fn read_can_fd_message64<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, CanFdMessage64::SIZE, "CAN_FD_MESSAGE_64")?;

    let mut raw = [0u8; CanFdMessage64::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: CanFdMessage64 = format::read_struct(&raw)?;

    let dlc = header.dlc & 0x0f;
    let fd = header.flags & format::CANFDMESSAGE64_FLAG_EDL != 0;
    let (mut wire, mut cap) = fd_lengths(dlc, fd, header.valid_data_bytes);

    let mut can_id = header.id;
    if !fd && header.flags & format::CANFDMESSAGE64_FLAG_REMOTE_FRAME != 0 {
        can_id |= format::CAN_RTR_FLAG;
        wire = 0;
        cap = 0;
    }

    let dlc_byte = cap;
    let remaining = object_length - header_span - CanFdMessage64::SIZE as u64;
    if cap as u64 > remaining {
        log::debug!("shortening CAN FD payload because object is too short");
        cap = remaining as u8;
    }

    let mut record = fill_can_record(
        ctx,
        buf,
        can_id,
        dlc_byte,
        wire,
        cap,
        data_start + CanFdMessage64::SIZE as u64,
        flags,
        timestamp,
        header.channel as u16,
    )?;
    record.options.direction = Some(direction_from(header.direction as u16));
    Ok(record)
}

/// Map a CAN-core extended error code onto the SocketCAN detail bytes.
///
/// Returns the protocol-error and ack-error class bits for the CAN id.
fn map_extended_error_code(error_code_ext: u16, frame: &mut [u8; 16]) -> (bool, bool) {
    let mut err_prot = false;
    let mut err_ack = false;

    match (error_code_ext >> 6) & 0x3f {
        format::ECC_MEANING_BIT_ERROR => {
            err_prot = true;
            frame[10] = format::CAN_ERR_PROT_BIT;
        }
        format::ECC_MEANING_FORM_ERROR => {
            err_prot = true;
            frame[10] = format::CAN_ERR_PROT_FORM;
        }
        format::ECC_MEANING_STUFF_ERROR => {
            err_prot = true;
            frame[10] = format::CAN_ERR_PROT_STUFF;
        }
        format::ECC_MEANING_CRC_ERROR => {
            err_prot = true;
            frame[11] = format::CAN_ERR_PROT_LOC_CRC_SEQ;
        }
        format::ECC_MEANING_NACK_ERROR => {
            err_ack = true;
            frame[11] = format::CAN_ERR_PROT_LOC_ACK;
        }
        format::ECC_MEANING_OVERLOAD => {
            err_prot = true;
            frame[10] = format::CAN_ERR_PROT_OVERLOAD;
        }
        _ => {
            err_prot = true;
            frame[10] = format::CAN_ERR_PROT_UNSPEC;
        }
    }

    err_ack = err_ack || error_code_ext & format::CANERROREXT_EXTECC_NOT_ACK == 0;
    if err_ack {
        // Ack errors do not also carry the protocol class
        err_prot = false;
    }
    (err_prot, err_ack)
}

/// Assemble the 16-byte SocketCAN error frame and emit the record.
fn fill_can_error_record<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    mut frame: [u8; 16],
    err_prot: bool,
    err_ack: bool,
    flags: u32,
    timestamp: u64,
    channel: u16,
) -> Record {
    let mut can_id = format::CAN_ERR_FLAG;
    if err_prot {
        can_id |= format::CAN_ERR_PROT;
    }
    if err_ack {
        can_id |= format::CAN_ERR_ACK;
    }

    frame[0..4].copy_from_slice(&can_id.to_be_bytes());
    frame[4] = format::CAN_ERR_DLC;
    buf.extend_from_slice(&frame);

    let len = frame.len() as u32;
    ctx.init_rec(flags, timestamp, Encap::SocketCan, channel, NO_HW_CHANNEL, len, len)
}

/// CAN error frame without detail information
pub(crate) fn read_can_error<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    check_payload_header(object_length, data_start - block_start, CanError::SIZE, "CAN_ERROR")?;

    let mut raw = [0u8; CanError::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: CanError = format::read_struct(&raw)?;

    Ok(fill_can_error_record(
        ctx,
        buf,
        [0u8; 16],
        false,
        false,
        flags,
        timestamp,
        header.channel,
    ))
}

/// Extended CAN error frame
pub(crate) fn read_can_error_ext<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    check_payload_header(object_length, data_start - block_start, CanErrorExt::SIZE, "CAN_ERROR_EXT")?;

    let mut raw = [0u8; CanErrorExt::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: CanErrorExt = format::read_struct(&raw)?;

    let mut frame = [0u8; 16];
    let can_core = header.flags & format::CANERROREXT_FLAG_CANCORE != 0;
    let (err_prot, err_ack) = if can_core {
        map_extended_error_code(header.error_code_ext, &mut frame)
    } else {
        (false, false)
    };

    let mut record = fill_can_error_record(
        ctx, buf, frame, err_prot, err_ack, flags, timestamp, header.channel,
    );
    if can_core {
        let tx = header.error_code_ext & format::CANERROREXT_EXTECC_TX != 0;
        record.options.direction = Some(if tx { Direction::Outbound } else { Direction::Inbound });
    }
    Ok(record)
}

/// CAN-FD error frame 64
pub(crate) fn read_can_fd_error64<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    check_payload_header(object_length, data_start - block_start, CanFdError64::SIZE, "CAN_FD_ERROR_64")?;

    let mut raw = [0u8; CanFdError64::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: CanFdError64 = format::read_struct(&raw)?;

    let mut frame = [0u8; 16];
    let can_core = header.flags as u32 & format::CANERROREXT_FLAG_CANCORE != 0;
    let (err_prot, err_ack) = if can_core {
        map_extended_error_code(header.error_code_ext, &mut frame)
    } else {
        (false, false)
    };

    let mut record = fill_can_error_record(
        ctx, buf, frame, err_prot, err_ack, flags, timestamp, header.channel as u16,
    );
    if can_core {
        let tx = header.error_code_ext & format::CANERROREXT_EXTECC_TX != 0;
        record.options.direction = Some(if tx { Direction::Outbound } else { Direction::Inbound });
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fd_lengths_follow_the_dlc_tables() {
        assert_eq!(fd_lengths(15, true, 64), (64, 64));
        assert_eq!(fd_lengths(15, true, 48), (64, 48));
        assert_eq!(fd_lengths(9, true, 64), (12, 12));
        assert_eq!(fd_lengths(15, false, 64), (8, 8));
        assert_eq!(fd_lengths(0, true, 64), (0, 0));
    }

    #[test]
    fn nack_forces_ack_class() {
        // Meaning 5 (NACK) sets the ack locator and class.
        let mut frame = [0u8; 16];
        let (prot, ack) = map_extended_error_code(
            (format::ECC_MEANING_NACK_ERROR << 6) | format::CANERROREXT_EXTECC_NOT_ACK,
            &mut frame,
        );
        assert!(!prot);
        assert!(ack);
        assert_eq!(frame[11], format::CAN_ERR_PROT_LOC_ACK);
    }

    #[test]
    fn missing_not_ack_bit_clears_protocol_class() {
        // A bit error without the NOT_ACK bit degrades to an ack error.
        let mut frame = [0u8; 16];
        let (prot, ack) =
            map_extended_error_code(format::ECC_MEANING_BIT_ERROR << 6, &mut frame);
        assert!(!prot);
        assert!(ack);
        assert_eq!(frame[10], format::CAN_ERR_PROT_BIT);
    }

    #[test]
    fn protocol_errors_keep_their_detail_byte() {
        let mut frame = [0u8; 16];
        let (prot, ack) = map_extended_error_code(
            (format::ECC_MEANING_STUFF_ERROR << 6) | format::CANERROREXT_EXTECC_NOT_ACK,
            &mut frame,
        );
        assert!(prot);
        assert!(!ack);
        assert_eq!(frame[10], format::CAN_ERR_PROT_STUFF);

        let mut frame = [0u8; 16];
        let (prot, _) = map_extended_error_code(
            (0x3f << 6) | format::CANERROREXT_EXTECC_NOT_ACK,
            &mut frame,
        );
        assert!(prot);
        assert_eq!(frame[10], format::CAN_ERR_PROT_UNSPEC);
    }
}
