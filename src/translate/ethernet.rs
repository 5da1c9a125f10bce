//! Ethernet, WLAN and Ethernet-status translators.

use std::io::{Read, Seek};

use crate::epdu;
use crate::format::{self, EthernetFrameHeader, EthernetFrameHeaderEx, EthernetStatus, WlanFrameHeader};
use crate::interface::NO_HW_CHANNEL;
use crate::reader::ReadCtx;
use crate::translate::{append_from_stream, check_payload_header, direction_from};
use crate::types::{BlfError, Encap, Record, Result};

/// Ethernet frame.
///
/// The format splits and reorders the Ethernet header and VLAN tag fields;
/// reassemble the original wire order: destination, source, optional
/// 802.1Q tag, ethertype, payload.
pub(crate) fn read_frame<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, EthernetFrameHeader::SIZE, "ETHERNET_FRAME")?;

    let mut raw = [0u8; EthernetFrameHeader::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: EthernetFrameHeader = format::read_struct(&raw)?;

    buf.extend_from_slice(&header.dst_addr);
    buf.extend_from_slice(&header.src_addr);
    if header.tpid != 0 && header.tci != 0 {
        buf.extend_from_slice(&header.tpid.to_be_bytes());
        buf.extend_from_slice(&header.tci.to_be_bytes());
    }
    buf.extend_from_slice(&header.ethtype.to_be_bytes());
    let eth_header_len = buf.len() as u32;

    let available = object_length - header_span - EthernetFrameHeader::SIZE as u64;
    let mut payload_length = header.payload_length as u64;
    if payload_length > available {
        log::debug!("shortening ethernet frame payload because object is too short");
        payload_length = available;
    }

    append_from_stream(
        &mut ctx.vr,
        buf,
        data_start + EthernetFrameHeader::SIZE as u64,
        payload_length as usize,
    )?;

    let caplen = eth_header_len + payload_length as u32;
    let len = eth_header_len + header.payload_length as u32;
    let mut record = ctx.init_rec(
        flags,
        timestamp,
        Encap::Ethernet,
        header.channel,
        NO_HW_CHANNEL,
        caplen,
        len,
    );
    record.options.direction = Some(direction_from(header.direction));
    Ok(record)
}

/// Extended Ethernet frame: the frame bytes are stored intact.
pub(crate) fn read_frame_ex<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, EthernetFrameHeaderEx::SIZE, "ETHERNET_FRAME_EX")?;

    let mut raw = [0u8; EthernetFrameHeaderEx::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: EthernetFrameHeaderEx = format::read_struct(&raw)?;

    if object_length - header_span - (EthernetFrameHeaderEx::SIZE as u64) < header.frame_length as u64 {
        log::debug!("ethernet frame ex is too short for its declared frame length");
        return Err(BlfError::BadFile("ETHERNET_FRAME_EX: frame too short".into()));
    }

    append_from_stream(
        &mut ctx.vr,
        buf,
        data_start + EthernetFrameHeaderEx::SIZE as u64,
        header.frame_length as usize,
    )?;

    let len = header.frame_length as u32;
    let mut record = ctx.init_rec(
        flags,
        timestamp,
        Encap::Ethernet,
        header.channel,
        header.hw_channel,
        len,
        len,
    );
    record.options.packet_queue = Some(header.hw_channel as u32);
    record.options.direction = Some(direction_from(header.direction));
    Ok(record)
}

/// WLAN frame: verbatim copy of the stored frame bytes.
pub(crate) fn read_wlan_frame<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, WlanFrameHeader::SIZE, "WLAN_FRAME")?;

    let mut raw = [0u8; WlanFrameHeader::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: WlanFrameHeader = format::read_struct(&raw)?;

    if object_length - header_span - (WlanFrameHeader::SIZE as u64) < header.frame_length as u64 {
        log::debug!("wlan frame is too short for its declared frame length");
        return Err(BlfError::BadFile("WLAN_FRAME: frame too short".into()));
    }

    append_from_stream(
        &mut ctx.vr,
        buf,
        data_start + WlanFrameHeader::SIZE as u64,
        header.frame_length as usize,
    )?;

    let len = header.frame_length as u32;
    let mut record = ctx.init_rec(
        flags,
        timestamp,
        Encap::Ieee80211,
        header.channel,
        NO_HW_CHANNEL,
        len,
        len,
    );
    record.options.direction = Some(direction_from(header.direction as u16));
    Ok(record)
}

/// Ethernet status: emitted as a synthetic upper-PDU record carrying the
/// status fields in big-endian order, on its own interface named after the
/// Ethernet channel it describes.
pub(crate) fn read_ethernet_status<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
) -> Result<Record> {
    let header_span = data_start - block_start;
    check_payload_header(object_length, header_span, EthernetStatus::SIZE, "ETHERNET_STATUS")?;

    let mut raw = [0u8; EthernetStatus::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: EthernetStatus = format::read_struct(&raw)?;

    epdu::append_string(buf, epdu::TAG_DISSECTOR_NAME, "blf-ethernetstatus-obj");
    epdu::append_end(buf);

    buf.extend_from_slice(&header.channel.to_be_bytes());
    buf.extend_from_slice(&header.flags.to_be_bytes());
    buf.extend_from_slice(&[
        header.link_status,
        header.ethernet_phy,
        header.duplex,
        header.mdi,
        header.connector,
        header.clock_mode,
        header.pairs,
        header.hardware_channel,
    ]);
    buf.extend_from_slice(&header.bitrate.to_be_bytes());

    // The matching Ethernet interface cannot carry this record (one link
    // type per interface), so a sibling interface is created up front with
    // a STATUS- prefixed name; the record lookup below then reuses it.
    let hw_channel = header.hardware_channel as u16;
    let name = format!("STATUS-ETH-{}-{}", header.channel, header.hardware_channel);
    ctx.ifaces
        .lookup(Encap::UpperPdu, header.channel, hw_channel, Some(&name));

    let caplen = buf.len() as u32;
    let mut record = ctx.init_rec(
        flags,
        timestamp,
        Encap::UpperPdu,
        header.channel,
        hw_channel,
        caplen,
        caplen,
    );
    if header.flags & format::ETH_STATUS_FLAG_HARDWARECHANNEL != 0 {
        record.options.packet_queue = Some(header.hardware_channel as u32);
    }
    Ok(record)
}
