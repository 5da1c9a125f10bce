//! Helpers that synthesise BLF files in memory for the integration tests.

use std::io::{Cursor, Write};

use blf_log_reader::{BlfReader, InterfaceSink};

pub const FILE_HEADER_LEN: u32 = 144;

/// Timestamp flag values
pub const NSEC: u32 = 2;
pub const TEN_US: u32 = 1;

// Object type discriminants used by the fixtures
pub const CAN_MESSAGE: u32 = 1;
pub const LIN_MESSAGE: u32 = 11;
pub const FLEXRAY_DATA: u32 = 29;
pub const APP_TEXT: u32 = 65;
pub const ETHERNET_FRAME: u32 = 71;
pub const CAN_ERROR_EXT: u32 = 73;
pub const CAN_MESSAGE2: u32 = 86;
pub const WLAN_FRAME: u32 = 97;
pub const CAN_FD_MESSAGE_64: u32 = 101;
pub const ETHERNET_STATUS: u32 = 103;

/// File header with a 1970-01-01 start date, so record timestamps come out
/// as raw epoch offsets.
pub fn file_header() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"LOGG");
    bytes.extend_from_slice(&FILE_HEADER_LEN.to_le_bytes());
    bytes.extend_from_slice(&[2, 1, 0, 0]); // application id + version
    bytes.extend_from_slice(&[0, 1, 7, 4]); // api version
    bytes.extend_from_slice(&0u64.to_le_bytes()); // compressed size
    bytes.extend_from_slice(&0u64.to_le_bytes()); // uncompressed size
    bytes.extend_from_slice(&0u32.to_le_bytes()); // object count
    bytes.extend_from_slice(&0u32.to_le_bytes()); // objects read
    for value in [1970u16, 1, 4, 1, 0, 0, 0, 0] {
        bytes.extend_from_slice(&value.to_le_bytes()); // start date
    }
    for _ in 0..8 {
        bytes.extend_from_slice(&0u16.to_le_bytes()); // end date
    }
    bytes.resize(FILE_HEADER_LEN as usize, 0);
    bytes
}

/// One log object with a variant-1 log object header.
pub fn object(object_type: u32, flags: u32, timestamp: u64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"LOBJ");
    bytes.extend_from_slice(&32u16.to_le_bytes()); // header length
    bytes.extend_from_slice(&1u16.to_le_bytes()); // header type
    bytes.extend_from_slice(&(32 + payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&object_type.to_le_bytes());
    bytes.extend_from_slice(&flags.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes()); // client index
    bytes.extend_from_slice(&0u16.to_le_bytes()); // object version
    bytes.extend_from_slice(&timestamp.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// One log container wrapping `data`, optionally zlib-compressed.
pub fn container(data: &[u8], compress: bool) -> Vec<u8> {
    let payload = if compress { zlib(data) } else { data.to_vec() };
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"LOBJ");
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&((16 + 16 + payload.len()) as u32).to_le_bytes());
    bytes.extend_from_slice(&10u32.to_le_bytes()); // log container
    bytes.extend_from_slice(&(if compress { 2u16 } else { 0u16 }).to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&payload);
    bytes
}

/// Assemble a whole file from container byte strings.
pub fn blf_file(containers: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = file_header();
    for c in containers {
        bytes.extend_from_slice(c);
    }
    bytes
}

/// A file with all objects in one uncompressed container.
pub fn single_container_file(objects: &[Vec<u8>]) -> Vec<u8> {
    blf_file(&[container(&objects.concat(), false)])
}

pub fn open(bytes: Vec<u8>) -> BlfReader<Cursor<Vec<u8>>> {
    BlfReader::open(Cursor::new(bytes.clone()), Cursor::new(bytes)).unwrap()
}

pub fn open_with_sink(
    bytes: Vec<u8>,
    sink: Box<dyn InterfaceSink>,
) -> BlfReader<Cursor<Vec<u8>>> {
    BlfReader::open_with_sink(Cursor::new(bytes.clone()), Cursor::new(bytes), sink).unwrap()
}

// Payload builders, one per object shape the tests exercise.

pub fn can_message_payload(channel: u16, flags: u8, dlc: u8, id: u32, data: &[u8; 8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&channel.to_le_bytes());
    p.push(flags);
    p.push(dlc);
    p.extend_from_slice(&id.to_le_bytes());
    p.extend_from_slice(data);
    p
}

pub fn can_message2_payload(
    channel: u16,
    flags: u8,
    dlc: u8,
    id: u32,
    data: &[u8; 8],
) -> Vec<u8> {
    let mut p = can_message_payload(channel, flags, dlc, id, data);
    p.extend_from_slice(&0u32.to_le_bytes()); // frame length
    p.push(0); // bit count
    p.push(0);
    p.extend_from_slice(&0u16.to_le_bytes());
    p
}

#[allow(clippy::too_many_arguments)]
pub fn ethernet_frame_payload(
    channel: u16,
    direction: u16,
    src: [u8; 6],
    dst: [u8; 6],
    ethtype: u16,
    tpid: u16,
    tci: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&src);
    p.extend_from_slice(&channel.to_le_bytes());
    p.extend_from_slice(&dst);
    p.extend_from_slice(&direction.to_le_bytes());
    p.extend_from_slice(&ethtype.to_le_bytes());
    p.extend_from_slice(&tpid.to_le_bytes());
    p.extend_from_slice(&tci.to_le_bytes());
    p.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    p.extend_from_slice(&[0u8; 8]);
    p.extend_from_slice(payload);
    p
}

pub fn wlan_frame_payload(channel: u16, direction: u8, frame: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&channel.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes()); // flags
    p.push(direction);
    p.push(0); // radio channel
    p.extend_from_slice(&0u16.to_le_bytes()); // signal strength
    p.extend_from_slice(&0u16.to_le_bytes()); // signal quality
    p.extend_from_slice(&(frame.len() as u16).to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes());
    p.extend_from_slice(frame);
    p
}

#[allow(clippy::too_many_arguments)]
pub fn can_fd_message64_payload(
    channel: u8,
    dlc: u8,
    valid_data_bytes: u8,
    id: u32,
    flags: u32,
    direction: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut p = vec![channel, dlc, valid_data_bytes, 0];
    p.extend_from_slice(&id.to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes()); // frame length
    p.extend_from_slice(&flags.to_le_bytes());
    p.extend_from_slice(&[0u8; 16]); // bitrate configs + offsets
    p.extend_from_slice(&0u16.to_le_bytes()); // bit count
    p.push(direction);
    p.push(0); // ext data offset
    p.extend_from_slice(&0u32.to_le_bytes()); // crc
    p.extend_from_slice(data);
    p
}

pub fn can_error_ext_payload(channel: u16, flags: u32, error_code_ext: u16) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&channel.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes()); // length
    p.extend_from_slice(&flags.to_le_bytes());
    p.extend_from_slice(&[0u8; 4]); // ecc, position, dlc, reserved
    p.extend_from_slice(&0u32.to_le_bytes()); // frame length
    p.extend_from_slice(&0u32.to_le_bytes()); // id
    p.extend_from_slice(&error_code_ext.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes());
    p
}

#[allow(clippy::too_many_arguments)]
pub fn flexray_data_payload(
    channel: u16,
    mux: u8,
    len: u8,
    message_id: u16,
    crc: u16,
    direction: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&channel.to_le_bytes());
    p.push(mux);
    p.push(len);
    p.extend_from_slice(&message_id.to_le_bytes());
    p.extend_from_slice(&crc.to_le_bytes());
    p.push(direction);
    p.push(0);
    p.extend_from_slice(&0u16.to_le_bytes());
    p.extend_from_slice(data);
    p
}

pub fn lin_message_payload(
    channel: u16,
    id: u8,
    dlc: u8,
    data: &[u8; 8],
    crc: u16,
    direction: u8,
) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&channel.to_le_bytes());
    p.push(id);
    p.push(dlc);
    p.extend_from_slice(data);
    p.extend_from_slice(&[0u8; 4]); // fsm id/state, header/full time
    p.extend_from_slice(&crc.to_le_bytes());
    p.push(direction);
    p.push(0);
    p
}

pub fn app_text_payload(source: u32, reserved1: u32, text: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&source.to_le_bytes());
    p.extend_from_slice(&reserved1.to_le_bytes());
    p.extend_from_slice(&(text.len() as u32).to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes());
    p.extend_from_slice(text);
    p
}

#[allow(clippy::too_many_arguments)]
pub fn ethernet_status_payload(
    channel: u16,
    flags: u16,
    link_status: u8,
    ethernet_phy: u8,
    duplex: u8,
    mdi: u8,
    connector: u8,
    clock_mode: u8,
    pairs: u8,
    hardware_channel: u8,
    bitrate: u32,
) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&channel.to_le_bytes());
    p.extend_from_slice(&flags.to_le_bytes());
    p.extend_from_slice(&[
        link_status,
        ethernet_phy,
        duplex,
        mdi,
        connector,
        clock_mode,
        pairs,
        hardware_channel,
    ]);
    p.extend_from_slice(&bitrate.to_le_bytes());
    p
}
