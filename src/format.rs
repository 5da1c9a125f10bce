//! On-disk layout of the BLF file format.
//!
//! Every structure here mirrors a fixed little-endian layout in the file.
//! The `binrw` derives convert each multi-byte field to host order at the
//! moment the bytes are parsed; everything above this module operates in
//! host order only. The `SIZE` constants give the exact on-disk byte count
//! of each structure (which can differ from the in-memory size).

use binrw::BinRead;
use std::io::Cursor;

use crate::types::{BlfError, Result};

/// File magic at offset 0
pub const FILE_MAGIC: [u8; 4] = *b"LOGG";
/// Magic marking the start of every object header
pub const OBJECT_MAGIC: [u8; 4] = *b"LOBJ";

/// The only block header type legal at the top level
pub const HEADER_TYPE_DEFAULT: u16 = 1;
pub const HEADER_TYPE_2: u16 = 2;
pub const HEADER_TYPE_3: u16 = 3;

pub const COMPRESSION_NONE: u16 = 0;
pub const COMPRESSION_ZLIB: u16 = 2;

/// Timestamp flag: 10-microsecond units
pub const TIMESTAMP_RESOLUTION_10US: u32 = 1;
/// Timestamp flag: nanosecond units
pub const TIMESTAMP_RESOLUTION_1NS: u32 = 2;

// Object type discriminants (the subset this reader translates)
pub const OBJTYPE_CAN_MESSAGE: u32 = 1;
pub const OBJTYPE_CAN_ERROR: u32 = 2;
pub const OBJTYPE_LOG_CONTAINER: u32 = 10;
pub const OBJTYPE_LIN_MESSAGE: u32 = 11;
pub const OBJTYPE_FLEXRAY_DATA: u32 = 29;
pub const OBJTYPE_FLEXRAY_MESSAGE: u32 = 41;
pub const OBJTYPE_FLEXRAY_RCVMESSAGE: u32 = 50;
pub const OBJTYPE_APP_TEXT: u32 = 65;
pub const OBJTYPE_FLEXRAY_RCVMESSAGE_EX: u32 = 66;
pub const OBJTYPE_ETHERNET_FRAME: u32 = 71;
pub const OBJTYPE_CAN_ERROR_EXT: u32 = 73;
pub const OBJTYPE_CAN_MESSAGE2: u32 = 86;
pub const OBJTYPE_WLAN_FRAME: u32 = 97;
pub const OBJTYPE_CAN_FD_MESSAGE: u32 = 100;
pub const OBJTYPE_CAN_FD_MESSAGE_64: u32 = 101;
pub const OBJTYPE_ETHERNET_STATUS: u32 = 103;
pub const OBJTYPE_CAN_FD_ERROR_64: u32 = 104;
pub const OBJTYPE_ETHERNET_FRAME_EX: u32 = 120;

// Frame direction values shared by most bus headers
pub const DIR_RX: u16 = 0;
pub const DIR_TX: u16 = 1;
pub const DIR_TX_RQ: u16 = 2;

// CAN message flag bits
pub const CANMESSAGE_FLAG_TX: u8 = 0x01;
pub const CANMESSAGE_FLAG_RTR: u8 = 0x80;

// CAN-FD flag bits
pub const CANFDMESSAGE_FLAG_EDL: u8 = 0x01;
pub const CANFDMESSAGE64_FLAG_REMOTE_FRAME: u32 = 0x0010;
pub const CANFDMESSAGE64_FLAG_EDL: u32 = 0x1000;

// CAN error frame (extended) flag bits
pub const CANERROREXT_FLAG_CANCORE: u32 = 0x02;
pub const CANERROREXT_EXTECC_TX: u16 = 0x1000;
pub const CANERROREXT_EXTECC_NOT_ACK: u16 = 0x2000;

// Meanings of the CAN-core extended error code, `(ecc >> 6) & 0x3f`
pub const ECC_MEANING_BIT_ERROR: u16 = 0x1;
pub const ECC_MEANING_FORM_ERROR: u16 = 0x2;
pub const ECC_MEANING_STUFF_ERROR: u16 = 0x3;
pub const ECC_MEANING_CRC_ERROR: u16 = 0x4;
pub const ECC_MEANING_NACK_ERROR: u16 = 0x5;
pub const ECC_MEANING_OVERLOAD: u16 = 0x6;

// SocketCAN constants used when synthesising the canonical frame layout
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;
pub const CAN_ERR_PROT: u32 = 0x0000_0004;
pub const CAN_ERR_ACK: u32 = 0x0000_0020;
pub const CAN_ERR_DLC: u8 = 8;
pub const CAN_ERR_PROT_UNSPEC: u8 = 0x00;
pub const CAN_ERR_PROT_BIT: u8 = 0x01;
pub const CAN_ERR_PROT_FORM: u8 = 0x02;
pub const CAN_ERR_PROT_STUFF: u8 = 0x04;
pub const CAN_ERR_PROT_OVERLOAD: u8 = 0x20;
pub const CAN_ERR_PROT_LOC_CRC_SEQ: u8 = 0x08;
pub const CAN_ERR_PROT_LOC_ACK: u8 = 0x19;

// FlexRay measurement-header byte 0
pub const FLEXRAY_FRAME: u8 = 0x01;
pub const FLEXRAY_CHANNEL_B: u8 = 0x80;

// FlexRay frame-header state bits in the synthesised byte 2
pub const FLEXRAY_HDR_STFI: u8 = 0x08;
pub const FLEXRAY_HDR_SFI: u8 = 0x10;
pub const FLEXRAY_HDR_NFI: u8 = 0x20;
pub const FLEXRAY_HDR_PPI: u8 = 0x40;

// FlexRay message frameState bits
pub const FLEXRAYMESSAGE_STATE_PPI: u16 = 0x01;
pub const FLEXRAYMESSAGE_STATE_SFI: u16 = 0x02;
pub const FLEXRAYMESSAGE_STATE_NFI: u16 = 0x08;
pub const FLEXRAYMESSAGE_STATE_STFI: u16 = 0x10;

// FlexRay receive-message data flags
pub const FLEXRAYRCVMSG_DATA_FLAG_NULL_FRAME: u32 = 0x01;
pub const FLEXRAYRCVMSG_DATA_FLAG_SYNC: u32 = 0x04;
pub const FLEXRAYRCVMSG_DATA_FLAG_STARTUP: u32 = 0x08;
pub const FLEXRAYRCVMSG_DATA_FLAG_PAYLOAD_PREAM: u32 = 0x10;
pub const FLEXRAYRCVMSG_CHANNELMASK_A: u16 = 1;

// Ethernet status flag: hardware-channel field is valid
pub const ETH_STATUS_FLAG_HARDWARECHANNEL: u16 = 0x0100;

// AppText sources
pub const APPTEXT_CHANNEL: u32 = 1;
pub const APPTEXT_METADATA: u32 = 2;
pub const APPTEXT_COMMENT: u32 = 3;
pub const APPTEXT_ATTACHMENT: u32 = 4;
pub const APPTEXT_TRACELINE: u32 = 5;

// Bus-type codes in AppText channel metadata
pub const BUSTYPE_CAN: u8 = 1;
pub const BUSTYPE_LIN: u8 = 5;
pub const BUSTYPE_FLEXRAY: u8 = 7;
pub const BUSTYPE_ETHERNET: u8 = 10;
pub const BUSTYPE_WLAN: u8 = 13;

/// Classical CAN DLC to payload byte count (DLC > 8 still means 8 bytes)
pub const CAN_DLC_TO_LENGTH: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 8, 8, 8, 8, 8, 8, 8];
/// CAN-FD DLC to payload byte count
pub const CANFD_DLC_TO_LENGTH: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Parse a fixed-layout header out of a byte buffer.
pub(crate) fn read_struct<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_le(&mut Cursor::new(bytes))
        .map_err(|e| BlfError::Internal(format!("header parse failed: {e}")))
}

/// Calendar date as stored in the file header (SYSTEMTIME layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct BlfDate {
    pub year: u16,
    pub month: u16,
    pub day_of_week: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub millisecond: u16,
}

/// Fixed-layout part of the file header at offset 0.
///
/// `header_length` gives the full header size; anything between the fixed
/// part and `header_length` is skipped.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub header_length: u32,
    pub application: [u8; 4],
    pub api_version: [u8; 4],
    pub len_compressed: u64,
    pub len_uncompressed: u64,
    pub object_count: u32,
    pub objects_read: u32,
    pub start_date: BlfDate,
    pub end_date: BlfDate,
    pub reserved: u32,
}

impl FileHeader {
    pub const SIZE: usize = 76;
}

/// 16-byte header common to every object
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct BlockHeader {
    pub magic: [u8; 4],
    pub header_length: u16,
    pub header_type: u16,
    pub object_length: u32,
    pub object_type: u32,
}

impl BlockHeader {
    pub const SIZE: usize = 16;
}

/// Header of a log container object, immediately after its block header
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct LogContainerHeader {
    pub compression_method: u16,
    pub reserved1: u16,
    pub reserved2: u32,
    pub uncompressed_size: u32,
    pub reserved3: u32,
}

impl LogContainerHeader {
    pub const SIZE: usize = 16;
}

/// Log object header variant 1 (the default)
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct ObjectHeaderV1 {
    pub flags: u32,
    pub client_index: u16,
    pub object_version: u16,
    pub object_timestamp: u64,
}

impl ObjectHeaderV1 {
    pub const SIZE: usize = 16;
}

/// Log object header variant 2
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct ObjectHeaderV2 {
    pub flags: u32,
    pub timestamp_status: u8,
    pub reserved1: u8,
    pub object_version: u16,
    pub object_timestamp: u64,
    pub original_timestamp: u64,
}

impl ObjectHeaderV2 {
    pub const SIZE: usize = 24;
}

/// Log object header variant 3
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct ObjectHeaderV3 {
    pub flags: u32,
    pub static_size: u16,
    pub object_version: u16,
    pub object_timestamp: u64,
}

impl ObjectHeaderV3 {
    pub const SIZE: usize = 16;
}

/// Ethernet frame payload header.
///
/// The format splits the Ethernet header into these fields; the translator
/// reassembles the original wire order.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct EthernetFrameHeader {
    pub src_addr: [u8; 6],
    pub channel: u16,
    pub dst_addr: [u8; 6],
    pub direction: u16,
    pub ethtype: u16,
    pub tpid: u16,
    pub tci: u16,
    pub payload_length: u16,
    pub reserved: [u8; 8],
}

impl EthernetFrameHeader {
    pub const SIZE: usize = 32;
}

/// Extended Ethernet frame payload header (frame bytes kept intact)
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct EthernetFrameHeaderEx {
    pub struct_length: u16,
    pub flags: u16,
    pub channel: u16,
    pub hw_channel: u16,
    pub frame_duration: u64,
    pub frame_checksum: u32,
    pub direction: u16,
    pub frame_length: u16,
    pub frame_handle: u32,
    pub error: u32,
}

impl EthernetFrameHeaderEx {
    pub const SIZE: usize = 32;
}

/// WLAN frame payload header
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct WlanFrameHeader {
    pub channel: u16,
    pub flags: u16,
    pub direction: u8,
    pub radio_channel: u8,
    pub signal_strength: u16,
    pub signal_quality: u16,
    pub frame_length: u16,
    pub reserved: u32,
}

impl WlanFrameHeader {
    pub const SIZE: usize = 16;
}

/// Classical CAN message header; 8 data bytes follow on disk
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct CanMessage {
    pub channel: u16,
    pub flags: u8,
    pub dlc: u8,
    pub id: u32,
}

impl CanMessage {
    pub const SIZE: usize = 8;
}

/// Trailer after the data bytes of a CAN message 2 object
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct CanMessage2Trailer {
    pub frame_length_ns: u32,
    pub bit_count: u8,
    pub reserved1: u8,
    pub reserved2: u16,
}

impl CanMessage2Trailer {
    pub const SIZE: usize = 8;
}

/// CAN-FD message header; payload bytes follow
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct CanFdMessage {
    pub channel: u16,
    pub flags: u8,
    pub dlc: u8,
    pub id: u32,
    pub frame_length_ns: u32,
    pub arbitration_bit_count: u8,
    pub canfd_flags: u8,
    pub valid_data_bytes: u8,
    pub reserved1: u8,
    pub reserved2: u32,
}

impl CanFdMessage {
    pub const SIZE: usize = 20;
}

/// CAN-FD message 64 header; payload bytes follow
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct CanFdMessage64 {
    pub channel: u8,
    pub dlc: u8,
    pub valid_data_bytes: u8,
    pub tx_count: u8,
    pub id: u32,
    pub frame_length_ns: u32,
    pub flags: u32,
    pub btr_cfg_arb: u32,
    pub btr_cfg_data: u32,
    pub time_offset_brs_ns: u32,
    pub time_offset_crc_del_ns: u32,
    pub bit_count: u16,
    pub direction: u8,
    pub ext_data_offset: u8,
    pub crc: u32,
}

impl CanFdMessage64 {
    pub const SIZE: usize = 40;
}

/// CAN error frame header
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct CanError {
    pub channel: u16,
    pub length: u16,
}

impl CanError {
    pub const SIZE: usize = 4;
}

/// Extended CAN error frame header
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct CanErrorExt {
    pub channel: u16,
    pub length: u16,
    pub flags: u32,
    pub ecc: u8,
    pub position: u8,
    pub dlc: u8,
    pub reserved1: u8,
    pub frame_length_ns: u32,
    pub id: u32,
    pub error_code_ext: u16,
    pub reserved2: u16,
}

impl CanErrorExt {
    pub const SIZE: usize = 24;
}

/// CAN-FD error frame 64 header
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct CanFdError64 {
    pub channel: u8,
    pub dlc: u8,
    pub valid_data_bytes: u8,
    pub ecc: u8,
    pub flags: u16,
    pub error_code_ext: u16,
    pub ext_flags: u16,
    pub ext_data_offset: u8,
    pub reserved1: u8,
    pub id: u32,
    pub frame_length_ns: u32,
    pub btr_cfg_arb: u32,
    pub btr_cfg_data: u32,
    pub time_offset_brs_ns: u32,
    pub time_offset_crc_del_ns: u32,
    pub crc: u32,
    pub error_position: u16,
    pub reserved2: u16,
}

impl CanFdError64 {
    pub const SIZE: usize = 44;
}

/// FlexRay data frame header; payload bytes follow
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct FlexRayData {
    pub channel: u16,
    pub mux: u8,
    pub len: u8,
    pub message_id: u16,
    pub crc: u16,
    pub direction: u8,
    pub reserved1: u8,
    pub reserved2: u16,
}

impl FlexRayData {
    pub const SIZE: usize = 12;
}

/// FlexRay V6 message header; payload bytes follow
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct FlexRayMessage {
    pub channel: u16,
    pub direction: u8,
    pub low_time: u8,
    pub fpga_tick: u32,
    pub fpga_tick_overflow: u32,
    pub client_index: u32,
    pub cluster_time: u32,
    pub frame_id: u16,
    pub header_crc: u16,
    pub frame_state: u16,
    pub length: u8,
    pub cycle: u8,
    pub header_bit_mask: u8,
    pub reserved1: u8,
    pub reserved2: u16,
}

impl FlexRayMessage {
    pub const SIZE: usize = 32;
}

/// FlexRay receive-message header. The extended variant carries 40 more
/// bytes between this header and the payload.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct FlexRayRcvMessage {
    pub channel: u16,
    pub version: u16,
    pub channel_mask: u16,
    pub direction: u16,
    pub client_index: u32,
    pub cluster_no: u32,
    pub frame_id: u16,
    pub header_crc1: u16,
    pub header_crc2: u16,
    pub payload_length: u16,
    pub payload_length_valid: u16,
    pub cycle: u16,
    pub tag: u32,
    pub data: u32,
    pub frame_flags: u32,
    pub app_parameter: u32,
}

impl FlexRayRcvMessage {
    pub const SIZE: usize = 44;
    /// Extra header bytes in the extended (`_EX`) variant
    pub const EXT_EXTRA: usize = 40;
}

/// LIN message, data bytes included
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct LinMessage {
    pub channel: u16,
    pub id: u8,
    pub dlc: u8,
    pub data: [u8; 8],
    pub fsm_id: u8,
    pub fsm_state: u8,
    pub header_time: u8,
    pub full_time: u8,
    pub crc: u16,
    pub direction: u8,
    pub reserved: u8,
}

impl LinMessage {
    pub const SIZE: usize = 20;
}

/// Application text header; the text bytes follow
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct AppTextHeader {
    pub source: u32,
    /// Bits [8..16]: channel, bits [16..24]: bus type (channel metadata);
    /// bits [0..24]: remaining text length (metadata continuation)
    pub reserved1: u32,
    pub text_length: u32,
    pub reserved2: u32,
}

impl AppTextHeader {
    pub const SIZE: usize = 16;
}

/// Ethernet link status fields
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct EthernetStatus {
    pub channel: u16,
    pub flags: u16,
    pub link_status: u8,
    pub ethernet_phy: u8,
    pub duplex: u8,
    pub mdi: u8,
    pub connector: u8,
    pub clock_mode: u8,
    pub pairs: u8,
    pub hardware_channel: u8,
    pub bitrate: u32,
}

impl EthernetStatus {
    pub const SIZE: usize = 16;
}
