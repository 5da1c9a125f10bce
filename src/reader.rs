//! Top-level BLF reader: open, sequential read, random seek-read, close.
//!
//! `open` validates the file header, converts the measurement start date
//! into the nanosecond epoch base and scans the container layout once.
//! After that, all object framing happens in virtual (decompressed)
//! coordinates: the framer locates the next `LOBJ` header, extracts flags
//! and timestamp from the log object header variant, and dispatches to the
//! translator for the object type.

use std::io::{Read, Seek, SeekFrom};

use chrono::{NaiveDate, NaiveDateTime};

use crate::container::{self, read_fully, LogContainer, VirtualReader};
use crate::format::{
    self, BlfDate, BlockHeader, FileHeader, ObjectHeaderV1, ObjectHeaderV2, ObjectHeaderV3,
};
use crate::interface::InterfaceRegistry;
use crate::translate::{self, text::AppTextOutcome};
use crate::types::{
    BlfError, Encap, InterfaceDescription, InterfaceSink, Record, RecordOptions, Result,
    TimestampPrecision,
};

/// File-level statistics from the header, kept available for the lifetime
/// of the reader.
#[derive(Debug, Clone)]
pub struct FileStats {
    pub application_id: u8,
    pub application_version: (u8, u8, u8),
    pub api_version: u32,
    pub len_compressed: u64,
    pub len_uncompressed: u64,
    pub object_count: u32,
    pub objects_read: u32,
    pub start_date: BlfDate,
    pub end_date: BlfDate,
}

impl FileStats {
    fn from_header(header: &FileHeader) -> Self {
        Self {
            application_id: header.application[0],
            application_version: (
                header.application[1],
                header.application[2],
                header.application[3],
            ),
            api_version: u32::from_le_bytes(header.api_version),
            len_compressed: header.len_compressed,
            len_uncompressed: header.len_uncompressed,
            object_count: header.object_count,
            objects_read: header.objects_read,
            start_date: header.start_date,
            end_date: header.end_date,
        }
    }

    /// Whether any log container in the file is compressed.
    pub fn is_compressed(&self) -> bool {
        self.len_compressed != self.len_uncompressed
    }

    /// Measurement start as a calendar timestamp, if the header carries a
    /// valid date.
    pub fn measurement_start(&self) -> Option<NaiveDateTime> {
        naive_date_time(&self.start_date)
    }
}

fn naive_date_time(date: &BlfDate) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(date.year as i32, date.month as u32, date.day as u32).and_then(|d| {
        d.and_hms_milli_opt(
            date.hour as u32,
            date.minute as u32,
            date.second as u32,
            date.millisecond as u32,
        )
    })
}

/// Nanosecond UTC epoch base for all record timestamps in the file.
fn start_offset_ns(date: &BlfDate) -> u64 {
    let clamped = BlfDate {
        year: date.year.max(1970),
        ..*date
    };
    match naive_date_time(&clamped) {
        Some(dt) => {
            let utc = dt.and_utc();
            utc.timestamp().max(0) as u64 * 1_000_000_000 + utc.timestamp_subsec_nanos() as u64
        }
        None => {
            log::debug!("invalid measurement start date in file header");
            0
        }
    }
}

/// Reader state shared by the sequential and the random read path.
///
/// The two paths use different file handles but the same container cache;
/// a container's decompressed bytes are immutable once populated, so either
/// path can serve from them.
pub struct BlfReader<R> {
    sequential: R,
    random: R,
    containers: Vec<LogContainer>,
    ifaces: InterfaceRegistry,
    start_offset_ns: u64,
    next_read_pos: u64,
    stats: FileStats,
}

/// Borrowed view handed to the framer and the translators: one file
/// handle, the shared container cache and the interface registry.
pub(crate) struct ReadCtx<'a, R> {
    pub vr: VirtualReader<'a, R>,
    pub ifaces: &'a mut InterfaceRegistry,
    pub start_offset_ns: u64,
}

impl<R: Read + Seek> ReadCtx<'_, R> {
    /// Build the record metadata common to every translator.
    #[allow(clippy::too_many_arguments)]
    pub fn init_rec(
        &mut self,
        flags: u32,
        object_timestamp: u64,
        encap: Encap,
        channel: u16,
        hw_channel: u16,
        caplen: u32,
        len: u32,
    ) -> Record {
        let (precision, ts_ns) = match flags {
            format::TIMESTAMP_RESOLUTION_10US => (
                TimestampPrecision::TenMicroseconds,
                object_timestamp
                    .saturating_mul(10_000)
                    .saturating_add(self.start_offset_ns),
            ),
            format::TIMESTAMP_RESOLUTION_1NS => (
                TimestampPrecision::Nanoseconds,
                object_timestamp.saturating_add(self.start_offset_ns),
            ),
            _ => {
                log::debug!("unknown timestamp flags {flags:#x}");
                (TimestampPrecision::Nanoseconds, 0)
            }
        };

        let interface_id = self.ifaces.lookup(encap, channel, hw_channel, None);

        Record {
            ts_secs: ts_ns / 1_000_000_000,
            ts_nsecs: (ts_ns % 1_000_000_000) as u32,
            ts_precision: precision,
            caplen,
            len,
            encap,
            interface_id,
            ts_rel_cap_ns: ts_ns as i64 - self.start_offset_ns as i64,
            options: RecordOptions::default(),
        }
    }
}

struct Framed {
    record: Record,
    data_offset: u64,
    next_pos: u64,
}

fn ensure_object_header_fits(available: u64, needed: usize) -> Result<()> {
    if available < needed as u64 {
        log::debug!("not enough bytes for log object header");
        return Err(BlfError::BadFile(
            "not enough bytes for log object header".into(),
        ));
    }
    Ok(())
}

/// Extract flags and raw timestamp from the log object header variant.
///
/// Returns `None` when the header runs past the end of the virtual stream,
/// which callers treat as a clean end.
fn read_log_object_header<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    header: &BlockHeader,
    block_start: u64,
) -> Result<Option<(u32, u64)>> {
    let header2_start = block_start + BlockHeader::SIZE as u64;
    let available = (header.header_length as u64).saturating_sub(BlockHeader::SIZE as u64);

    match header.header_type {
        format::HEADER_TYPE_DEFAULT => {
            ensure_object_header_fits(available, ObjectHeaderV1::SIZE)?;
            let mut raw = [0u8; ObjectHeaderV1::SIZE];
            if !ctx.vr.read_or_eof(header2_start, &mut raw)? {
                return Ok(None);
            }
            let h: ObjectHeaderV1 = format::read_struct(&raw)?;
            Ok(Some((h.flags, h.object_timestamp)))
        }
        format::HEADER_TYPE_2 => {
            ensure_object_header_fits(available, ObjectHeaderV2::SIZE)?;
            let mut raw = [0u8; ObjectHeaderV2::SIZE];
            if !ctx.vr.read_or_eof(header2_start, &mut raw)? {
                return Ok(None);
            }
            let h: ObjectHeaderV2 = format::read_struct(&raw)?;
            Ok(Some((h.flags, h.object_timestamp)))
        }
        format::HEADER_TYPE_3 => {
            ensure_object_header_fits(available, ObjectHeaderV3::SIZE)?;
            let mut raw = [0u8; ObjectHeaderV3::SIZE];
            if !ctx.vr.read_or_eof(header2_start, &mut raw)? {
                return Ok(None);
            }
            let h: ObjectHeaderV3 = format::read_struct(&raw)?;
            Ok(Some((h.flags, h.object_timestamp)))
        }
        other => Err(BlfError::Unsupported(format!(
            "unknown object header type {other}"
        ))),
    }
}

/// Frame one record starting at `start_pos`.
///
/// Loops internally over objects that do not produce records (channel
/// metadata, unknown types, metadata continuations) and returns `None` at
/// the clean end of the stream.
fn read_object<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    mut start_pos: u64,
    buf: &mut Vec<u8>,
) -> Result<Option<Framed>> {
    // Bookkeeping for a metadata sequence in progress: how many bytes of
    // the output buffer belong to it and where its first object started.
    let mut metadata_cont: usize = 0;
    let mut last_metadata_start: u64 = 0;

    loop {
        buf.truncate(metadata_cont);

        // Locate the next object, tolerating inter-object padding
        let mut raw = [0u8; BlockHeader::SIZE];
        let header: BlockHeader = loop {
            if !ctx.vr.read_or_eof(start_pos, &mut raw)? {
                return Ok(None);
            }
            if raw[0..4] == format::OBJECT_MAGIC {
                break format::read_struct(&raw)?;
            }
            log::debug!("object magic is not LOBJ (pos {:#x})", start_pos);
            start_pos += 1;
        };

        let Some((flags, timestamp)) = read_log_object_header(ctx, &header, start_pos)? else {
            return Ok(None);
        };

        let data_offset = start_pos;
        let next_pos =
            start_pos + container::object_advance(header.header_length, header.object_length);
        let block_start = start_pos;
        let data_start = start_pos + header.header_length as u64;
        let object_length = header.object_length as u64;

        if metadata_cont != 0 && header.object_type != format::OBJTYPE_APP_TEXT {
            // A foreign object interrupts the metadata sequence; drop the
            // partial record.
            metadata_cont = 0;
            last_metadata_start = 0;
            buf.clear();
        }

        let record = match header.object_type {
            format::OBJTYPE_LOG_CONTAINER => {
                return Err(BlfError::Unsupported(
                    "log container inside log container".into(),
                ));
            }
            format::OBJTYPE_ETHERNET_FRAME => Some(translate::ethernet::read_frame(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_ETHERNET_FRAME_EX => Some(translate::ethernet::read_frame_ex(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_WLAN_FRAME => Some(translate::ethernet::read_wlan_frame(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_ETHERNET_STATUS => Some(translate::ethernet::read_ethernet_status(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_CAN_MESSAGE => Some(translate::can::read_can_message(
                ctx, buf, block_start, data_start, object_length, flags, timestamp, false,
            )?),
            format::OBJTYPE_CAN_MESSAGE2 => Some(translate::can::read_can_message(
                ctx, buf, block_start, data_start, object_length, flags, timestamp, true,
            )?),
            format::OBJTYPE_CAN_ERROR => Some(translate::can::read_can_error(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_CAN_ERROR_EXT => Some(translate::can::read_can_error_ext(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_CAN_FD_MESSAGE => Some(translate::can::read_can_fd_message(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_CAN_FD_MESSAGE_64 => Some(translate::can::read_can_fd_message64(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_CAN_FD_ERROR_64 => Some(translate::can::read_can_fd_error64(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_FLEXRAY_DATA => Some(translate::flexray::read_data(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_FLEXRAY_MESSAGE => Some(translate::flexray::read_message(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_FLEXRAY_RCVMESSAGE => Some(translate::flexray::read_rcv_message(
                ctx, buf, block_start, data_start, object_length, flags, timestamp, false,
            )?),
            format::OBJTYPE_FLEXRAY_RCVMESSAGE_EX => Some(translate::flexray::read_rcv_message(
                ctx, buf, block_start, data_start, object_length, flags, timestamp, true,
            )?),
            format::OBJTYPE_LIN_MESSAGE => Some(translate::lin::read_message(
                ctx, buf, block_start, data_start, object_length, flags, timestamp,
            )?),
            format::OBJTYPE_APP_TEXT => {
                match translate::text::read_app_text(
                    ctx,
                    buf,
                    block_start,
                    data_start,
                    object_length,
                    flags,
                    timestamp,
                    metadata_cont,
                )? {
                    AppTextOutcome::Record {
                        record,
                        metadata_final,
                    } => {
                        // A completed metadata sequence replays from its
                        // first object.
                        let data_offset = if metadata_final && metadata_cont != 0 {
                            last_metadata_start
                        } else {
                            data_offset
                        };
                        return Ok(Some(Framed {
                            record,
                            data_offset,
                            next_pos,
                        }));
                    }
                    AppTextOutcome::MetadataContinues => {
                        if metadata_cont == 0 {
                            last_metadata_start = data_offset;
                        }
                        metadata_cont = buf.len();
                        None
                    }
                    AppTextOutcome::NoRecord => {
                        metadata_cont = 0;
                        last_metadata_start = 0;
                        None
                    }
                }
            }
            other => {
                log::debug!("unknown object type {other} ({other:#06x}), skipping");
                None
            }
        };

        if let Some(record) = record {
            return Ok(Some(Framed {
                record,
                data_offset,
                next_pos,
            }));
        }
        start_pos = next_pos;
    }
}

impl<R: Read + Seek> BlfReader<R> {
    /// Open a BLF file over two independent handles of the same byte
    /// source, discarding interface descriptions.
    ///
    /// The `sequential` handle backs [`Self::read`], the `random` handle
    /// backs [`Self::seek_read`]; they share the container cache.
    pub fn open(sequential: R, random: R) -> Result<Self> {
        Self::open_with_sink(sequential, random, Box::new(|_: &InterfaceDescription| {}))
    }

    /// Open a BLF file, announcing every synthesised interface to `sink`.
    pub fn open_with_sink(
        mut sequential: R,
        random: R,
        sink: Box<dyn InterfaceSink>,
    ) -> Result<Self> {
        sequential.seek(SeekFrom::Start(0))?;
        let mut raw = [0u8; FileHeader::SIZE];
        let n = read_fully(&mut sequential, &mut raw)?;
        if n < raw.len() {
            // Too short to be a BLF file
            return Err(BlfError::NotMine);
        }

        let header: FileHeader = format::read_struct(&raw)?;
        if header.magic != format::FILE_MAGIC {
            return Err(BlfError::NotMine);
        }

        let start_offset_ns = start_offset_ns(&header.start_date);
        let containers = container::scan_containers(&mut sequential, header.header_length as u64)?;
        log::debug!(
            "opened BLF file with {} log containers, start offset {} ns",
            containers.len(),
            start_offset_ns
        );

        Ok(Self {
            sequential,
            random,
            containers,
            ifaces: InterfaceRegistry::new(sink),
            start_offset_ns,
            next_read_pos: 0,
            stats: FileStats::from_header(&header),
        })
    }

    /// Frame the next record in virtual byte order.
    ///
    /// Appends the reshaped payload to `buf` and returns the record
    /// metadata together with the object's virtual offset, which
    /// [`Self::seek_read`] accepts to replay the record. Returns `None` at
    /// the clean end of the stream.
    pub fn read(&mut self, buf: &mut Vec<u8>) -> Result<Option<(Record, u64)>> {
        let mut ctx = ReadCtx {
            vr: VirtualReader {
                fh: &mut self.sequential,
                containers: &mut self.containers,
            },
            ifaces: &mut self.ifaces,
            start_offset_ns: self.start_offset_ns,
        };
        match read_object(&mut ctx, self.next_read_pos, buf)? {
            Some(framed) => {
                self.next_read_pos = framed.next_pos;
                Ok(Some((framed.record, framed.data_offset)))
            }
            None => Ok(None),
        }
    }

    /// Frame exactly one record starting at `data_offset`.
    ///
    /// Idempotent for the same offset and does not perturb the sequential
    /// cursor.
    pub fn seek_read(&mut self, data_offset: u64, buf: &mut Vec<u8>) -> Result<Record> {
        let mut ctx = ReadCtx {
            vr: VirtualReader {
                fh: &mut self.random,
                containers: &mut self.containers,
            },
            ifaces: &mut self.ifaces,
            start_offset_ns: self.start_offset_ns,
        };
        match read_object(&mut ctx, data_offset, buf)? {
            Some(framed) => Ok(framed.record),
            None => Err(BlfError::BadFile(format!(
                "no object found at offset {data_offset}"
            ))),
        }
    }

    /// File-level statistics parsed from the header.
    pub fn file_stats(&self) -> &FileStats {
        &self.stats
    }

    /// Release container buffers and the interface registry.
    ///
    /// Dropping the reader has the same effect; this exists for callers
    /// that want the teardown to be explicit.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: u16, month: u16, day: u16, hour: u16, minute: u16, second: u16, ms: u16) -> BlfDate {
        BlfDate {
            year,
            month,
            day_of_week: 0,
            day,
            hour,
            minute,
            second,
            millisecond: ms,
        }
    }

    #[test]
    fn epoch_start_is_zero() {
        assert_eq!(start_offset_ns(&date(1970, 1, 1, 0, 0, 0, 0)), 0);
    }

    #[test]
    fn start_offset_includes_milliseconds() {
        // 2021-06-01 00:00:00 UTC
        let expected = 1_622_505_600u64 * 1_000_000_000 + 250 * 1_000_000;
        assert_eq!(start_offset_ns(&date(2021, 6, 1, 0, 0, 0, 250)), expected);
    }

    #[test]
    fn invalid_date_falls_back_to_zero() {
        assert_eq!(start_offset_ns(&date(0, 0, 0, 0, 0, 0, 0)), 0);
        assert_eq!(start_offset_ns(&date(2021, 13, 1, 0, 0, 0, 0)), 0);
    }

    #[test]
    fn years_before_the_epoch_are_clamped() {
        assert_eq!(
            start_offset_ns(&date(1969, 12, 31, 23, 59, 59, 0)),
            start_offset_ns(&date(1970, 12, 31, 23, 59, 59, 0))
        );
    }
}
