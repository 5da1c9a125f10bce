//! Log container index, decompression cache and the virtual address space.
//!
//! A BLF file is a sequence of *log containers*, each holding a slice of
//! the logical object stream either raw or DEFLATE-compressed. The scan at
//! open time records where each container sits in the file and where its
//! decompressed bytes fall in the virtual (decompressed) address space.
//! All layers above this module address bytes by virtual offset only.

use std::io::{Read, Seek, SeekFrom};

use zune_inflate::{DeflateDecoder, DeflateOptions};

use crate::format::{self, BlockHeader, LogContainerHeader};
use crate::types::{BlfError, Result};

/// One log container discovered by the open-time scan.
///
/// `real_data`, once populated, is never mutated and lives until the
/// reader is dropped.
#[derive(Debug)]
pub(crate) struct LogContainer {
    /// Physical offset of the container's block header
    pub infile_start_pos: u64,
    /// Total physical length including headers
    pub infile_length: u64,
    /// Physical offset where the (possibly compressed) payload begins
    pub infile_data_start: u64,
    /// Virtual offset of the container's decompressed bytes
    pub real_start_pos: u64,
    /// Decompressed length
    pub real_length: u64,
    pub compression_method: u16,
    /// Lazily populated decompressed payload, exactly `real_length` bytes
    pub real_data: Option<Vec<u8>>,
}

/// Read as many bytes as the source yields, tolerating end of file.
pub(crate) fn read_fully<R: Read>(fh: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match fh.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Advance distance from one object header to the next.
pub(crate) fn object_advance(header_length: u16, object_length: u32) -> u64 {
    (object_length as u64)
        .max(header_length as u64)
        .max(BlockHeader::SIZE as u64)
}

/// Walk the physical file once and build the container index.
///
/// Called only at open. Trailing junk, a truncated container header or an
/// unexpected top-level header type end the scan without failing the open;
/// the framer surfaces real errors later if the indexed part is unusable.
pub(crate) fn scan_containers<R: Read + Seek>(
    fh: &mut R,
    first_object_pos: u64,
) -> Result<Vec<LogContainer>> {
    let mut containers: Vec<LogContainer> = Vec::new();
    let mut current_start_pos = first_object_pos;
    let mut current_real_start = 0u64;

    loop {
        // Locate the next object header, tolerating vendor padding by
        // re-trying one byte later on a magic mismatch.
        let mut raw = [0u8; BlockHeader::SIZE];
        let header: BlockHeader = loop {
            fh.seek(SeekFrom::Start(current_start_pos))?;
            let n = read_fully(fh, &mut raw)?;
            if n < raw.len() {
                // Some writers append a few zero bytes after the last
                // container; that is a clean end of file.
                log::debug!("found end of file after {} containers", containers.len());
                return Ok(containers);
            }
            if raw[0..4] == format::OBJECT_MAGIC {
                break format::read_struct(&raw)?;
            }
            log::debug!("object magic is not LOBJ (pos {:#x})", current_start_pos);
            current_start_pos += 1;
        };

        if header.header_type != format::HEADER_TYPE_DEFAULT {
            log::warn!(
                "unexpected header type {} at top level (pos {:#x}), stopping container scan",
                header.header_type,
                current_start_pos
            );
            return Ok(containers);
        }

        if header.object_type == format::OBJTYPE_LOG_CONTAINER {
            if (header.header_length as usize) < BlockHeader::SIZE {
                log::warn!("log container header length too short, stopping container scan");
                return Ok(containers);
            }

            // The container header sits right after the (possibly padded)
            // block header.
            fh.seek(SeekFrom::Start(current_start_pos + header.header_length as u64))?;
            let mut craw = [0u8; LogContainerHeader::SIZE];
            let n = read_fully(fh, &mut craw)?;
            if n < craw.len() {
                log::warn!("not enough bytes for log container header, stopping container scan");
                return Ok(containers);
            }
            let container_header: LogContainerHeader = format::read_struct(&craw)?;

            containers.push(LogContainer {
                infile_start_pos: current_start_pos,
                infile_length: header.object_length as u64,
                infile_data_start: current_start_pos
                    + header.header_length as u64
                    + LogContainerHeader::SIZE as u64,
                real_start_pos: current_real_start,
                real_length: container_header.uncompressed_size as u64,
                compression_method: container_header.compression_method,
                real_data: None,
            });

            current_real_start += container_header.uncompressed_size as u64;
        } else {
            log::debug!(
                "skipping top-level object type {} (pos {:#x})",
                header.object_type,
                current_start_pos
            );
        }

        current_start_pos += object_advance(header.header_length, header.object_length);
    }
}

/// View over the virtual (decompressed) byte stream, bound to one of the
/// reader's two file handles.
pub(crate) struct VirtualReader<'a, R> {
    pub fh: &'a mut R,
    pub containers: &'a mut Vec<LogContainer>,
}

impl<R: Read + Seek> VirtualReader<'_, R> {
    /// Index of the container holding the given virtual offset.
    fn find_container(&self, pos: u64) -> Option<usize> {
        let idx = self
            .containers
            .partition_point(|c| c.real_start_pos <= pos);
        if idx == 0 {
            return None;
        }
        let container = &self.containers[idx - 1];
        (pos < container.real_start_pos + container.real_length).then_some(idx - 1)
    }

    /// Fill `out` from the virtual stream starting at `real_pos`.
    ///
    /// Returns `Ok(false)` when the requested range cannot be mapped or the
    /// physical file ends inside an uncompressed container; callers framing
    /// the next object header treat that as a clean end of stream, everyone
    /// else converts it into [`BlfError::ShortRead`] via [`Self::read`].
    pub fn read_or_eof(&mut self, real_pos: u64, out: &mut [u8]) -> Result<bool> {
        if out.is_empty() {
            return Ok(true);
        }

        let Some(start_index) = self.find_container(real_pos) else {
            log::debug!("cannot read: start position {real_pos} maps to no container");
            return Ok(false);
        };
        if self
            .find_container(real_pos + out.len() as u64 - 1)
            .is_none()
        {
            log::debug!("cannot read: end position maps to no container");
            return Ok(false);
        }

        let mut index = start_index;
        let mut start_in_buf = (real_pos - self.containers[index].real_start_pos) as usize;
        let mut copied = 0usize;

        while copied < out.len() {
            if index >= self.containers.len() {
                return Err(BlfError::Internal(
                    "ran out of log containers mid-read".into(),
                ));
            }

            let (data_left, method, data_start) = {
                let container = &self.containers[index];
                (
                    container.real_length as usize - start_in_buf,
                    container.compression_method,
                    container.infile_data_start,
                )
            };
            let take = (out.len() - copied).min(data_left);

            match method {
                format::COMPRESSION_NONE => {
                    // Uncompressed containers never allocate; the slice is
                    // served straight from the file.
                    self.fh
                        .seek(SeekFrom::Start(data_start + start_in_buf as u64))?;
                    let n = read_fully(self.fh, &mut out[copied..copied + take])?;
                    if n < take {
                        log::debug!("short read inside uncompressed log container");
                        return Ok(false);
                    }
                }
                format::COMPRESSION_ZLIB => {
                    self.pull(index)?;
                    let container = &self.containers[index];
                    let data = container.real_data.as_deref().ok_or_else(|| {
                        BlfError::Internal("pulling in log container failed hard".into())
                    })?;
                    out[copied..copied + take]
                        .copy_from_slice(&data[start_in_buf..start_in_buf + take]);
                }
                other => {
                    return Err(BlfError::Unsupported(format!(
                        "unknown compression method {other}"
                    )));
                }
            }

            copied += take;
            index += 1;
            start_in_buf = 0;
        }

        Ok(true)
    }

    /// Like [`Self::read_or_eof`] but a short read is an error.
    pub fn read(&mut self, real_pos: u64, out: &mut [u8]) -> Result<()> {
        if self.read_or_eof(real_pos, out)? {
            Ok(())
        } else {
            Err(BlfError::ShortRead)
        }
    }

    /// Ensure a compressed container's decompressed bytes are in memory.
    pub fn pull(&mut self, index: usize) -> Result<()> {
        let (data_length, real_length, data_start) = {
            let container = &self.containers[index];
            if container.real_data.is_some()
                || container.compression_method != format::COMPRESSION_ZLIB
            {
                return Ok(());
            }
            if container.infile_data_start < container.infile_start_pos {
                return Err(BlfError::Internal(format!(
                    "log container {index} data starts before its header"
                )));
            }
            let header_span = container.infile_data_start - container.infile_start_pos;
            if container.infile_length < header_span {
                return Err(BlfError::Internal(format!(
                    "log container {index} is shorter than its own header"
                )));
            }
            (
                (container.infile_length - header_span) as usize,
                container.real_length as usize,
                container.infile_data_start,
            )
        };

        let mut compressed = vec![0u8; data_length];
        self.fh.seek(SeekFrom::Start(data_start))?;
        let n = read_fully(self.fh, &mut compressed)?;
        if n < data_length {
            // A truncated compressed container cannot be told apart from a
            // damaged file; do not fold this into end-of-stream handling.
            return Err(BlfError::Internal(
                "short read on compressed log container data".into(),
            ));
        }

        let options = DeflateOptions::default()
            .set_limit(real_length)
            .set_size_hint(real_length);
        let mut decoder = DeflateDecoder::new_with_options(&compressed, options);
        let data = decoder.decode_zlib().map_err(|e| {
            BlfError::Decompress(format!("inflate failed for log container {index}: {e:?}"))
        })?;
        if data.len() != real_length {
            return Err(BlfError::Decompress(format!(
                "log container {index} inflated to {} bytes, expected {real_length}",
                data.len()
            )));
        }

        self.containers[index].real_data = Some(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn plain_container(real_start: u64, real_length: u64, data_start: u64) -> LogContainer {
        LogContainer {
            infile_start_pos: data_start.saturating_sub(32),
            infile_length: real_length + 32,
            infile_data_start: data_start,
            real_start_pos: real_start,
            real_length,
            compression_method: format::COMPRESSION_NONE,
            real_data: None,
        }
    }

    #[test]
    fn find_container_maps_boundaries() {
        let mut file = Cursor::new(Vec::new());
        let mut containers = vec![
            plain_container(0, 100, 32),
            plain_container(100, 50, 164),
        ];
        let vr = VirtualReader {
            fh: &mut file,
            containers: &mut containers,
        };

        assert_eq!(vr.find_container(0), Some(0));
        assert_eq!(vr.find_container(99), Some(0));
        assert_eq!(vr.find_container(100), Some(1));
        assert_eq!(vr.find_container(149), Some(1));
        assert_eq!(vr.find_container(150), None);
    }

    #[test]
    fn read_spans_adjacent_containers() {
        // Physical layout: two uncompressed payloads back to back, each
        // preceded by a fake 4-byte header.
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(&[5, 6, 7, 8]);
        let mut file = Cursor::new(bytes);

        let mut containers = vec![plain_container(0, 4, 4), plain_container(4, 4, 12)];
        let mut vr = VirtualReader {
            fh: &mut file,
            containers: &mut containers,
        };

        let mut out = [0u8; 6];
        assert!(vr.read_or_eof(1, &mut out).unwrap());
        assert_eq!(out, [2, 3, 4, 5, 6, 7]);

        // Reading past the virtual end maps to no container.
        let mut out = [0u8; 4];
        assert!(!vr.read_or_eof(6, &mut out).unwrap());
    }

    #[test]
    fn scan_tolerates_trailing_zeros() {
        // File header is skipped by the caller; build just the container
        // region: one uncompressed container followed by 8 zero bytes.
        let payload = [0xabu8; 24];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"LOBJ");
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(&format::HEADER_TYPE_DEFAULT.to_le_bytes());
        let object_length = (BlockHeader::SIZE + LogContainerHeader::SIZE + payload.len()) as u32;
        bytes.extend_from_slice(&object_length.to_le_bytes());
        bytes.extend_from_slice(&format::OBJTYPE_LOG_CONTAINER.to_le_bytes());
        bytes.extend_from_slice(&format::COMPRESSION_NONE.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&payload);
        bytes.extend_from_slice(&[0u8; 8]);

        let mut file = Cursor::new(bytes);
        let containers = scan_containers(&mut file, 0).unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].real_start_pos, 0);
        assert_eq!(containers[0].real_length, payload.len() as u64);
        assert_eq!(containers[0].infile_data_start, 32);
        assert_eq!(containers[0].infile_length, object_length as u64);
    }

    #[test]
    fn adjacent_containers_tile_the_virtual_space() {
        // Two containers in a row; their virtual ranges must abut.
        let mut bytes = Vec::new();
        for payload_len in [10usize, 20] {
            bytes.extend_from_slice(b"LOBJ");
            bytes.extend_from_slice(&16u16.to_le_bytes());
            bytes.extend_from_slice(&format::HEADER_TYPE_DEFAULT.to_le_bytes());
            let object_length =
                (BlockHeader::SIZE + LogContainerHeader::SIZE + payload_len) as u32;
            bytes.extend_from_slice(&object_length.to_le_bytes());
            bytes.extend_from_slice(&format::OBJTYPE_LOG_CONTAINER.to_le_bytes());
            bytes.extend_from_slice(&format::COMPRESSION_NONE.to_le_bytes());
            bytes.extend_from_slice(&0u16.to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
            bytes.extend_from_slice(&(payload_len as u32).to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
            bytes.extend(std::iter::repeat(0u8).take(payload_len));
        }

        let mut file = Cursor::new(bytes);
        let containers = scan_containers(&mut file, 0).unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(
            containers[0].real_start_pos + containers[0].real_length,
            containers[1].real_start_pos
        );
    }
}
