//! Application text translator.
//!
//! AppText objects multiplex four different data sources. Channel
//! metadata only feeds the interface registry and yields no record;
//! metadata proper may span several consecutive objects that accumulate
//! into a single exported-PDU record; comments, attachments and trace
//! lines each become one record.

use std::io::{Read, Seek};

use crate::epdu;
use crate::format::{self, AppTextHeader};
use crate::interface::NO_HW_CHANNEL;
use crate::reader::ReadCtx;
use crate::translate::check_payload_header;
use crate::types::{Encap, Record, Result};

/// What an AppText object contributed to the stream.
pub(crate) enum AppTextOutcome {
    /// Channel metadata or an unknown source; bytes consumed, no record.
    NoRecord,
    /// A metadata object whose text continues in the next object.
    MetadataContinues,
    /// A finished record. `metadata_final` marks the end of a metadata
    /// sequence, whose record replays from the first object's offset.
    Record {
        record: Record,
        metadata_final: bool,
    },
}

fn bus_type_encap(bus_type: u8) -> Encap {
    match bus_type {
        format::BUSTYPE_CAN => Encap::SocketCan,
        format::BUSTYPE_FLEXRAY => Encap::FlexRay,
        format::BUSTYPE_LIN => Encap::Lin,
        format::BUSTYPE_ETHERNET => Encap::Ethernet,
        format::BUSTYPE_WLAN => Encap::Ieee80211,
        _ => Encap::Unknown,
    }
}

fn append_text_prolog(buf: &mut Vec<u8>, info: &str) {
    epdu::append_string(buf, epdu::TAG_DISSECTOR_NAME, "data-text-lines");
    epdu::append_string(buf, epdu::TAG_COL_PROT_TEXT, "BLF App text");
    epdu::append_string(buf, epdu::TAG_COL_INFO_TEXT, info);
    epdu::append_end(buf);
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn read_app_text<R: Read + Seek>(
    ctx: &mut ReadCtx<'_, R>,
    buf: &mut Vec<u8>,
    block_start: u64,
    data_start: u64,
    object_length: u64,
    flags: u32,
    timestamp: u64,
    metadata_cont: usize,
) -> Result<AppTextOutcome> {
    check_payload_header(object_length, data_start - block_start, AppTextHeader::SIZE, "APP_TEXT")?;

    let mut raw = [0u8; AppTextHeader::SIZE];
    ctx.vr.read(data_start, &mut raw)?;
    let header: AppTextHeader = format::read_struct(&raw)?;

    let mut metadata_cont = metadata_cont;
    if metadata_cont != 0 && header.source != format::APPTEXT_METADATA {
        // An AppText object from another source interrupts the metadata
        // sequence; the partial record is discarded.
        metadata_cont = 0;
        buf.clear();
    }

    let mut text = vec![0u8; header.text_length as usize];
    ctx.vr.read(data_start + AppTextHeader::SIZE as u64, &mut text)?;

    match header.source {
        format::APPTEXT_CHANNEL => {
            let text = String::from_utf8_lossy(&text);
            // Semicolon-separated tokens; the second one names the channel.
            if let Some(name) = text.split(';').nth(1) {
                let channel = ((header.reserved1 >> 8) & 0xff) as u16;
                let encap = bus_type_encap(((header.reserved1 >> 16) & 0xff) as u8);
                ctx.ifaces.lookup(encap, channel, NO_HW_CHANNEL, Some(name));
            }
            Ok(AppTextOutcome::NoRecord)
        }

        format::APPTEXT_METADATA => {
            if metadata_cont != 0 {
                // Resume appending where the previous object left off
                buf.truncate(metadata_cont);
            } else {
                append_text_prolog(buf, "Metadata");
            }
            buf.extend_from_slice(&text);

            if (header.reserved1 & 0x00ff_ffff) as usize > text.len() {
                return Ok(AppTextOutcome::MetadataContinues);
            }

            let caplen = buf.len() as u32;
            let record = ctx.init_rec(
                flags,
                timestamp,
                Encap::UpperPdu,
                0,
                NO_HW_CHANNEL,
                caplen,
                caplen,
            );
            Ok(AppTextOutcome::Record {
                record,
                metadata_final: true,
            })
        }

        format::APPTEXT_COMMENT | format::APPTEXT_ATTACHMENT | format::APPTEXT_TRACELINE => {
            let info = match header.source {
                format::APPTEXT_COMMENT => "Comment",
                format::APPTEXT_ATTACHMENT => "Attachment",
                _ => "Trace line",
            };
            append_text_prolog(buf, info);

            // The text can contain a terminator before text_length bytes
            let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
            buf.extend_from_slice(&text[..end]);

            let caplen = buf.len() as u32;
            let record = ctx.init_rec(
                flags,
                timestamp,
                Encap::UpperPdu,
                0,
                NO_HW_CHANNEL,
                caplen,
                caplen,
            );
            Ok(AppTextOutcome::Record {
                record,
                metadata_final: false,
            })
        }

        other => {
            log::debug!("unknown app text source {other}, skipping");
            Ok(AppTextOutcome::NoRecord)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_type_mapping() {
        assert_eq!(bus_type_encap(format::BUSTYPE_CAN), Encap::SocketCan);
        assert_eq!(bus_type_encap(format::BUSTYPE_FLEXRAY), Encap::FlexRay);
        assert_eq!(bus_type_encap(format::BUSTYPE_LIN), Encap::Lin);
        assert_eq!(bus_type_encap(format::BUSTYPE_ETHERNET), Encap::Ethernet);
        assert_eq!(bus_type_encap(format::BUSTYPE_WLAN), Encap::Ieee80211);
        assert_eq!(bus_type_encap(0), Encap::Unknown);
    }
}
