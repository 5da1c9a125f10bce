//! Exported-PDU envelope helpers.
//!
//! Synthetic records (application text, Ethernet status) are shipped as
//! upper-PDU payloads: a sequence of `(tag, length, value)` options naming
//! the target dissector and display columns, a terminating end-of-options
//! tag, then the data bytes. Tags and lengths are big-endian; values are
//! zero-padded to a four-byte boundary while the length field keeps the
//! unpadded size.

pub const TAG_DISSECTOR_NAME: u16 = 12;
pub const TAG_COL_PROT_TEXT: u16 = 33;
pub const TAG_COL_INFO_TEXT: u16 = 36;

pub(crate) fn append_string(buf: &mut Vec<u8>, tag: u16, value: &str) {
    buf.extend_from_slice(&tag.to_be_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
    let pad = (4 - value.len() % 4) % 4;
    buf.extend(std::iter::repeat(0u8).take(pad));
}

pub(crate) fn append_end(buf: &mut Vec<u8>) {
    buf.extend_from_slice(&[0, 0, 0, 0]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_option_is_padded_to_four_bytes() {
        let mut buf = Vec::new();
        append_string(&mut buf, TAG_DISSECTOR_NAME, "abcde");
        assert_eq!(
            buf,
            [0, 12, 0, 5, b'a', b'b', b'c', b'd', b'e', 0, 0, 0]
        );
    }

    #[test]
    fn aligned_string_gets_no_padding() {
        let mut buf = Vec::new();
        append_string(&mut buf, TAG_COL_INFO_TEXT, "data");
        assert_eq!(buf.len(), 8);
        append_end(&mut buf);
        assert_eq!(&buf[8..], [0, 0, 0, 0]);
    }
}
