use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, ErrorKind, Result};
use crate::record::RecordLayout;

/// Size of the compact box header (u32 size + fourcc type).
pub const BOX_HEADER_LEN: usize = 8;
/// Size of the header when the 64-bit largeSize form is in use.
pub const LARGE_BOX_HEADER_LEN: usize = 16;

/// Borrowed view of one ISO-BMFF box: u32 size, fourcc type, body.
///
/// The standard's extended forms are honoured: a size of 1 means a 64-bit
/// `largeSize` follows the type, and a size of 0 means the box extends to
/// the end of the enclosing payload. The view is only valid for the
/// duration of the handler call that received it.
#[derive(Debug, Clone, Copy)]
pub struct Mp4Box<'a> {
    data: &'a [u8],
}

impl<'a> Mp4Box<'a> {
    /// Wraps a raw record. The slice must cover exactly one box; a declared
    /// size that disagrees with the slice is a protocol error.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let total = box_len(data)?;
        if total != data.len() {
            return Err(Error::new(ErrorKind::BadMessage));
        }
        Ok(Self { data })
    }

    /// The raw 32-bit size field (possibly 0 or 1, see the type docs).
    pub fn size32(&self) -> u32 {
        BigEndian::read_u32(&self.data[..4])
    }

    /// Box type as its four-character code.
    pub fn box_type(&self) -> [u8; 4] {
        [self.data[4], self.data[5], self.data[6], self.data[7]]
    }

    pub fn header_len(&self) -> usize {
        if self.size32() == 1 {
            LARGE_BOX_HEADER_LEN
        } else {
            BOX_HEADER_LEN
        }
    }

    /// Total box length on the wire.
    pub fn total_len(&self) -> usize {
        self.data.len()
    }

    pub fn body(&self) -> &'a [u8] {
        &self.data[self.header_len()..]
    }

    /// Version and flags of a full box, if the body is large enough to
    /// carry them. Whether the box type actually is a full box is the
    /// caller's knowledge.
    pub fn version_flags(&self) -> Option<(u8, u32)> {
        let body = self.body();
        if body.len() < 4 {
            return None;
        }
        Some((body[0], BigEndian::read_u24(&body[1..4])))
    }

    /// The raw record bytes, including the header.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

/// Resolved wire length of the box at the head of `data`.
fn box_len(data: &[u8]) -> Result<usize> {
    if data.len() < BOX_HEADER_LEN {
        return Err(Error::new(ErrorKind::BadMessage));
    }
    let size = BigEndian::read_u32(&data[..4]);
    let total = match size {
        // Extends to the end of the enclosing payload.
        0 => data.len(),
        1 => {
            if data.len() < LARGE_BOX_HEADER_LEN {
                return Err(Error::new(ErrorKind::BadMessage));
            }
            let large = BigEndian::read_u64(&data[8..16]);
            if large < LARGE_BOX_HEADER_LEN as u64 || large > data.len() as u64 {
                return Err(Error::new(ErrorKind::BadMessage));
            }
            large as usize
        }
        _ => {
            let size = size as usize;
            if size < BOX_HEADER_LEN || size > data.len() {
                return Err(Error::new(ErrorKind::BadMessage));
            }
            size
        }
    };
    Ok(total)
}

/// fMP4 record stepping for the payload splitter.
pub struct Mp4Layout;

impl RecordLayout for Mp4Layout {
    fn name(&self) -> &'static str {
        "fmp4"
    }

    // fMP4 streams carry no file header before the first box.
    fn header_len(&self, _payload: &[u8]) -> Result<usize> {
        Ok(0)
    }

    fn record_len(&self, data: &[u8]) -> Result<usize> {
        box_len(data)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::record::split_payload;

    fn encode_box(box_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(BOX_HEADER_LEN + body.len());
        out.extend_from_slice(&((BOX_HEADER_LEN + body.len()) as u32).to_be_bytes());
        out.extend_from_slice(box_type);
        out.extend_from_slice(body);
        out
    }

    fn encode_large_box(box_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(LARGE_BOX_HEADER_LEN + body.len());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(box_type);
        out.extend_from_slice(&((LARGE_BOX_HEADER_LEN + body.len()) as u64).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    // Two compact boxes in one payload.
    #[test]
    fn splits_box_sequence() {
        let mut payload = encode_box(b"ftyp", &[0; 8]);
        payload.extend_from_slice(&encode_box(b"moov", &[]));

        let mut seen = Vec::new();
        let delivered = split_payload(&Mp4Layout, &payload, true, &mut |record| {
            let parsed = Mp4Box::new(record)?;
            seen.push((parsed.box_type(), parsed.total_len()));
            Ok(())
        })
        .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(seen, vec![(*b"ftyp", 16), (*b"moov", 8)]);
    }

    // A declared size below the header size is a protocol error.
    #[test]
    fn undersized_box_is_bad_message() {
        let mut payload = encode_box(b"moof", &[]);
        payload[..4].copy_from_slice(&3u32.to_be_bytes());

        let err = split_payload(&Mp4Layout, &payload, true, &mut |_| Ok(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMessage);
    }

    #[test]
    fn zero_size_box_extends_to_payload_end() {
        let mut payload = encode_box(b"moof", &[1, 2, 3]);
        let mut open_ended = encode_box(b"mdat", b"media-bytes-until-end");
        open_ended[..4].copy_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&open_ended);

        let mut seen = Vec::new();
        split_payload(&Mp4Layout, &payload, false, &mut |record| {
            let parsed = Mp4Box::new(record)?;
            seen.push((parsed.box_type(), parsed.total_len()));
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, vec![(*b"moof", 11), (*b"mdat", open_ended.len())]);
    }

    #[test]
    fn large_size_box_steps_correctly() {
        let mut payload = encode_large_box(b"mdat", b"0123456789");
        payload.extend_from_slice(&encode_box(b"moof", &[]));

        let mut seen = Vec::new();
        split_payload(&Mp4Layout, &payload, false, &mut |record| {
            let parsed = Mp4Box::new(record)?;
            seen.push((parsed.box_type(), parsed.total_len(), parsed.body().len()));
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, vec![(*b"mdat", 26, 10), (*b"moof", 8, 0)]);
    }

    #[test]
    fn truncated_large_header_is_bad_message() {
        let mut data = encode_large_box(b"mdat", b"xyz");
        data.truncate(12);
        assert_eq!(Mp4Box::new(&data).unwrap_err().kind(), ErrorKind::BadMessage);
    }

    #[test]
    fn oversized_declared_length_is_bad_message() {
        let mut data = encode_box(b"moov", &[0; 4]);
        data[..4].copy_from_slice(&64u32.to_be_bytes());
        let err = split_payload(&Mp4Layout, &data, false, &mut |_| Ok(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMessage);
    }

    #[test]
    fn version_flags_read_from_full_box_body() {
        let parsed_data = encode_box(b"tfdt", &[0x01, 0x00, 0x00, 0x02, 0, 0, 0, 0]);
        let parsed = Mp4Box::new(&parsed_data).unwrap();
        assert_eq!(parsed.version_flags(), Some((1, 2)));

        let bare_data = encode_box(b"free", &[]);
        let bare = Mp4Box::new(&bare_data).unwrap();
        assert_eq!(bare.version_flags(), None);
    }

    proptest! {
        // Any concatenation of valid boxes splits back into the same
        // sequence, in order.
        #[test]
        fn splitter_is_exact(
            boxes in proptest::collection::vec(
                (proptest::array::uniform4(b'a'..=b'z'), proptest::collection::vec(any::<u8>(), 0..48)),
                1..8,
            ),
        ) {
            let encoded: Vec<Vec<u8>> = boxes
                .iter()
                .map(|(box_type, body)| encode_box(box_type, body))
                .collect();
            let payload: Vec<u8> = encoded.iter().flatten().copied().collect();

            let mut seen = Vec::new();
            let delivered = split_payload(&Mp4Layout, &payload, false, &mut |record| {
                seen.push(record.to_vec());
                Ok(())
            }).unwrap();

            prop_assert_eq!(delivered, encoded.len());
            prop_assert_eq!(seen, encoded);
        }
    }
}
