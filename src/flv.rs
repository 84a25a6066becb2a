use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, ErrorKind, Result};
use crate::record::RecordLayout;

/// FLV file signature at the head of a stream.
pub const FLV_SIGNATURE: [u8; 3] = *b"FLV";
/// Size of the FLV file header.
pub const FLV_HEADER_LEN: usize = 9;
/// Size of the "previous tag size" field trailing every tag.
pub const PREV_TAG_SIZE_LEN: usize = 4;
/// Size of a tag header (type, length, timestamp, stream id).
pub const TAG_HEADER_LEN: usize = 11;

/// Audio tag.
pub const TAG_TYPE_AUDIO: u8 = 8;
/// Video tag.
pub const TAG_TYPE_VIDEO: u8 = 9;
/// Script-data (AMF0) tag.
pub const TAG_TYPE_SCRIPT_DATA: u8 = 18;

/// Borrowed view of one FLV tag as it sits on the wire: an 11-byte header,
/// the payload, and the trailing previous-tag-size field.
///
/// The view is only valid for the duration of the handler call that
/// received it; copy the bytes out to keep them.
#[derive(Debug, Clone, Copy)]
pub struct FlvTag<'a> {
    data: &'a [u8],
}

impl<'a> FlvTag<'a> {
    /// Wraps a raw record. The slice must hold at least the tag header and
    /// the payload the header declares.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < TAG_HEADER_LEN {
            return Err(Error::new(ErrorKind::BadMessage));
        }
        let declared = BigEndian::read_u24(&data[1..4]) as usize;
        if TAG_HEADER_LEN + declared > data.len() {
            return Err(Error::new(ErrorKind::BadMessage));
        }
        Ok(Self { data })
    }

    /// Tag type: audio (8), video (9) or script data (18).
    pub fn tag_type(&self) -> u8 {
        self.data[0]
    }

    /// Declared payload length.
    pub fn data_size(&self) -> u32 {
        BigEndian::read_u24(&self.data[1..4])
    }

    /// Extended 32-bit timestamp in milliseconds. The wire stores the lower
    /// 24 bits first and the upper 8 bits in a separate byte.
    pub fn timestamp(&self) -> u32 {
        let lower = BigEndian::read_u24(&self.data[4..7]);
        let upper = self.data[7] as u32;
        (upper << 24) | lower
    }

    pub fn stream_id(&self) -> u32 {
        BigEndian::read_u24(&self.data[8..11])
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.data[TAG_HEADER_LEN..TAG_HEADER_LEN + self.data_size() as usize]
    }

    /// The raw record bytes, including header and trailing framing.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

/// FLV record stepping for the payload splitter.
pub struct FlvLayout;

impl RecordLayout for FlvLayout {
    fn name(&self) -> &'static str {
        "flv"
    }

    // File header plus the initial previous-tag-size word.
    fn header_len(&self, payload: &[u8]) -> Result<usize> {
        let skip = FLV_HEADER_LEN + PREV_TAG_SIZE_LEN;
        if payload.len() < skip || payload[..3] != FLV_SIGNATURE {
            return Err(Error::new(ErrorKind::BadMessage));
        }
        Ok(skip)
    }

    fn record_len(&self, data: &[u8]) -> Result<usize> {
        if data.len() < TAG_HEADER_LEN {
            return Err(Error::new(ErrorKind::BadMessage));
        }
        let declared = BigEndian::read_u24(&data[1..4]) as usize;
        let total = TAG_HEADER_LEN + declared + PREV_TAG_SIZE_LEN;
        if total > data.len() {
            return Err(Error::new(ErrorKind::BadMessage));
        }
        Ok(total)
    }
}

const ON_TEXT_DATA: &[u8] = b"onTextData";

/// Extracts the wall-clock millisecond value from an AMF0 `onTextData`
/// script payload.
///
/// Returns 0 when the payload is not an `onTextData` record (that is not an
/// error). The `type` and `text` members are accepted in either order. The
/// `text` value must be plain ASCII decimal; any other byte is a protocol
/// error, as is any read past the payload end. Values wider than u64 wrap;
/// guarding against that is the caller's concern.
pub fn parse_wallclock(payload: &[u8]) -> Result<u64> {
    let mut reader = Amf0Reader::new(payload);

    // String marker and length precede the record name.
    if reader.take(1 + 2).is_err() {
        return Ok(0);
    }
    match reader.take(ON_TEXT_DATA.len()) {
        Ok(name) if name == ON_TEXT_DATA => {}
        _ => return Ok(0),
    }

    // ECMA-array marker and element count.
    reader.take(1 + 4)?;

    let first_key = reader.read_string()?;
    if first_key == b"type" {
        reader.read_marked_string()?;
        let text = expect_key(&mut reader, b"text")?;
        parse_decimal(text)
    } else if first_key == b"text" {
        let marked = reader.read_marked_string()?;
        let value = parse_decimal(marked)?;
        expect_key(&mut reader, b"type")?;
        Ok(value)
    } else {
        Err(Error::new(ErrorKind::BadMessage))
    }
}

fn expect_key<'a>(reader: &mut Amf0Reader<'a>, key: &[u8]) -> Result<&'a [u8]> {
    if reader.read_string()? != key {
        return Err(Error::new(ErrorKind::BadMessage));
    }
    reader.read_marked_string()
}

fn parse_decimal(digits: &[u8]) -> Result<u64> {
    let mut value: u64 = 0;
    for byte in digits {
        if !byte.is_ascii_digit() {
            return Err(Error::new(ErrorKind::BadMessage));
        }
        value = value.wrapping_mul(10).wrapping_add(u64::from(byte - b'0'));
    }
    Ok(value)
}

/// Bounds-checked reader over an AMF0 payload.
struct Amf0Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Amf0Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(|| Error::new(ErrorKind::BadMessage))?;
        if end > self.data.len() {
            return Err(Error::new(ErrorKind::BadMessage));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(BigEndian::read_u16(bytes))
    }

    /// u16-length-prefixed byte string.
    fn read_string(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u16()? as usize;
        self.take(len)
    }

    /// One type-marker byte followed by a u16-length-prefixed string.
    fn read_marked_string(&mut self) -> Result<&'a [u8]> {
        self.take(1)?;
        self.read_string()
    }
}
