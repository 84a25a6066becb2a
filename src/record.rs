use log::debug;

use crate::error::Result;

/// In-band JSON control frames are always shorter than this.
pub const MAX_CONTROL_MESSAGE_LEN: usize = 1024;

/// Returns true if a payload looks like an in-band JSON control frame
/// rather than container data.
///
/// This is the wire contract's heuristic: first byte `{` and shorter than
/// 1 KiB. A binary record that begins with byte 0x7B and fits under the
/// bound would be misclassified; the stream sources this library targets
/// never emit such records as standalone payloads.
pub fn is_control_frame(payload: &[u8]) -> bool {
    payload.first() == Some(&b'{') && payload.len() < MAX_CONTROL_MESSAGE_LEN
}

/// Capability set a container format exposes to the transport: how to get
/// past the stream header and how far to step to the next record.
///
/// The transport layer only ever moves opaque byte views; the session
/// facades reattach record types on top.
pub trait RecordLayout: Sync {
    /// Container name for diagnostics.
    fn name(&self) -> &'static str;

    /// Validates the stream-header prefix of the first container payload
    /// and returns how many bytes of it precede the first record.
    fn header_len(&self, payload: &[u8]) -> Result<usize>;

    /// Full wire length of the record at the head of `data`, including any
    /// trailing framing. Must reject declared sizes below the minimum
    /// record header and sizes extending past `data`.
    fn record_len(&self, data: &[u8]) -> Result<usize>;
}

/// Splits one WebSocket payload into container records and hands each one
/// to `handler` as a borrowed view. Returns the number of records
/// delivered.
///
/// JSON control frames and empty payloads produce zero records. A handler
/// error halts the walk and propagates unchanged. Record boundaries are
/// assumed payload-aligned at the source; a truncated trailing record is a
/// protocol error.
pub fn split_payload(
    layout: &dyn RecordLayout,
    payload: &[u8],
    first_media_payload: bool,
    handler: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<usize> {
    if payload.is_empty() {
        return Ok(0);
    }
    if is_control_frame(payload) {
        debug!("ignoring {}-byte in-band control frame", payload.len());
        return Ok(0);
    }

    let mut offset = 0;
    if first_media_payload {
        offset = layout.header_len(payload)?;
    }

    let mut delivered = 0;
    while offset < payload.len() {
        let len = layout.record_len(&payload[offset..])?;
        handler(&payload[offset..offset + len])?;
        delivered += 1;
        offset += len;
    }

    debug!("split {delivered} {} record(s) out of {} bytes", layout.name(), payload.len());
    Ok(delivered)
}
