//! The GS-separated list of `arg_id RS encoded_value` entries carried
//! in a frame's payload. This module is type-agnostic: it assembles
//! and splits the text around already-encoded values, leaving typed
//! encoding to [`crate::value`] and the event schema to `bus-schema`.

use crate::error::FrameError;
use crate::separators::{GS_CHAR, RS_CHAR};

/// Joins `entries` (already-encoded `arg_id -> value` pairs) into one
/// GS-separated arg block.
pub fn encode_arg_block(entries: &[(u8, String)]) -> String {
    entries
        .iter()
        .map(|(id, value)| format!("{id:02x}{RS_CHAR}{value}"))
        .collect::<Vec<_>>()
        .join(&GS_CHAR.to_string())
}

/// Splits an arg block back into `(arg_id, encoded_value)` pairs,
/// preserving order. An empty block (no arguments) decodes to an
/// empty list.
pub fn decode_arg_block(block: &str) -> Result<Vec<(u8, String)>, FrameError> {
    if block.is_empty() {
        return Ok(Vec::new());
    }
    block
        .split(GS_CHAR)
        .map(|entry| {
            let (id_str, value) = entry
                .split_once(RS_CHAR)
                .ok_or_else(|| FrameError::MalformedArgBlock(entry.to_string()))?;
            let id = u8::from_str_radix(id_str, 16)
                .map_err(|_| FrameError::MalformedArgBlock(entry.to_string()))?;
            Ok((id, value.to_string()))
        })
        .collect()
}
