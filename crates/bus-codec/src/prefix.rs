//! The five-field routing prefix that precedes every frame's payload.

use crate::error::FrameError;
use crate::separators::{FS_CHAR, GS_CHAR, PREFIX_LENGTH};

/// `source_id`, `target_id`, `fragment_index`, `fragment_count`,
/// `message_id` — all `u8`, GS-joined, followed by one FS before the
/// payload. `target_id == 0` means broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingPrefix {
    pub source_id: u8,
    pub target_id: u8,
    pub fragment_index: u8,
    pub fragment_count: u8,
    pub message_id: u8,
}

impl RoutingPrefix {
    /// Length in characters of an encoded prefix, including the
    /// trailing FS that separates it from the payload.
    pub const LENGTH: usize = PREFIX_LENGTH;

    pub fn encode(&self) -> String {
        format!(
            "{:02x}{GS_CHAR}{:02x}{GS_CHAR}{:02x}{GS_CHAR}{:02x}{GS_CHAR}{:02x}{FS_CHAR}",
            self.source_id,
            self.target_id,
            self.fragment_index,
            self.fragment_count,
            self.message_id,
        )
    }

    /// Splits `frame` into its prefix and the remaining payload.
    pub fn decode(frame: &str) -> Result<(Self, &str), FrameError> {
        let (prefix_str, payload) = frame
            .split_once(FS_CHAR)
            .ok_or_else(|| FrameError::MalformedPrefix(frame.to_string()))?;
        let fields: Vec<&str> = prefix_str.split(GS_CHAR).collect();
        let [source_id, target_id, fragment_index, fragment_count, message_id] =
            fields.as_slice()
        else {
            return Err(FrameError::MalformedPrefix(prefix_str.to_string()));
        };
        let parse = |s: &str| {
            u8::from_str_radix(s, 16).map_err(|_| FrameError::MalformedPrefix(prefix_str.to_string()))
        };
        Ok((
            RoutingPrefix {
                source_id: parse(source_id)?,
                target_id: parse(target_id)?,
                fragment_index: parse(fragment_index)?,
                fragment_count: parse(fragment_count)?,
                message_id: parse(message_id)?,
            },
            payload,
        ))
    }
}
