//! Splitting an encoded payload into ordered frame fragments, and
//! reassembling fragments back into the original payload on the
//! receiving side.

use std::collections::HashMap;

use tracing::warn;

use crate::error::FrameError;
use crate::prefix::RoutingPrefix;

/// Splits `payload` into `ceil(len / max_inner_len)` fragments, each at
/// most `max_inner_len` bytes, on `char` boundaries. Never produces an
/// empty trailing fragment; an empty `payload` yields a single empty
/// fragment (fragment_count = 1).
pub fn fragment(payload: &str, max_inner_len: usize) -> Vec<String> {
    assert!(max_inner_len > 0, "max_inner_len must be positive");
    if payload.is_empty() {
        return vec![String::new()];
    }
    let mut fragments = Vec::new();
    let mut current = String::new();
    for c in payload.chars() {
        if current.len() + c.len_utf8() > max_inner_len && !current.is_empty() {
            fragments.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    fragments
}

#[derive(Debug)]
struct ReassemblyState {
    next_index: u8,
    fragment_count: u8,
    accumulated: String,
}

/// Listener-local table of in-flight multi-fragment messages, keyed by
/// `(source_id, message_id)`.
#[derive(Debug, Default)]
pub struct Reassembler {
    buffers: HashMap<(u8, u8), ReassemblyState>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment's routing prefix and payload into the
    /// reassembler. Returns `Ok(Some(payload))` once the logical
    /// message is complete, `Ok(None)` while more fragments are
    /// expected, and `Err` (dropping any in-flight state for the key)
    /// when a fragment arrives out of order or duplicated.
    pub fn accept(&mut self, prefix: &RoutingPrefix, payload: &str) -> Result<Option<String>, FrameError> {
        if prefix.fragment_count <= 1 {
            return Ok(Some(payload.to_string()));
        }
        let key = (prefix.source_id, prefix.message_id);
        if prefix.fragment_index == 0 {
            self.buffers.insert(
                key,
                ReassemblyState {
                    next_index: 1,
                    fragment_count: prefix.fragment_count,
                    accumulated: payload.to_string(),
                },
            );
            return Ok(None);
        }
        match self.buffers.get_mut(&key) {
            Some(state) if state.next_index == prefix.fragment_index => {
                state.accumulated.push_str(payload);
                state.next_index += 1;
                if state.next_index == state.fragment_count {
                    let state = self.buffers.remove(&key).expect("just matched");
                    Ok(Some(state.accumulated))
                } else {
                    Ok(None)
                }
            }
            _ => {
                self.buffers.remove(&key);
                warn!(
                    source_id = prefix.source_id,
                    message_id = prefix.message_id,
                    fragment_index = prefix.fragment_index,
                    "out-of-order or duplicate fragment, dropping in-flight message"
                );
                Err(FrameError::FragmentError(format!(
                    "out-of-order or duplicate fragment index {} for message_id {} from source {}",
                    prefix.fragment_index, prefix.message_id, prefix.source_id
                )))
            }
        }
    }

    /// Count of in-flight (incomplete) messages; exposed for tests and
    /// diagnostics.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }
}
