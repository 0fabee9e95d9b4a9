//! Wire-format separator bytes.
//!
//! These must stay bit-exact across every peer on the bus: a frame
//! encoded by one endpoint is decoded by another process entirely, so
//! there is no room to "fix" a separator choice later without breaking
//! interop.

/// Separates the five fields of a routing prefix.
pub const GS: u8 = 0x1D;
/// Separates the routing prefix from the payload, and the `event_id`
/// from the arg block within the payload.
pub const FS: u8 = 0x1C;
/// Separates an arg id from its encoded value within an arg-block entry.
pub const RS: u8 = 0x1E;
/// Reserved for future field separation (unit separator); not produced
/// by this codec but forbidden in string values alongside the other
/// six separator bytes.
pub const US: u8 = 0x1F;
/// Joins elements of an encoded `list`/`tuple`.
pub const NAK: u8 = 0x15;
/// Joins key/value halves of a `dict` entry.
pub const SYN: u8 = 0x16;
/// Separates the guessed type tag from the encoded value of an `Any`.
pub const EM: u8 = 0x19;

pub const GS_CHAR: char = GS as char;
pub const FS_CHAR: char = FS as char;
pub const RS_CHAR: char = RS as char;
pub const US_CHAR: char = US as char;
pub const NAK_CHAR: char = NAK as char;
pub const SYN_CHAR: char = SYN as char;
pub const EM_CHAR: char = EM as char;

/// Number of hex-encoded bytes in a routing prefix (`source_id`,
/// `target_id`, `fragment_index`, `fragment_count`, `message_id`).
pub const PREFIX_FIELDS: usize = 5;

/// Length in characters of an assembled routing prefix, GS-joined plus
/// the trailing FS that separates it from the payload: 5 fields * 2
/// hex chars + 4 GS + 1 FS.
pub const PREFIX_LENGTH: usize = PREFIX_FIELDS * 2 + (PREFIX_FIELDS - 1) + 1;
