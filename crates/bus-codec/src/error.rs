use thiserror::Error;

/// Failure converting between a typed [`crate::value::Value`] and its
/// wire-text encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("cannot parse {raw:?} as {type_name}")]
    BadValue { raw: String, type_name: String },
    #[error("unsupported or malformed type designator {0:?}")]
    BadType(String),
    #[error("malformed encoded value {0:?}")]
    Malformed(String),
    #[error("string value {0:?} contains a reserved framing separator byte")]
    ForbiddenByte(String),
}

impl ValueError {
    pub(crate) fn bad(raw: &str, type_name: &str) -> Self {
        ValueError::BadValue {
            raw: raw.to_string(),
            type_name: type_name.to_string(),
        }
    }

    pub(crate) fn bad_type(type_name: &str) -> Self {
        ValueError::BadType(type_name.to_string())
    }
}

/// Failure decoding a routing prefix, a frame payload, or an arg block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed routing prefix {0:?}")]
    MalformedPrefix(String),
    #[error("malformed frame {0:?}")]
    Malformed(String),
    #[error("malformed arg block entry {0:?}")]
    MalformedArgBlock(String),
    #[error("fragment reassembly error: {0}")]
    FragmentError(String),
    #[error(transparent)]
    Value(#[from] ValueError),
}
