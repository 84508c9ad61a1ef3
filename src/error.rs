//! Error types

use thiserror::Error;

/// Failure to parse a `<channel_type>:<index>:<parameter>` path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("expected 3 segments in parameter path, got {0}")]
    SegmentCount(usize),

    #[error("unknown channel type: {0}")]
    UnknownChannelType(String),

    #[error("invalid channel index: {0}")]
    InvalidIndex(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
}
