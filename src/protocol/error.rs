//! Protocol error types.

use super::RequestType;
use thiserror::Error;

/// Errors decoding a meta-protocol line.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bogus data: request does not start with a number")]
    BogusData,

    #[error("unknown request number: {0}")]
    UnknownRequest(i32),

    #[error("{request}: expected {expected} fields, got {got}")]
    MissingFields {
        request: RequestType,
        expected: usize,
        got: usize,
    },

    #[error("{request}: invalid {field}: {value:?}")]
    InvalidField {
        request: RequestType,
        field: &'static str,
        value: String,
    },

    #[error("{request}: field {field} too long: max {max}, got {got}")]
    FieldTooLong {
        request: RequestType,
        field: &'static str,
        max: usize,
        got: usize,
    },

    #[error("packet too long: max {max}, got {got}")]
    PacketTooLong { max: usize, got: usize },
}
