//! Typed meta-protocol messages.
//!
//! Every message is a single ASCII line: the request number followed by
//! space-separated positional fields. Decoders receive the remainder of
//! the line after the request number (see [`split_request`]) and check
//! arity before parsing any field. Tokens beyond a message's arity are
//! ignored.
//!
//! [`split_request`]: super::split_request

use super::{ProtocolError, RequestType};
use std::str::{FromStr, SplitWhitespace};

/// Maximum length of a single string field.
pub const MAX_STRING_SIZE: usize = 2048;

/// Positional field reader with up-front arity checking.
struct Fields<'a> {
    request: RequestType,
    tokens: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(request: RequestType, args: &'a str, expected: usize) -> Result<Self, ProtocolError> {
        let got = args.split_whitespace().count();
        if got < expected {
            return Err(ProtocolError::MissingFields {
                request,
                expected,
                got,
            });
        }
        Ok(Self {
            request,
            tokens: args.split_whitespace(),
        })
    }

    fn token(&mut self, field: &'static str) -> Result<&'a str, ProtocolError> {
        // Arity was checked in new()
        self.tokens.next().ok_or(ProtocolError::InvalidField {
            request: self.request,
            field,
            value: String::new(),
        })
    }

    fn string(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let token = self.token(field)?;
        if token.len() > MAX_STRING_SIZE {
            return Err(ProtocolError::FieldTooLong {
                request: self.request,
                field,
                max: MAX_STRING_SIZE,
                got: token.len(),
            });
        }
        Ok(token.to_string())
    }

    fn number<T: FromStr>(&mut self, field: &'static str) -> Result<T, ProtocolError> {
        let token = self.token(field)?;
        token.parse().map_err(|_| ProtocolError::InvalidField {
            request: self.request,
            field,
            value: token.chars().take(32).collect(),
        })
    }
}

/// Encode a request that carries no fields (TERMREQ, PING, PONG).
pub fn encode_bare(request: RequestType) -> String {
    request.to_number().to_string()
}

/// STATUS: informational code and a single-token text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub code: i32,
    pub text: String,
}

impl StatusReport {
    /// Default text used when the sender has nothing to say.
    pub const DEFAULT_TEXT: &'static str = "Status";

    pub fn new(code: i32, text: Option<&str>) -> Self {
        Self {
            code,
            text: text.unwrap_or(Self::DEFAULT_TEXT).to_string(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{} {} {}", RequestType::Status.to_number(), self.code, self.text)
    }

    pub fn decode(args: &str) -> Result<Self, ProtocolError> {
        let mut fields = Fields::new(RequestType::Status, args, 2)?;
        Ok(Self {
            code: fields.number("code")?,
            text: fields.string("text")?,
        })
    }
}

/// ERROR: peer-reported failure code and a single-token text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: i32,
    pub text: String,
}

impl ErrorReport {
    /// Default text used when the sender gives none.
    pub const DEFAULT_TEXT: &'static str = "Error";

    pub fn new(code: i32, text: Option<&str>) -> Self {
        Self {
            code,
            text: text.unwrap_or(Self::DEFAULT_TEXT).to_string(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{} {} {}", RequestType::Error.to_number(), self.code, self.text)
    }

    pub fn decode(args: &str) -> Result<Self, ProtocolError> {
        let mut fields = Fields::new(RequestType::Error, args, 2)?;
        Ok(Self {
            code: fields.number("code")?,
            text: fields.string("text")?,
        })
    }
}

/// PACKET: announces that `len` raw bytes follow the line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub len: u16,
}

impl PacketHeader {
    pub fn encode(&self) -> String {
        format!("{} {}", RequestType::Packet.to_number(), self.len)
    }

    pub fn decode(args: &str) -> Result<Self, ProtocolError> {
        let mut fields = Fields::new(RequestType::Packet, args, 1)?;
        Ok(Self {
            len: fields.number("len")?,
        })
    }
}

/// UDP_INFO: relayed hint that `from` may be reachable at `address:port`.
///
/// Names are carried unchecked here; identifier validation belongs to
/// the handler so that it can be logged against the sending peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpInfo {
    pub from: String,
    pub to: String,
    pub address: String,
    pub port: String,
}

impl UdpInfo {
    pub fn encode(&self) -> String {
        format!(
            "{} {} {} {} {}",
            RequestType::UdpInfo.to_number(),
            self.from,
            self.to,
            self.address,
            self.port
        )
    }

    pub fn decode(args: &str) -> Result<Self, ProtocolError> {
        let mut fields = Fields::new(RequestType::UdpInfo, args, 4)?;
        Ok(Self {
            from: fields.string("from")?,
            to: fields.string("to")?,
            address: fields.string("address")?,
            port: fields.string("port")?,
        })
    }
}
