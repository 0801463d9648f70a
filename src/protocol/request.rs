//! Meta-protocol request numbers.

use super::ProtocolError;
use std::fmt;

/// Request identifiers carried as the first token of every meta line.
///
/// The numbering is shared with the rest of the daemon's meta-protocol
/// (authentication, subnet and edge gossip), so the gaps are intentional:
/// only the requests handled by this layer are listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RequestType {
    /// Informational status report.
    Status = 5,
    /// Peer-reported error; always ends the session.
    Error = 6,
    /// Orderly close request.
    TermReq = 7,
    /// Liveness probe.
    Ping = 8,
    /// Liveness probe answer.
    Pong = 9,
    /// TCP fallback packet header; raw bytes follow out of band.
    Packet = 17,
    /// Relayed UDP address hint.
    UdpInfo = 22,
}

impl RequestType {
    /// Try to convert from a request number.
    pub fn from_number(n: i32) -> Option<Self> {
        match n {
            5 => Some(RequestType::Status),
            6 => Some(RequestType::Error),
            7 => Some(RequestType::TermReq),
            8 => Some(RequestType::Ping),
            9 => Some(RequestType::Pong),
            17 => Some(RequestType::Packet),
            22 => Some(RequestType::UdpInfo),
            _ => None,
        }
    }

    /// Convert to a request number.
    pub fn to_number(self) -> i32 {
        self as i32
    }

    /// Wire name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            RequestType::Status => "STATUS",
            RequestType::Error => "ERROR",
            RequestType::TermReq => "TERMREQ",
            RequestType::Ping => "PING",
            RequestType::Pong => "PONG",
            RequestType::Packet => "PACKET",
            RequestType::UdpInfo => "UDP_INFO",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Split a received line into its request type and argument remainder.
///
/// The remainder excludes the request number and any separating
/// whitespace; message decoders work on it directly.
pub fn split_request(line: &str) -> Result<(RequestType, &str), ProtocolError> {
    let trimmed = line.trim_start();
    let (head, rest) = match trimmed.find(char::is_whitespace) {
        Some(pos) => (&trimmed[..pos], &trimmed[pos..]),
        None => (trimmed, ""),
    };

    let number: i32 = head.parse().map_err(|_| ProtocolError::BogusData)?;
    let request = RequestType::from_number(number).ok_or(ProtocolError::UnknownRequest(number))?;

    Ok((request, rest.trim_start()))
}
