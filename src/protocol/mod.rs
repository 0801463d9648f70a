//! Meta-Protocol Messages
//!
//! Line-oriented control messages exchanged between directly connected
//! peers once the authenticated transport is up. Each line starts with a
//! decimal request number followed by positional fields.
//!
//! ## Messages handled here
//!
//! | Request  | Number | Fields                         |
//! |----------|--------|--------------------------------|
//! | STATUS   | 5      | code, text                     |
//! | ERROR    | 6      | code, text                     |
//! | TERMREQ  | 7      |                                |
//! | PING     | 8      |                                |
//! | PONG     | 9      |                                |
//! | PACKET   | 17     | len (raw bytes follow)         |
//! | UDP_INFO | 22     | from, to, address, port        |
//!
//! PACKET is the only message whose payload is not part of the line: the
//! `len` bytes that follow it are read raw by the connection reader.

mod error;
mod message;
mod packet;
mod request;

pub use error::ProtocolError;
pub use message::{
    encode_bare, ErrorReport, PacketHeader, StatusReport, UdpInfo, MAX_STRING_SIZE,
};
pub use packet::{VpnPacket, MAX_PACKET_LEN};
pub use request::{split_request, RequestType};

/// Minimum peer protocol minor version that understands UDP_INFO.
pub const UDP_INFO_MIN_VERSION: u8 = 5;

/// Upper bound on a buffered request line before it is rejected.
pub const MAX_REQUEST_LEN: usize = MAX_STRING_SIZE * 4 + 64;
