//! Opaque tunnel packets carried over the TCP fallback channel.

use super::ProtocolError;

/// Largest payload the PACKET header can describe.
pub const MAX_PACKET_LEN: usize = u16::MAX as usize;

/// A tunnel-layer packet. Its contents are never inspected here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VpnPacket {
    data: Vec<u8>,
}

impl VpnPacket {
    /// Wrap packet bytes, rejecting payloads the header cannot frame.
    pub fn new(data: Vec<u8>) -> Result<Self, ProtocolError> {
        if data.len() > MAX_PACKET_LEN {
            return Err(ProtocolError::PacketTooLong {
                max: MAX_PACKET_LEN,
                got: data.len(),
            });
        }
        Ok(Self { data })
    }

    /// Payload length as carried in the PACKET header.
    pub fn len(&self) -> u16 {
        // Bounded in new()
        self.data.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_length_limit() {
        assert_eq!(VpnPacket::new(vec![0; MAX_PACKET_LEN]).unwrap().len(), u16::MAX);
        assert!(matches!(
            VpnPacket::new(vec![0; MAX_PACKET_LEN + 1]),
            Err(ProtocolError::PacketTooLong { got, .. }) if got == MAX_PACKET_LEN + 1
        ));
    }

    #[test]
    fn test_empty_packet() {
        let packet = VpnPacket::new(Vec::new()).unwrap();
        assert!(packet.is_empty());
        assert_eq!(packet.len(), 0);
    }
}
