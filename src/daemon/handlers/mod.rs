//! Meta-protocol request handlers.

mod control;
mod dispatch;
mod tcp_packet;
mod timeout;
mod udp_info;

pub use tcp_packet::red_drop_probability;
pub use udp_info::{UdpInfoRoute, UdpInfoSkip};
