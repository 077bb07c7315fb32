//! CWOP weather telemetry transmitter.
//!
//! This library encodes weather-station observations into the APRS WX report
//! format and transmits them to a CWOP (APRS-IS) ingestion server over the
//! text line protocol. Each transmission opens one connection, performs the
//! login handshake, writes one packet, and closes, all under a single
//! deadline.

pub mod cwop_client;
pub mod packet;
pub mod position;
pub mod wx;

pub use cwop_client::{CLIENT_ID, CwopClient, CwopClientConfig, CwopClientConfigBuilder, SendError};
pub use packet::{Callsign, Packet, Via};
pub use position::format_position;
pub use wx::{EncodeError, Extension, Observation, SendRequest, Weather, format_wx_report};
