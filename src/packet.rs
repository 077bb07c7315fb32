//! AX.25-style packet framing for APRS-IS.
//!
//! APRS-IS carries packets in their text form: `FROM>TO,VIA1,VIA2:DATA`.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::wx::EncodeError;

/// Destination used when a packet does not name one.
pub const DEFAULT_DESTINATION: &str = "APRS";
/// Digipeater path token used when a packet does not name a via path.
pub const DEFAULT_VIA: &str = "TCPIP*";

/// A station identifier: a preformatted callsign string, or a call with an
/// optional SSID suffix distinguishing stations that share one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Callsign {
    /// Used verbatim, e.g. `"N0CALL-13"`.
    Plain(String),
    /// Formatted as `CALL` or `CALL-SSID`.
    Structured { call: String, ssid: Option<u8> },
}

impl Callsign {
    pub fn new<S: Into<String>>(call: S) -> Self {
        Callsign::Plain(call.into())
    }

    pub fn with_ssid<S: Into<String>>(call: S, ssid: u8) -> Self {
        Callsign::Structured {
            call: call.into(),
            ssid: Some(ssid),
        }
    }
}

impl Display for Callsign {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Callsign::Plain(call) => write!(f, "{call}"),
            Callsign::Structured {
                call,
                ssid: Some(ssid),
            } => write!(f, "{call}-{ssid}"),
            Callsign::Structured { call, ssid: None } => write!(f, "{call}"),
        }
    }
}

/// The digipeater path of a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Via {
    /// Used verbatim; an empty string stays an empty path.
    Path(String),
    /// Relay callsigns joined by commas.
    Relays(Vec<Callsign>),
}

impl Display for Via {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Via::Path(path) => write!(f, "{path}"),
            Via::Relays(relays) => {
                for (i, relay) in relays.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{relay}")?;
                }
                Ok(())
            }
        }
    }
}

/// A fully addressed APRS-IS packet.
#[derive(Debug, Clone)]
pub struct Packet {
    pub from: Callsign,
    pub to: Option<Callsign>,
    pub via: Option<Via>,
    pub data: String,
}

impl Packet {
    /// A packet addressed with the default destination and via path.
    pub fn new<S: Into<String>>(from: Callsign, data: S) -> Self {
        Self {
            from,
            to: None,
            via: None,
            data: data.into(),
        }
    }

    /// Render the `FROM>TO,VIA:DATA` line sent to APRS-IS.
    pub fn format(&self) -> Result<String, EncodeError> {
        let from = self.from.to_string();
        if from.is_empty() {
            return Err(EncodeError::EmptyCallsign);
        }
        let to = match &self.to {
            Some(to) => to.to_string(),
            None => DEFAULT_DESTINATION.to_string(),
        };
        let via = match &self.via {
            Some(via) => via.to_string(),
            None => DEFAULT_VIA.to_string(),
        };
        Ok(format!("{from}>{to},{via}:{}", self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callsign_formats_with_and_without_ssid() {
        assert_eq!(Callsign::new("N0CALL").to_string(), "N0CALL");
        assert_eq!(Callsign::with_ssid("N0CALL", 13).to_string(), "N0CALL-13");
        assert_eq!(
            Callsign::Structured {
                call: "N0CALL".to_string(),
                ssid: None,
            }
            .to_string(),
            "N0CALL"
        );
    }

    #[test]
    fn callsign_deserializes_from_string_or_object() {
        let plain: Callsign = serde_json::from_str(r#""N0CALL""#).unwrap();
        assert_eq!(plain, Callsign::new("N0CALL"));

        let structured: Callsign = serde_json::from_str(r#"{"call": "N0CALL", "ssid": 7}"#).unwrap();
        assert_eq!(structured.to_string(), "N0CALL-7");

        let no_ssid: Callsign = serde_json::from_str(r#"{"call": "N0CALL"}"#).unwrap();
        assert_eq!(no_ssid.to_string(), "N0CALL");
    }

    #[test]
    fn packet_defaults_to_aprs_destination_and_tcpip_path() {
        let packet = Packet::new(Callsign::new("N0CALL"), "body");
        assert_eq!(packet.format().unwrap(), "N0CALL>APRS,TCPIP*:body");
    }

    #[test]
    fn explicit_addressing_is_used_verbatim() {
        let packet = Packet {
            from: Callsign::with_ssid("N0CALL", 13),
            to: Some(Callsign::new("APZ001")),
            via: Some(Via::Path("WIDE1-1,WIDE2-1".to_string())),
            data: "body".to_string(),
        };
        assert_eq!(
            packet.format().unwrap(),
            "N0CALL-13>APZ001,WIDE1-1,WIDE2-1:body"
        );
    }

    #[test]
    fn empty_via_string_is_preserved() {
        let packet = Packet {
            via: Some(Via::Path(String::new())),
            ..Packet::new(Callsign::new("N0CALL"), "body")
        };
        assert_eq!(packet.format().unwrap(), "N0CALL>APRS,:body");
    }

    #[test]
    fn via_callsign_list_is_joined_by_commas() {
        let packet = Packet {
            via: Some(Via::Relays(vec![
                Callsign::new("TCPIP*"),
                Callsign::with_ssid("WIDE2", 1),
            ])),
            ..Packet::new(Callsign::new("N0CALL"), "body")
        };
        assert_eq!(packet.format().unwrap(), "N0CALL>APRS,TCPIP*,WIDE2-1:body");
    }

    #[test]
    fn empty_from_callsign_is_rejected() {
        let packet = Packet::new(Callsign::new(""), "body");
        assert_eq!(packet.format().unwrap_err(), EncodeError::EmptyCallsign);
    }
}
