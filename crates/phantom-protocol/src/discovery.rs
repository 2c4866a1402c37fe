//! Discovery wire format.
//!
//! A controller broadcasts the ASCII request `phantom?`; every camera answers
//! with one datagram of space-separated fields:
//!
//! ```text
//! PH16 <port> <hwver> <serial>
//! ```
//!
//! The camera's IP address is the datagram's source address.

use phantom_core::{
    Error, Result,
    constants::{DISCOVERY_MARKER, DISCOVERY_REQUEST},
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// A camera that answered a discovery request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraInfo {
    /// Protocol marker the camera reported (`PH16`).
    pub protocol: String,
    pub ip: IpAddr,
    /// Control port the camera listens on.
    pub port: u16,
    pub hardware_version: String,
    pub serial: String,
}

impl CameraInfo {
    /// Address of the camera's control connection.
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Parse the datagram `payload` received from `sender`.
    ///
    /// ```
    /// use phantom_protocol::CameraInfo;
    ///
    /// let sender = "192.168.0.42:7380".parse().unwrap();
    /// let info = CameraInfo::parse(b"PH16 7115 1200 12345", sender).unwrap();
    /// assert_eq!(info.port, 7115);
    /// assert_eq!(info.serial, "12345");
    /// assert_eq!(info.control_addr().to_string(), "192.168.0.42:7115");
    /// ```
    ///
    /// # Errors
    /// - `Error::InvalidEncoding` if the payload is not UTF-8
    /// - `Error::InvalidResponse` if the marker is missing or fields are malformed
    pub fn parse(payload: &[u8], sender: SocketAddr) -> Result<Self> {
        let text = std::str::from_utf8(payload).map_err(|_| Error::InvalidEncoding)?;
        let start = text
            .find(DISCOVERY_MARKER)
            .ok_or_else(|| Error::InvalidResponse(format!("missing discovery marker: {text}")))?;

        let fields: Vec<&str> = text[start..].split_whitespace().collect();
        let [protocol, port, hardware_version, serial, ..] = fields.as_slice() else {
            return Err(Error::InvalidResponse(format!(
                "expected 4 discovery fields, got {}: {text}",
                fields.len()
            )));
        };

        let port = port
            .parse()
            .map_err(|_| Error::InvalidResponse(format!("invalid discovery port: {port}")))?;

        Ok(Self {
            protocol: (*protocol).to_string(),
            ip: sender.ip(),
            port,
            hardware_version: (*hardware_version).to_string(),
            serial: (*serial).to_string(),
        })
    }

    /// Datagram payload a camera sends to announce itself.
    pub fn to_payload(&self) -> Vec<u8> {
        format!(
            "{} {} {} {}",
            self.protocol, self.port, self.hardware_version, self.serial
        )
        .into_bytes()
    }
}

/// `true` if `payload` is a discovery request.
pub fn is_discovery_request(payload: &[u8]) -> bool {
    payload.trim_ascii() == DISCOVERY_REQUEST
}

/// `true` if `payload` carries the discovery marker.
pub fn is_discovery_response(payload: &[u8]) -> bool {
    std::str::from_utf8(payload).is_ok_and(|text| text.contains(DISCOVERY_MARKER))
}
