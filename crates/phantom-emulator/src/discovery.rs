//! Answers discovery broadcasts on behalf of the mock camera.

use crate::EmulatorError;
use phantom_core::constants::{CONTROL_PORT, DISCOVERY_MARKER, DISCOVERY_PORT};
use phantom_protocol::{CameraInfo, discovery::is_discovery_request};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

/// Configuration for [`DiscoveryResponder`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResponderConfig {
    /// Address requests arrive on
    pub bind_addr: SocketAddr,

    /// Control port announced to controllers
    pub control_port: u16,

    pub hardware_version: String,

    pub serial: String,
}

impl Default for DiscoveryResponderConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DISCOVERY_PORT)),
            control_port: CONTROL_PORT,
            hardware_version: "1200".to_string(),
            serial: "146299363572937".to_string(),
        }
    }
}

/// Replies `PH16 <port> <hwver> <serial>` to every `phantom?` datagram.
pub struct DiscoveryResponder {
    socket: UdpSocket,
    announcement: Vec<u8>,
}

impl DiscoveryResponder {
    /// # Errors
    /// Returns `EmulatorError::Bind` if the discovery port cannot be bound.
    pub async fn bind(config: DiscoveryResponderConfig) -> Result<Self, EmulatorError> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|e| EmulatorError::Bind {
                addr: config.bind_addr.to_string(),
                reason: e.to_string(),
            })?;

        let announcement = CameraInfo {
            protocol: DISCOVERY_MARKER.to_string(),
            ip: config.bind_addr.ip(),
            port: config.control_port,
            hardware_version: config.hardware_version,
            serial: config.serial,
        }
        .to_payload();

        info!(addr = %socket.local_addr()?, "Discovery responder listening");
        Ok(Self {
            socket,
            announcement,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, EmulatorError> {
        Ok(self.socket.local_addr()?)
    }

    /// Answer requests until the socket fails.
    pub async fn run(self) -> Result<(), EmulatorError> {
        let mut buf = [0u8; 512];
        loop {
            let (len, sender) = self.socket.recv_from(&mut buf).await?;
            if !is_discovery_request(&buf[..len]) {
                trace!(sender = %sender, len, "Ignoring datagram");
                continue;
            }
            debug!(sender = %sender, "Answering discovery request");
            self.socket.send_to(&self.announcement, sender).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_answers_request_only() {
        let responder = DiscoveryResponder::bind(DiscoveryResponderConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            serial: "777".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        let addr = responder.local_addr().unwrap();
        tokio::spawn(responder.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"hello?", addr).await.unwrap();
        client.send_to(b"phantom?", addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"PH16 7115 1200 777");
    }
}
