use crate::data::HeaderLayout;
use phantom_core::{NetworkType, constants::*};
use phantom_image::TransferFormat;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the camera control session
///
/// # Example
///
/// ```
/// use phantom_network::CameraClientConfig;
/// use phantom_core::NetworkType;
/// use std::time::Duration;
///
/// let config = CameraClientConfig {
///     camera_addr: "192.168.0.42:7115".parse().unwrap(),
///     timeout: Duration::from_secs(5),
///     network_type: NetworkType::Ethernet,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraClientConfig {
    /// Camera control address
    pub camera_addr: SocketAddr,

    /// Timeout for connect and for every control read and write
    pub timeout: Duration,

    /// Which data path images travel on
    pub network_type: NetworkType,

    /// Format requested for images on the Ethernet path
    pub transfer_format: TransferFormat,

    /// Data channel settings
    pub data: DataChannelConfig,
}

impl CameraClientConfig {
    /// Format actually requested: the 10G path always transfers P10.
    pub fn effective_format(&self) -> TransferFormat {
        match self.network_type {
            NetworkType::Ethernet => self.transfer_format,
            NetworkType::TenGigabit => TransferFormat::P10,
        }
    }
}

impl Default for CameraClientConfig {
    fn default() -> Self {
        Self {
            camera_addr: SocketAddr::from(([127, 0, 0, 1], CONTROL_PORT)),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            network_type: NetworkType::Ethernet,
            transfer_format: TransferFormat::P16,
            data: DataChannelConfig::default(),
        }
    }
}

/// Configuration for the data reassembly backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataChannelConfig {
    /// Local address the stream backend listens on; port 0 picks a free port
    pub bind_addr: SocketAddr,

    /// Network interface the raw frame backend binds to
    pub interface: String,

    /// Ethernet protocol id of image frames
    pub protocol_id: u16,

    /// Header layout of image frames
    pub header_layout: HeaderLayout,

    /// Bytes a stream transfer may end short and still be accepted
    pub stream_tolerance: usize,
}

impl Default for DataChannelConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_DATA_PORT)),
            interface: DEFAULT_INTERFACE.to_string(),
            protocol_id: ETHERNET_PROTOCOL_ID,
            header_layout: HeaderLayout::Padded,
            stream_tolerance: STREAM_TOLERANCE,
        }
    }
}

/// Configuration for a discovery round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Local address the discovery socket binds to
    pub bind_addr: SocketAddr,

    /// Where the request is sent
    pub broadcast_addr: SocketAddr,

    /// How long to collect responses
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DISCOVERY_PORT)),
            broadcast_addr: SocketAddr::from(([255, 255, 255, 255], DISCOVERY_PORT)),
            timeout: Duration::from_millis(DISCOVERY_TIMEOUT_MS),
        }
    }
}
