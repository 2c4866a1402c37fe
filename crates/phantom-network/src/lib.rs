//! Network side of the Phantom camera protocol
//!
//! # Components
//!
//! - **CameraClient**: control session over the text protocol, including
//!   image acquisition
//! - **Data channel**: reassembly of image payloads from a TCP stream or from
//!   raw Ethernet frames, plus the raw frame sender used by emulators
//! - **discover**: UDP broadcast discovery of cameras on the local network
//!
//! # Example
//!
//! ```no_run
//! use phantom_network::{CameraClient, CameraClientConfig, DiscoveryConfig, discover};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cameras = discover(&DiscoveryConfig::default()).await?;
//! let Some(camera) = cameras.first() else {
//!     return Ok(());
//! };
//!
//! let mut client = CameraClient::new(CameraClientConfig {
//!     camera_addr: camera.control_addr(),
//!     ..Default::default()
//! });
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod data;
mod discovery;
mod error;
pub mod interface;

pub use client::CameraClient;
pub use config::{CameraClientConfig, DataChannelConfig, DiscoveryConfig};
pub use data::{
    DataChannel, DataReceiver, HeaderLayout, RawFrameReceiver, RawFrameSender,
    RawFrameSenderConfig, StreamReceiver, TransferSession,
};
pub use discovery::discover;
pub use error::{ClientError, TransferError};
