//! Camera-side emulator for the Phantom control protocol.
//!
//! - [`MockCamera`]: control server answering `get`, `set`, `startdata`,
//!   `img`, `ximg`, `iload`, `trig`, `rec` and `bye`
//! - [`DiscoveryResponder`]: answers UDP discovery requests
//! - [`AttributeStore`] and [`ImageSource`]: the collaborators a mock camera
//!   is built from, with in-memory and synthetic implementations

mod attributes;
mod discovery;
mod error;
mod image;
mod server;

pub use attributes::{AttributeStore, CameraAttributes};
pub use discovery::{DiscoveryResponder, DiscoveryResponderConfig};
pub use error::EmulatorError;
pub use image::{GradientImage, ImageSource, NoiseImage};
pub use server::{MODE_ATTRIBUTE, MockCamera, MockCameraConfig, RESOLUTION_ATTRIBUTE};
