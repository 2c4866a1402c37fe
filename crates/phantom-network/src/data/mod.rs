//! Data reassembly engine.
//!
//! Images do not travel over the control connection. After an image request
//! the camera delivers the payload on a secondary channel, which a
//! [`DataReceiver`] turns back into one buffer of the declared size:
//!
//! - [`StreamReceiver`]: a TCP listener the camera connects back to
//!   (regular Ethernet). Short transfers within a tolerance are zero-padded.
//! - [`RawFrameReceiver`]: raw Ethernet frames on a named interface
//!   (10G). Frames are filtered by protocol id and truncated to size.
//!
//! [`RawFrameSender`] is the camera-side counterpart of the raw backend.
//!
//! # Lifecycle
//!
//! ```text
//! start() -> set_expected_size(n) -> await_complete() -> ... -> stop()
//! ```
//!
//! `await_complete` has no timeout of its own; callers wrap it in
//! `tokio::time::timeout` when they need a bounded wait.
//!
//! Every `set_expected_size` opens a new transfer with its own id. Results
//! of older transfers that finish late (after the caller gave up on them)
//! are discarded instead of being handed to the next `await_complete`.

mod frame;
mod raw;
mod session;
mod stream;

pub use frame::{EthernetFrame, FrameAssembler, HeaderLayout, build_frames, build_header};
pub use raw::{RawFrameReceiver, RawFrameSender, RawFrameSenderConfig};
pub use session::TransferSession;
pub use stream::StreamReceiver;

use crate::{DataChannelConfig, TransferError};
use phantom_core::NetworkType;
use std::future::Future;

/// Declared size of one transfer, tagged with its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expected {
    pub(crate) id: u64,
    pub(crate) size: usize,
}

/// Outcome of a transfer. `None` marks a backend failure not tied to any
/// single transfer.
pub(crate) type Completion = (Option<u64>, Result<Vec<u8>, TransferError>);

/// Id bookkeeping shared by the backends.
#[derive(Debug, Default)]
pub(crate) struct TransferIds {
    next: u64,
    current: Option<u64>,
}

impl TransferIds {
    /// Open a new transfer of `size` bytes.
    pub(crate) fn open(&mut self, size: usize) -> Expected {
        self.next += 1;
        self.current = Some(self.next);
        Expected {
            id: self.next,
            size,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.current = None;
    }

    /// Whether a completion tagged `id` belongs to the open transfer.
    pub(crate) fn is_current(&self, id: Option<u64>) -> bool {
        id.is_none() || id == self.current
    }
}

/// Common contract of the reassembly backends.
///
/// Uses native async fn in traits, so the trait is not object-safe; use
/// [`DataChannel`] to choose a backend at runtime.
pub trait DataReceiver {
    /// Declare the byte count of the next transfer. Any transfer still in
    /// flight is abandoned.
    fn set_expected_size(&mut self, size: usize);

    /// Start listening. A running stream receiver keeps its listener; the raw
    /// receiver always reopens its socket for a fresh transfer.
    fn start(&mut self) -> impl Future<Output = Result<(), TransferError>> + Send;

    /// Wait for the current transfer and hand over its bytes.
    fn await_complete(&mut self) -> impl Future<Output = Result<Vec<u8>, TransferError>> + Send;

    /// Stop listening and release the socket.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Backend selected by network type.
#[derive(Debug)]
pub enum DataChannel {
    Stream(StreamReceiver),
    Raw(RawFrameReceiver),
}

impl DataChannel {
    pub fn new(network_type: NetworkType, config: &DataChannelConfig) -> Self {
        match network_type {
            NetworkType::Ethernet => DataChannel::Stream(StreamReceiver::new(config)),
            NetworkType::TenGigabit => DataChannel::Raw(RawFrameReceiver::new(config)),
        }
    }

    /// Port the camera must connect back to, for the stream backend.
    pub fn local_port(&self) -> Option<u16> {
        match self {
            DataChannel::Stream(receiver) => receiver.local_addr().map(|addr| addr.port()),
            DataChannel::Raw(_) => None,
        }
    }
}

impl DataReceiver for DataChannel {
    fn set_expected_size(&mut self, size: usize) {
        match self {
            DataChannel::Stream(receiver) => receiver.set_expected_size(size),
            DataChannel::Raw(receiver) => receiver.set_expected_size(size),
        }
    }

    async fn start(&mut self) -> Result<(), TransferError> {
        match self {
            DataChannel::Stream(receiver) => receiver.start().await,
            DataChannel::Raw(receiver) => receiver.start().await,
        }
    }

    async fn await_complete(&mut self) -> Result<Vec<u8>, TransferError> {
        match self {
            DataChannel::Stream(receiver) => receiver.await_complete().await,
            DataChannel::Raw(receiver) => receiver.await_complete().await,
        }
    }

    fn stop(&mut self) {
        match self {
            DataChannel::Stream(receiver) => receiver.stop(),
            DataChannel::Raw(receiver) => receiver.stop(),
        }
    }

    fn is_running(&self) -> bool {
        match self {
            DataChannel::Stream(receiver) => receiver.is_running(),
            DataChannel::Raw(receiver) => receiver.is_running(),
        }
    }
}
