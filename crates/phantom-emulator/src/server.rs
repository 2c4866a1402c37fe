//! Mock camera control server.
//!
//! Listens on the control port and serves every accepted controller on its
//! own task. Requests are answered from an [`AttributeStore`]; images come
//! from an [`ImageSource`] and leave over the data connection opened by
//! `startdata` (`img`) or as raw Ethernet frames (`ximg`).
//!
//! # Example Usage
//!
//! ```no_run
//! use phantom_emulator::{CameraAttributes, GradientImage, MockCamera, MockCameraConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let camera = MockCamera::bind(
//!     MockCameraConfig::default(),
//!     CameraAttributes::default(),
//!     GradientImage::default(),
//! )
//! .await?;
//!
//! let mut requests = camera.subscribe();
//! tokio::spawn(camera.run());
//!
//! while let Ok(request) = requests.recv().await {
//!     println!("controller sent {request}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::{AttributeStore, EmulatorError, ImageSource};
use futures::{SinkExt, StreamExt};
use phantom_core::{AcquisitionMode, MacAddress, Resolution, constants::*};
use phantom_image::{PixelMatrix, TransferFormat, encode};
use phantom_network::{HeaderLayout, RawFrameSender, RawFrameSenderConfig};
use phantom_protocol::{Command, ControlCodec, DottedName, TaggedList, Value, format_error};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

/// Attribute holding the resolution of served images.
pub const RESOLUTION_ATTRIBUTE: &str = "defc.res";

/// Attribute updated by `iload`.
pub const MODE_ATTRIBUTE: &str = "defc.mode";

const DEFAULT_RESOLUTION: Resolution = Resolution::new(1280, 800);
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Configuration for the mock camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockCameraConfig {
    /// Control address to listen on
    pub bind_addr: SocketAddr,

    /// Interface raw frames are sent from
    pub interface: String,

    /// Ethernet protocol id of raw frames
    pub protocol_id: u16,

    /// Raw frame length including the header
    pub frame_size: usize,

    pub header_layout: HeaderLayout,

    /// Bound on connecting to and writing the data channel
    pub data_timeout: Duration,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], CONTROL_PORT)),
            interface: DEFAULT_INTERFACE.to_string(),
            protocol_id: ETHERNET_PROTOCOL_ID,
            frame_size: DEFAULT_FRAME_SIZE,
            header_layout: HeaderLayout::Padded,
            data_timeout: Duration::from_secs(10),
        }
    }
}

/// State shared by all controller sessions.
struct Shared<A, I> {
    config: MockCameraConfig,
    attributes: Mutex<A>,
    images: Mutex<I>,
    requests: broadcast::Sender<Command>,
}

/// A camera emulator speaking the control protocol.
pub struct MockCamera<A, I> {
    listener: TcpListener,
    shared: Arc<Shared<A, I>>,
}

impl<A: AttributeStore, I: ImageSource> MockCamera<A, I> {
    /// Bind the control listener.
    ///
    /// # Errors
    ///
    /// Returns `EmulatorError::Bind` if the address is in use or not permitted.
    pub async fn bind(config: MockCameraConfig, attributes: A, images: I) -> Result<Self, EmulatorError> {
        info!("Binding mock camera to {}", config.bind_addr);

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| EmulatorError::Bind {
                addr: config.bind_addr.to_string(),
                reason: e.to_string(),
            })?;
        info!(addr = %listener.local_addr()?, "Mock camera listening");

        let (requests, _) = broadcast::channel(REQUEST_CHANNEL_CAPACITY);
        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                config,
                attributes: Mutex::new(attributes),
                images: Mutex::new(images),
                requests,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, EmulatorError> {
        Ok(self.listener.local_addr()?)
    }

    /// Receive every request decoded from any controller from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Command> {
        self.shared.requests.subscribe()
    }

    /// Accept controllers until the listener fails.
    pub async fn run(self) -> Result<(), EmulatorError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            info!(peer = %addr, "Controller connected");

            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }

            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                let mut session = ControlSession::new(stream, addr, shared);
                if let Err(e) = session.run().await {
                    warn!(peer = %addr, "Session ended with error: {}", e);
                }
                info!(peer = %addr, "Controller disconnected");
            });
        }
    }
}

/// One controller connection.
struct ControlSession<A, I> {
    framed: Framed<TcpStream, ControlCodec>,
    peer: SocketAddr,
    /// Data connection opened by `startdata`, consumed by the next `img`
    data: Option<TcpStream>,
    shared: Arc<Shared<A, I>>,
}

impl<A: AttributeStore, I: ImageSource> ControlSession<A, I> {
    fn new(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared<A, I>>) -> Self {
        Self {
            framed: Framed::new(stream, ControlCodec::new()),
            peer,
            data: None,
            shared,
        }
    }

    async fn run(&mut self) -> Result<(), EmulatorError> {
        while let Some(line) = self.framed.next().await {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            debug!(peer = %self.peer, request = %line, "Incoming request");

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    self.reply(&format_error(e)).await?;
                    continue;
                }
            };
            if self.shared.requests.send(command.clone()).is_err() {
                trace!("No request subscribers");
            }

            if !self.dispatch(&command).await? {
                break;
            }
        }
        Ok(())
    }

    /// Handle one request. Returns `false` once the session should end.
    async fn dispatch(&mut self, command: &Command) -> Result<bool, EmulatorError> {
        match command.verb() {
            CMD_GET => self.handle_get(command).await?,
            CMD_SET => self.handle_set(command).await?,
            CMD_STARTDATA => self.handle_startdata(command).await?,
            CMD_IMG => self.handle_img(command).await?,
            CMD_XIMG => self.handle_ximg(command).await?,
            CMD_ILOAD => self.handle_iload(command).await?,
            CMD_TRIG | CMD_REC => self.reply(OK_MARKER).await?,
            CMD_BYE => {
                self.reply(OK_MARKER).await?;
                return Ok(false);
            }
            verb => {
                warn!(peer = %self.peer, verb, "Unknown command");
                self.reply(&format_error(format!("unknown command {verb}")))
                    .await?;
            }
        }
        Ok(true)
    }

    async fn handle_get(&mut self, command: &Command) -> Result<(), EmulatorError> {
        let Some(name) = command.tokens().first() else {
            return self.reply(&format_error("get requires an attribute name")).await;
        };

        let values = self.shared.attributes.lock().await.get(name);
        match values {
            Ok(values) => self.reply(&values.join(RESPONSE_SEPARATOR)).await,
            Err(_) => self.reply(&unknown_attribute(name)).await,
        }
    }

    async fn handle_set(&mut self, command: &Command) -> Result<(), EmulatorError> {
        let [name, value @ ..] = command.tokens() else {
            return self.reply(&format_error("set requires an attribute name")).await;
        };
        if value.is_empty() {
            return self.reply(&format_error(format!("set {name} requires a value"))).await;
        }

        let result = self
            .shared
            .attributes
            .lock()
            .await
            .set(name, vec![value.join(" ")]);
        match result {
            Ok(()) => {
                debug!(name = %name, value = %value.join(" "), "Attribute set");
                self.reply(OK_MARKER).await
            }
            Err(_) => self.reply(&unknown_attribute(name)).await,
        }
    }

    async fn handle_startdata(&mut self, command: &Command) -> Result<(), EmulatorError> {
        let port = param(command, "port")
            .and_then(Value::as_u64)
            .and_then(|port| u16::try_from(port).ok());
        let Some(port) = port else {
            return self
                .reply(&format_error("startdata requires {port: <n>}"))
                .await;
        };

        self.reply(OK_MARKER).await?;

        // The controller listens on the address it connected from.
        let target = SocketAddr::new(self.peer.ip(), port);
        match tokio::time::timeout(self.shared.config.data_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                info!(target_addr = %target, "Data connection established");
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY on data connection: {}", e);
                }
                self.data = Some(stream);
            }
            Ok(Err(e)) => error!(target_addr = %target, "Data connection failed: {}", e),
            Err(_) => error!(target_addr = %target, "Data connection timed out"),
        }
        Ok(())
    }

    async fn handle_img(&mut self, command: &Command) -> Result<(), EmulatorError> {
        let format = param(command, "fmt").map_or(TransferFormat::P16, format_of);
        let count = param(command, "cnt").and_then(Value::as_u64).unwrap_or(1);

        let Some(mut data) = self.data.take() else {
            return self
                .reply(&format_error("no data connection, send startdata first"))
                .await;
        };

        let image = self.grab().await;
        self.reply(&image_reply(image.resolution(), format)).await?;

        let payload = encode(&image, format);
        let timeout = self.shared.config.data_timeout;
        debug!(
            bytes = payload.len(),
            count,
            format = format.token(),
            "Sending image data"
        );
        for _ in 0..count {
            match tokio::time::timeout(timeout, data.write_all(&payload)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(EmulatorError::DataTimeout(timeout.as_millis() as u64)),
            }
        }

        let shutdown_timeout = Duration::from_millis(500);
        match tokio::time::timeout(shutdown_timeout, data.shutdown()).await {
            Ok(Ok(())) => debug!("Data connection closed"),
            Ok(Err(e)) => warn!("Error closing data connection: {}", e),
            Err(_) => warn!(
                "Shutdown timeout on data connection ({}ms)",
                shutdown_timeout.as_millis()
            ),
        }
        Ok(())
    }

    async fn handle_ximg(&mut self, command: &Command) -> Result<(), EmulatorError> {
        let format = param(command, "fmt").map_or(TransferFormat::P10, format_of);
        let count = param(command, "cnt").and_then(Value::as_u64).unwrap_or(1);
        let destination = param(command, "dest")
            .and_then(Value::as_u64)
            .and_then(|dest| MacAddress::from_u64(dest).ok());
        let Some(destination) = destination else {
            return self
                .reply(&format_error("ximg requires a valid dest address"))
                .await;
        };

        let config = &self.shared.config;
        let sender = match RawFrameSender::bind(RawFrameSenderConfig {
            interface: config.interface.clone(),
            destination,
            protocol_id: config.protocol_id,
            frame_size: config.frame_size,
            header_layout: config.header_layout,
        }) {
            Ok(sender) => sender,
            Err(e) => {
                error!("Raw frame sender unavailable: {}", e);
                return self.reply(&format_error(e)).await;
            }
        };

        let image = self.grab().await;
        self.reply(&image_reply(image.resolution(), format)).await?;

        let payload = encode(&image, format);
        for _ in 0..count {
            let frames = sender.send(&payload).await?;
            trace!(frames, "Sent image as raw frames");
        }
        debug!(count, destination = %destination.to_colon_string(), "Raw images sent");
        Ok(())
    }

    async fn handle_iload(&mut self, command: &Command) -> Result<(), EmulatorError> {
        let mode = param(command, "mode")
            .and_then(Value::as_u64)
            .and_then(AcquisitionMode::from_code);
        let Some(mode) = mode else {
            return self.reply(&format_error("iload requires {mode: 0-3}")).await;
        };

        info!(mode = ?mode, "Acquisition mode loaded");
        let result = self
            .shared
            .attributes
            .lock()
            .await
            .set(MODE_ATTRIBUTE, vec![mode.code().to_string()]);
        if let Err(e) = result {
            debug!("Mode not recorded: {}", e);
        }
        self.reply(OK_MARKER).await
    }

    async fn grab(&self) -> PixelMatrix {
        let resolution = self
            .shared
            .attributes
            .lock()
            .await
            .get(RESOLUTION_ATTRIBUTE)
            .ok()
            .and_then(|values| values.join(" ").parse::<Resolution>().ok())
            // 16-bit pixels must stay within what a client accepts.
            .filter(|res| {
                res.checked_pixel_count()
                    .is_some_and(|count| count <= MAX_IMAGE_BYTES / 2)
            })
            .unwrap_or(DEFAULT_RESOLUTION);
        self.shared.images.lock().await.grab(resolution)
    }

    async fn reply(&mut self, text: &str) -> Result<(), EmulatorError> {
        trace!(peer = %self.peer, reply = %text, "Sending reply");
        self.framed.send(text).await?;
        Ok(())
    }
}

fn param<'a>(command: &'a Command, key: &str) -> Option<&'a Value> {
    command.params().and_then(|params| params.get(key))
}

/// Format named by a `fmt` parameter, either by token or by numeric code.
fn format_of(value: &Value) -> TransferFormat {
    match value {
        Value::Name(name) => TransferFormat::parse_or_default(name.as_str()),
        other => other
            .as_i64()
            .and_then(|code| TransferFormat::from_code(code).ok())
            .unwrap_or_default(),
    }
}

fn image_reply(resolution: Resolution, format: TransferFormat) -> String {
    let fmt = match format.code() {
        Some(code) => Value::from(code),
        None => Value::Name(DottedName::from(format.token())),
    };
    let params = TaggedList::new()
        .with("cine", -1i64)
        .with("res", resolution)
        .with("fmt", fmt);
    format!("{OK_MARKER} {params}")
}

fn unknown_attribute(name: &str) -> String {
    format_error(format!("name {name} is unknown"))
}
