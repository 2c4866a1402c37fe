//! Control session with a Phantom camera.
//!
//! Commands travel as CRLF-terminated text lines over one TCP connection,
//! framed by [`ControlCodec`]. Every command is answered by exactly one
//! response line and commands are never pipelined: each call sends, then
//! waits for its reply.
//!
//! # Architecture
//!
//! ```text
//! CameraClient ───(TCP :7115, text)───> camera
//!     │                                   │
//!     └─> DataChannel <──(TCP or raw)─────┘  image payloads
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use phantom_network::{CameraClient, CameraClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CameraClientConfig {
//!     camera_addr: "100.100.189.164:7115".parse()?,
//!     ..Default::default()
//! };
//!
//! let mut client = CameraClient::new(config);
//! client.connect().await?;
//!
//! let name = client.get("info.name").await?;
//! println!("Connected to {}", name.join(" "));
//!
//! client.start_data_channel().await?;
//! let image = client.acquire_image().await?;
//! println!("Got {}x{} image", image.width(), image.height());
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Timeout Handling
//!
//! The configured timeout bounds connect and every single read or write,
//! including the wait for image data. A timeout surfaces as an error; nothing
//! is retried. After an image timeout the data channel is restarted, so a
//! late payload of the abandoned image never reaches the next request.

use crate::data::{DataChannel, DataReceiver};
use crate::{CameraClientConfig, ClientError, interface};
use futures::{SinkExt, StreamExt};
use phantom_core::{AcquisitionMode, Error, MacAddress, NetworkType, Resolution, constants::*};
use phantom_image::{PixelMatrix, TransferFormat};
use phantom_protocol::{
    Command, ControlCodec, DottedName, TaggedList, Value, is_ack, parse_response,
    parse_response_params, strip_marker,
};
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

/// Client side of the camera control protocol
///
/// # Connection Lifecycle
///
/// 1. Create client with `new()`
/// 2. Connect with `connect()`
/// 3. Exchange commands (`get`, `set`, `trigger`, ...)
/// 4. Optionally `start_data_channel()` and `acquire_image()`
/// 5. `disconnect()`
pub struct CameraClient {
    config: CameraClientConfig,

    /// Framed control stream (None if not connected)
    framed: Option<Framed<TcpStream, ControlCodec>>,

    /// Image reassembly backend (None until started)
    data: Option<DataChannel>,
}

impl CameraClient {
    /// Create a client. It is not connected after creation.
    ///
    /// ```
    /// use phantom_network::{CameraClient, CameraClientConfig};
    ///
    /// let client = CameraClient::new(CameraClientConfig::default());
    /// assert!(!client.is_connected());
    /// ```
    pub fn new(config: CameraClientConfig) -> Self {
        debug!("Creating camera client for {}", config.camera_addr);

        Self {
            config,
            framed: None,
            data: None,
        }
    }

    pub fn config(&self) -> &CameraClientConfig {
        &self.config
    }

    /// Open the control connection.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Connection` naming the camera address if the
    /// connection times out or is refused.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let target = self.config.camera_addr;
        info!(addr = %target, "Connecting to camera");

        let stream = match tokio::time::timeout(self.config.timeout, TcpStream::connect(target))
            .await
        {
            Ok(Ok(stream)) => {
                info!(addr = %target, "Connected to camera");
                stream
            }
            Ok(Err(e)) => {
                error!("Connection to {} failed: {}", target, e);
                return Err(ClientError::Connection {
                    target: target.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!("Connection timeout after {}ms", self.timeout_ms());
                return Err(ClientError::Connection {
                    target: target.to_string(),
                    reason: format!("timed out after {}ms", self.timeout_ms()),
                });
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(Framed::new(stream, ControlCodec::new()));
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Write one command line. No retry.
    pub async fn send(&mut self, command: &Command) -> Result<(), ClientError> {
        let timeout = self.config.timeout;
        let framed = self.framed.as_mut().ok_or(ClientError::NotConnected)?;
        debug!(command = %command, "Sending command");

        match tokio::time::timeout(timeout, framed.send(command)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Failed to send command: {}", e);
                Err(e.into())
            }
            Err(_) => {
                warn!("Send timeout after {}ms", timeout.as_millis());
                Err(ClientError::WriteTimeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Read one response line, without its CRLF.
    pub async fn receive_line(&mut self) -> Result<String, ClientError> {
        let timeout = self.config.timeout;
        let framed = self.framed.as_mut().ok_or(ClientError::NotConnected)?;

        match tokio::time::timeout(timeout, framed.next()).await {
            Ok(Some(Ok(line))) => {
                trace!(line = %line, "Received response line");
                Ok(line)
            }
            Ok(Some(Err(e))) => {
                error!("Failed to decode response: {}", e);
                Err(e.into())
            }
            Ok(None) => {
                warn!("Connection closed by camera");
                Err(ClientError::ConnectionLost(
                    "Camera closed connection".to_string(),
                ))
            }
            Err(_) => {
                warn!("Receive timeout after {}ms", timeout.as_millis());
                Err(ClientError::ReadTimeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Accumulate received text until `terminator` appears and return what
    /// precedes it.
    ///
    /// There is no bound on the number of lines read; each read is bounded by
    /// the configured timeout only.
    pub async fn receive_until(&mut self, terminator: &str) -> Result<String, ClientError> {
        let mut text = String::new();
        loop {
            let line = self.receive_line().await?;
            text.push_str(&line);
            text.push_str(LINE_TERMINATOR);
            if let Some(end) = text.find(terminator) {
                text.truncate(end);
                return Ok(text);
            }
        }
    }

    /// Send `command` and return its raw response line.
    pub async fn request(&mut self, command: &Command) -> Result<String, ClientError> {
        self.send(command).await?;
        let reply = self.receive_until(LINE_TERMINATOR).await?;
        debug!(verb = command.verb(), reply = %reply, "Command answered");
        Ok(reply)
    }

    /// `get <name>`: the response split into its lines.
    ///
    /// # Errors
    /// `ClientError::Protocol(Error::Command)` if the camera does not know `name`.
    pub async fn get(&mut self, name: &str) -> Result<Vec<String>, ClientError> {
        let reply = self.request(&Command::get(name)).await?;
        Ok(parse_response(&reply)?)
    }

    /// `get` for each name in turn.
    pub async fn get_all<S: AsRef<str>>(
        &mut self,
        names: &[S],
    ) -> Result<Vec<(String, Vec<String>)>, ClientError> {
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            values.push((name.to_string(), self.get(name).await?));
        }
        Ok(values)
    }

    /// `set <name> <value>`
    pub async fn set(&mut self, name: &str, value: impl fmt::Display) -> Result<(), ClientError> {
        let reply = self.request(&Command::set(name, value)).await?;
        strip_marker(&reply)?;
        Ok(())
    }

    /// `iload {mode: n}`
    pub async fn set_mode(&mut self, mode: AcquisitionMode) -> Result<(), ClientError> {
        let reply = self.request(&Command::iload(mode)).await?;
        strip_marker(&reply)?;
        Ok(())
    }

    /// `trig`
    pub async fn trigger(&mut self) -> Result<(), ClientError> {
        let reply = self.request(&Command::trig()).await?;
        strip_marker(&reply)?;
        Ok(())
    }

    /// `rec`
    pub async fn record(&mut self) -> Result<(), ClientError> {
        let reply = self.request(&Command::rec()).await?;
        strip_marker(&reply)?;
        Ok(())
    }

    /// Start the image reassembly backend for the configured network type.
    ///
    /// Returns the port the camera must connect back to on the Ethernet path.
    pub async fn start_data_channel(&mut self) -> Result<Option<u16>, ClientError> {
        let channel = self
            .data
            .get_or_insert_with(|| DataChannel::new(self.config.network_type, &self.config.data));
        channel.start().await?;
        Ok(channel.local_port())
    }

    /// Stop the reassembly backend, if any.
    pub fn stop_data_channel(&mut self) {
        if let Some(mut channel) = self.data.take() {
            channel.stop();
        }
    }

    /// `startdata {port: N}`, awaiting a bare `OK!`.
    pub async fn startdata(&mut self, port: u16) -> Result<(), ClientError> {
        let reply = self.request(&Command::startdata(port)).await?;
        if is_ack(&reply) {
            return Ok(());
        }
        strip_marker(&reply)?;
        Err(Error::InvalidResponse(reply).into())
    }

    /// Acquire one live image.
    ///
    /// On Ethernet the camera is first told where to connect (`startdata`),
    /// then asked for the image with `img`. On 10G the image is requested with
    /// `ximg` and arrives as raw frames addressed to the local interface.
    ///
    /// # Errors
    /// `ClientError::DataChannelNotStarted` if `start_data_channel` was not
    /// called first; `ClientError::ReadTimeout` if the image does not arrive in
    /// time.
    pub async fn acquire_image(&mut self) -> Result<PixelMatrix, ClientError> {
        if self.data.is_none() {
            return Err(ClientError::DataChannelNotStarted);
        }
        let requested = self.config.effective_format();

        let command = match self.config.network_type {
            NetworkType::Ethernet => {
                let port = self
                    .data
                    .as_ref()
                    .filter(|channel| channel.is_running())
                    .and_then(DataChannel::local_port)
                    .ok_or(ClientError::DataChannelNotStarted)?;
                self.startdata(port).await?;
                Command::with_params(CMD_IMG, image_request(requested))
            }
            NetworkType::TenGigabit => {
                // The raw backend serves one image per start.
                self.start_data_channel().await?;
                let destination = interface::mac_address(&self.config.data.interface)?;
                Command::with_params(CMD_XIMG, raw_image_request(requested, destination))
            }
        };

        let reply = self.request(&command).await?;
        let params = parse_response_params(&reply)?;
        let (resolution, format, expected) = image_header(&params, requested)?;
        info!(
            resolution = %resolution,
            format = format.token(),
            expected,
            "Awaiting image data"
        );

        let timeout = self.config.timeout;
        let channel = self
            .data
            .as_mut()
            .ok_or(ClientError::DataChannelNotStarted)?;
        channel.set_expected_size(expected);

        let bytes = match tokio::time::timeout(timeout, channel.await_complete()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Image data timeout after {}ms", timeout.as_millis());
                // Drop whatever the late transfer still delivers.
                channel.stop();
                if let Err(e) = channel.start().await {
                    warn!("Failed to restart data channel: {}", e);
                }
                return Err(ClientError::ReadTimeout(timeout.as_millis() as u64));
            }
        };

        Ok(phantom_image::decode(&bytes, resolution, format)?)
    }

    /// Say `bye`, close the connection and stop the data channel.
    ///
    /// The `bye` is best-effort. Flush and shutdown are bounded by 500ms each.
    /// Calling `disconnect` when not connected is a no-op.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        if let Some(framed) = self.framed.as_mut() {
            let bye = Command::bye();
            match tokio::time::timeout(self.config.timeout, framed.send(&bye)).await {
                Ok(Ok(())) => debug!("Sent bye"),
                Ok(Err(e)) => warn!("Failed to send bye: {}", e),
                Err(_) => warn!("Timeout sending bye"),
            }
        }

        if let Some(mut framed) = self.framed.take() {
            info!(addr = %self.config.camera_addr, "Closing connection to camera");

            let flush_timeout = Duration::from_millis(500);
            match tokio::time::timeout(flush_timeout, SinkExt::<&Command>::flush(&mut framed)).await
            {
                Ok(Ok(())) => debug!("Flush completed successfully"),
                Ok(Err(e)) => warn!("Error flushing during close: {}", e),
                Err(_) => warn!(
                    "Flush timeout during close ({}ms)",
                    flush_timeout.as_millis()
                ),
            }

            let mut stream = framed.into_inner();
            let shutdown_timeout = Duration::from_millis(500);
            match tokio::time::timeout(shutdown_timeout, stream.shutdown()).await {
                Ok(Ok(())) => debug!("Shutdown completed successfully"),
                Ok(Err(e)) => warn!("Error during shutdown: {}", e),
                Err(_) => warn!(
                    "Shutdown timeout during close ({}ms)",
                    shutdown_timeout.as_millis()
                ),
            }
        }

        self.stop_data_channel();
        Ok(())
    }

    fn timeout_ms(&self) -> u64 {
        self.config.timeout.as_millis() as u64
    }
}

impl Drop for CameraClient {
    fn drop(&mut self) {
        if self.framed.is_some() {
            debug!("CameraClient dropped while connected - connection will be closed");
        }
    }
}

/// Parameters of `img`: live buffer, first frame, one image.
fn image_request(format: TransferFormat) -> TaggedList {
    TaggedList::new()
        .with("cine", -1i64)
        .with("start", 0u64)
        .with("cnt", 1u64)
        .with("fmt", format_value(format))
}

/// Parameters of `ximg`, addressed to `destination`.
fn raw_image_request(format: TransferFormat, destination: MacAddress) -> TaggedList {
    TaggedList::new()
        .with("cine", -1i64)
        .with("start", 0u64)
        .with("cnt", 1u64)
        .with("dest", Value::HexInt(destination.as_u64()))
        .with("fmt", Value::Name(DottedName::from(format.token())))
}

fn format_value(format: TransferFormat) -> Value {
    match format.code() {
        Some(code) => Value::from(code),
        None => Value::Name(DottedName::from(format.token())),
    }
}

/// Resolution, format and payload size announced by an image response. A
/// `fmt` the camera reports overrides the requested one.
///
/// A resolution whose payload would exceed [`MAX_IMAGE_BYTES`] is rejected
/// before anything is allocated for it.
fn image_header(
    params: &TaggedList,
    requested: TransferFormat,
) -> Result<(Resolution, TransferFormat, usize), Error> {
    let resolution = params
        .get("res")
        .and_then(Value::as_resolution)
        .ok_or_else(|| Error::InvalidResponse(format!("no resolution in {params}")))?;

    let reported = params.get("fmt").and_then(|fmt| match fmt {
        Value::Name(name) => name.as_str().parse().ok(),
        other => other
            .as_i64()
            .and_then(|code| TransferFormat::from_code(code).ok()),
    });
    let format = reported.unwrap_or(requested);

    let expected = format
        .payload_len(resolution)
        .ok()
        .filter(|&len| len <= MAX_IMAGE_BYTES)
        .ok_or_else(|| {
            Error::InvalidResponse(format!("image of {resolution} in {format} is too large"))
        })?;

    Ok((resolution, format, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use phantom_protocol::parse_tagged_list;
    use rstest::rstest;

    #[test]
    fn test_client_creation() {
        let client = CameraClient::new(CameraClientConfig::default());
        assert!(!client.is_connected());
        assert_eq!(client.config().camera_addr.port(), 7115);
    }

    #[test]
    fn test_image_request_text() {
        let params = image_request(TransferFormat::P16);
        assert_eq!(params.to_string(), "{cine: -1, start: 0, cnt: 1, fmt: 272}");

        let params = image_request(TransferFormat::P8R);
        assert_eq!(params.get("fmt").and_then(Value::as_i64), Some(-8));
    }

    #[test]
    fn test_raw_image_request_text() {
        let mac: MacAddress = "02:00:5e:10:00:01".parse().unwrap();
        let params = raw_image_request(TransferFormat::P10, mac);
        let text = params.to_string();
        assert!(text.contains("dest: 0x2005e100001"));
        assert!(text.ends_with("fmt: P10}"));
    }

    #[test]
    fn test_image_header_uses_reported_format() {
        let params = parse_tagged_list("{cine: -1, res: 1280 x 800, fmt: 8}").unwrap();
        let (res, fmt, len) = image_header(&params, TransferFormat::P16).unwrap();
        assert_eq!(res, Resolution::new(1280, 800));
        assert_eq!(fmt, TransferFormat::P8);
        assert_eq!(len, 1_024_000);
    }

    #[test]
    fn test_image_header_falls_back_to_requested() {
        let params = parse_tagged_list("{res: 64x32, fmt: 999}").unwrap();
        let (_, fmt, len) = image_header(&params, TransferFormat::P12L).unwrap();
        assert_eq!(fmt, TransferFormat::P12L);
        assert_eq!(len, 3072);

        let params = parse_tagged_list("{res: 64x32}").unwrap();
        let (_, fmt, _) = image_header(&params, TransferFormat::P16).unwrap();
        assert_eq!(fmt, TransferFormat::P16);
    }

    #[test]
    fn test_image_header_requires_resolution() {
        let params = parse_tagged_list("{cine: -1, fmt: 272}").unwrap();
        assert!(matches!(
            image_header(&params, TransferFormat::P16),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[rstest]
    #[case("{cine: -1, res: 4294967295 x 4294967295, fmt: 272}")]
    #[case("{cine: -1, res: 100000x100000, fmt: 266}")]
    fn test_image_header_rejects_oversized_resolution(#[case] text: &str) {
        let params = parse_tagged_list(text).unwrap();
        assert!(matches!(
            image_header(&params, TransferFormat::P16),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_send_without_connect() {
        let mut client = CameraClient::new(CameraClientConfig::default());
        let result = client.send(&Command::trig()).await;
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_receive_without_connect() {
        let mut client = CameraClient::new(CameraClientConfig::default());
        assert!(matches!(
            client.receive_line().await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_acquire_without_data_channel() {
        let mut client = CameraClient::new(CameraClientConfig::default());
        assert!(matches!(
            client.acquire_image().await,
            Err(ClientError::DataChannelNotStarted)
        ));
    }

    #[tokio::test]
    async fn test_connection_timeout_names_target() {
        // RFC 5737 TEST-NET-1, not routable
        let config = CameraClientConfig {
            camera_addr: "192.0.2.1:7115".parse().unwrap(),
            timeout: Duration::from_millis(100),
            ..Default::default()
        };

        let mut client = CameraClient::new(config);
        match client.connect().await {
            Err(ClientError::Connection { target, .. }) => assert_eq!(target, "192.0.2.1:7115"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_when_not_connected() {
        let mut client = CameraClient::new(CameraClientConfig::default());
        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
    }
}
