use super::{Completion, DataReceiver, Expected, FrameAssembler, HeaderLayout, TransferIds, build_frames};
use crate::{DataChannelConfig, TransferError, interface};
use phantom_core::{MacAddress, constants::*};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Raw frame backend: collects image frames sent to a local interface.
///
/// Each [`start`](DataReceiver::start) opens a fresh socket for one transfer,
/// aborting any receive task still running; the task exits once the declared
/// size has been collected, so the receiver must be started again before the
/// next image.
#[derive(Debug)]
pub struct RawFrameReceiver {
    interface: String,
    protocol_id: u16,
    layout: HeaderLayout,
    ids: TransferIds,
    size_tx: watch::Sender<Option<Expected>>,
    done_rx: Option<mpsc::Receiver<Completion>>,
    task: Option<JoinHandle<()>>,
}

impl RawFrameReceiver {
    pub fn new(config: &DataChannelConfig) -> Self {
        let (size_tx, _) = watch::channel(None);
        Self {
            interface: config.interface.clone(),
            protocol_id: config.protocol_id,
            layout: config.header_layout,
            ids: TransferIds::default(),
            size_tx,
            done_rx: None,
            task: None,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn clear_expected(&mut self) {
        self.ids.clear();
        self.size_tx.send_replace(None);
    }

    /// Run a fresh receive task over `source`. A fresh source starts a fresh
    /// transfer.
    fn launch<S: FrameSource>(&mut self, source: S) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.clear_expected();
        let (done_tx, done_rx) = mpsc::channel(1);
        let assembler = FrameAssembler::new(self.protocol_id, self.layout);
        self.task = Some(tokio::spawn(receive_loop(
            source,
            assembler,
            self.size_tx.subscribe(),
            done_tx,
        )));
        self.done_rx = Some(done_rx);
    }
}

impl DataReceiver for RawFrameReceiver {
    fn set_expected_size(&mut self, size: usize) {
        let expected = self.ids.open(size);
        debug!(
            size,
            transfer = expected.id,
            interface = %self.interface,
            "Expecting raw transfer"
        );
        self.size_tx.send_replace(Some(expected));
    }

    async fn start(&mut self) -> Result<(), TransferError> {
        if let Some(task) = self.task.take() {
            debug!(interface = %self.interface, "Restarting raw frame receiver");
            task.abort();
        }
        self.done_rx = None;

        let socket = sys::RawSocket::bind(&self.interface, self.protocol_id)
            .map_err(|e| bind_error(&self.interface, e))?;
        info!(
            interface = %self.interface,
            protocol_id = %format!("{:#06x}", self.protocol_id),
            "Raw frame receiver started"
        );
        self.launch(socket);
        Ok(())
    }

    async fn await_complete(&mut self) -> Result<Vec<u8>, TransferError> {
        let done_rx = self.done_rx.as_mut().ok_or(TransferError::NotStarted)?;
        loop {
            let (id, result) = done_rx.recv().await.ok_or(TransferError::Stopped)?;
            if self.ids.is_current(id) {
                self.ids.clear();
                self.size_tx.send_replace(None);
                return result;
            }
            debug!(transfer = ?id, "Discarding result of an abandoned raw transfer");
        }
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!(interface = %self.interface, "Raw frame receiver stopped");
        }
        self.done_rx = None;
        self.clear_expected();
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RawFrameReceiver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("RawFrameReceiver dropped while listening - aborting receiver");
            task.abort();
        }
    }
}

/// Source of received link-layer frames, one per call.
pub(crate) trait FrameSource: Send + 'static {
    fn next_frame(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

impl FrameSource for sys::RawSocket {
    async fn next_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf).await
    }
}

async fn receive_loop<S: FrameSource>(
    mut source: S,
    mut assembler: FrameAssembler,
    mut size_rx: watch::Receiver<Option<Expected>>,
    done_tx: mpsc::Sender<Completion>,
) {
    let mut buf = vec![0u8; MAX_RECEIVE_FRAME];
    let mut current: Option<u64> = None;

    let result = loop {
        tokio::select! {
            received = source.next_frame(&mut buf) => match received {
                Ok(n) => {
                    if assembler.accept(&buf[..n]) {
                        break Ok(assembler.take());
                    }
                }
                Err(e) => break Err(TransferError::Io(e)),
            },
            changed = size_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let expected = *size_rx.borrow_and_update();
                if let Some(Expected { id, size }) = expected {
                    current = Some(id);
                    if assembler.set_expected(size) {
                        break Ok(assembler.take());
                    }
                }
            }
        }
    };

    match &result {
        Ok(bytes) => debug!(
            transfer = ?current,
            len = bytes.len(),
            discarded = assembler.discarded(),
            "Raw transfer complete"
        ),
        Err(e) => warn!(transfer = ?current, "Raw transfer failed: {}", e),
    }
    if done_tx.send((current, result)).await.is_err() {
        trace!("Raw receiver gone before transfer was collected");
    }
}

/// Configuration for [`RawFrameSender`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFrameSenderConfig {
    /// Interface frames leave from
    pub interface: String,

    /// Receiver hardware address
    pub destination: MacAddress,

    /// Ethernet protocol id stamped on every frame
    pub protocol_id: u16,

    /// Maximum frame length including the header
    pub frame_size: usize,

    pub header_layout: HeaderLayout,
}

impl Default for RawFrameSenderConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            destination: MacAddress::BROADCAST,
            protocol_id: ETHERNET_PROTOCOL_ID,
            frame_size: DEFAULT_FRAME_SIZE,
            header_layout: HeaderLayout::Padded,
        }
    }
}

/// Fragments a payload into raw frames and transmits them.
///
/// Delivery is fire-and-forget, as on the camera side of the 10G path.
#[derive(Debug)]
pub struct RawFrameSender {
    config: RawFrameSenderConfig,
    source: MacAddress,
    socket: sys::RawSocket,
}

impl RawFrameSender {
    /// Open the sending socket. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `TransferError::Bind` if the interface or its address cannot be
    /// resolved, `TransferError::Unsupported` off Linux.
    pub fn bind(config: RawFrameSenderConfig) -> Result<Self, TransferError> {
        let source =
            interface::mac_address(&config.interface).map_err(|e| TransferError::Bind {
                target: config.interface.clone(),
                reason: e.to_string(),
            })?;
        let socket = sys::RawSocket::bind(&config.interface, config.protocol_id)
            .map_err(|e| bind_error(&config.interface, e))?;
        info!(
            interface = %config.interface,
            source = %source.to_colon_string(),
            destination = %config.destination.to_colon_string(),
            "Raw frame sender ready"
        );
        Ok(Self {
            config,
            source,
            socket,
        })
    }

    pub fn source(&self) -> MacAddress {
        self.source
    }

    /// Send `payload` as consecutive frames. Returns the number of frames sent.
    pub async fn send(&self, payload: &[u8]) -> Result<usize, TransferError> {
        let frames = build_frames(
            payload,
            self.source,
            self.config.destination,
            self.config.protocol_id,
            self.config.frame_size,
            self.config.header_layout,
        )?;
        for frame in &frames {
            self.socket.send(frame, self.config.destination).await?;
        }
        debug!(
            frames = frames.len(),
            bytes = payload.len(),
            "Sent raw transfer"
        );
        Ok(frames.len())
    }
}

fn bind_error(interface: &str, e: io::Error) -> TransferError {
    if e.kind() == io::ErrorKind::Unsupported {
        TransferError::Unsupported(e.to_string())
    } else {
        TransferError::Bind {
            target: interface.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use phantom_core::MacAddress;
    use phantom_core::constants::MAC_LENGTH;
    use std::ffi::CString;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use tokio::io::unix::AsyncFd;

    /// Non-blocking `AF_PACKET` socket bound to one interface and protocol.
    #[derive(Debug)]
    pub struct RawSocket {
        fd: AsyncFd<OwnedFd>,
        ifindex: libc::c_int,
        protocol: u16,
    }

    impl RawSocket {
        pub fn bind(interface: &str, protocol_id: u16) -> io::Result<Self> {
            let name = CString::new(interface).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL")
            })?;

            // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
            let ifindex = unsafe { libc::if_nametoindex(name.as_ptr()) };
            if ifindex == 0 {
                return Err(io::Error::last_os_error());
            }
            let ifindex = libc::c_int::try_from(ifindex)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface index"))?;

            // Network byte order, as the kernel expects in both places below.
            let protocol = protocol_id.to_be();

            // SAFETY: plain syscall with no pointer arguments; the result is checked.
            let raw = unsafe {
                libc::socket(
                    libc::AF_PACKET,
                    libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                    libc::c_int::from(protocol),
                )
            };
            if raw < 0 {
                return Err(io::Error::last_os_error());
            }
            // SAFETY: `raw` is a freshly created descriptor not owned by anything else.
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };

            let addr = link_address(ifindex, protocol, None);
            // SAFETY: `addr` is an initialised sockaddr_ll and the length passed matches its size.
            let rc = unsafe {
                libc::bind(
                    fd.as_raw_fd(),
                    (&addr as *const libc::sockaddr_ll).cast::<libc::sockaddr>(),
                    std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
                )
            };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Self {
                fd: AsyncFd::new(fd)?,
                ifindex,
                protocol,
            })
        }

        pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                let mut guard = self.fd.readable().await?;
                let result = guard.try_io(|inner| {
                    // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
                    let n = unsafe {
                        libc::recv(
                            inner.as_raw_fd(),
                            buf.as_mut_ptr().cast::<libc::c_void>(),
                            buf.len(),
                            0,
                        )
                    };
                    if n < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(n as usize)
                    }
                });
                if let Ok(result) = result {
                    return result;
                }
            }
        }

        pub async fn send(&self, frame: &[u8], destination: MacAddress) -> io::Result<usize> {
            let addr = link_address(self.ifindex, self.protocol, Some(destination));
            loop {
                let mut guard = self.fd.writable().await?;
                let result = guard.try_io(|inner| {
                    // SAFETY: `frame` is valid for reads of `frame.len()` bytes and
                    // `addr` is an initialised sockaddr_ll of the length passed.
                    let n = unsafe {
                        libc::sendto(
                            inner.as_raw_fd(),
                            frame.as_ptr().cast::<libc::c_void>(),
                            frame.len(),
                            0,
                            (&addr as *const libc::sockaddr_ll).cast::<libc::sockaddr>(),
                            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
                        )
                    };
                    if n < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(n as usize)
                    }
                });
                if let Ok(result) = result {
                    return result;
                }
            }
        }
    }

    fn link_address(
        ifindex: libc::c_int,
        protocol: u16,
        destination: Option<MacAddress>,
    ) -> libc::sockaddr_ll {
        // SAFETY: sockaddr_ll is plain old data; all-zero is a valid value.
        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::c_ushort;
        addr.sll_protocol = protocol;
        addr.sll_ifindex = ifindex;
        if let Some(destination) = destination {
            addr.sll_halen = MAC_LENGTH as u8;
            addr.sll_addr[..MAC_LENGTH].copy_from_slice(&destination.octets());
        }
        addr
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use phantom_core::MacAddress;
    use std::io;

    #[derive(Debug)]
    pub struct RawSocket;

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "raw Ethernet sockets require Linux",
        )
    }

    impl RawSocket {
        pub fn bind(_interface: &str, _protocol_id: u16) -> io::Result<Self> {
            Err(unsupported())
        }

        pub async fn recv(&self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(unsupported())
        }

        pub async fn send(&self, _frame: &[u8], _destination: MacAddress) -> io::Result<usize> {
            Err(unsupported())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    const SRC: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0, 0x01]);
    const DST: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0, 0x02]);

    fn config(interface: &str) -> DataChannelConfig {
        DataChannelConfig {
            interface: interface.to_string(),
            ..Default::default()
        }
    }

    /// Frames handed over through a channel, in order.
    struct QueuedFrames(mpsc::UnboundedReceiver<io::Result<Vec<u8>>>);

    impl FrameSource for QueuedFrames {
        async fn next_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv().await {
                Some(Ok(frame)) => {
                    buf[..frame.len()].copy_from_slice(&frame);
                    Ok(frame.len())
                }
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }
    }

    fn queued() -> (mpsc::UnboundedSender<io::Result<Vec<u8>>>, QueuedFrames) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, QueuedFrames(rx))
    }

    fn frames(payload: &[u8], protocol_id: u16) -> Vec<Vec<u8>> {
        build_frames(payload, SRC, DST, protocol_id, 100, HeaderLayout::Padded).unwrap()
    }

    fn push_all(tx: &mpsc::UnboundedSender<io::Result<Vec<u8>>>, frames: Vec<Vec<u8>>) {
        for frame in frames {
            tx.send(Ok(frame)).unwrap();
        }
    }

    async fn complete(receiver: &mut RawFrameReceiver) -> Result<Vec<u8>, TransferError> {
        tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
            .await
            .unwrap()
    }

    #[test]
    fn test_sender_config_default() {
        let config = RawFrameSenderConfig::default();
        assert_eq!(config.frame_size, 1500);
        assert_eq!(config.protocol_id, 0x88B7);
        assert_eq!(config.destination, MacAddress::BROADCAST);
        assert_eq!(config.header_layout, HeaderLayout::Padded);
    }

    #[tokio::test]
    async fn test_start_on_missing_interface_fails() {
        let mut receiver = RawFrameReceiver::new(&config("no-such-iface0"));
        let result = receiver.start().await;
        assert!(matches!(
            result,
            Err(TransferError::Bind { .. }) | Err(TransferError::Unsupported(_))
        ));
        assert!(!receiver.is_running());
    }

    #[tokio::test]
    async fn test_await_without_start() {
        let mut receiver = RawFrameReceiver::new(&config("lo"));
        assert!(matches!(
            receiver.await_complete().await,
            Err(TransferError::NotStarted)
        ));
    }

    #[rstest]
    #[case(io::ErrorKind::Unsupported, true)]
    #[case(io::ErrorKind::PermissionDenied, false)]
    #[case(io::ErrorKind::NotFound, false)]
    fn test_bind_error_mapping(#[case] kind: io::ErrorKind, #[case] unsupported: bool) {
        match bind_error("eth0", io::Error::from(kind)) {
            TransferError::Unsupported(_) => assert!(unsupported),
            TransferError::Bind { target, .. } => {
                assert!(!unsupported);
                assert_eq!(target, "eth0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_size_declared_after_frames_arrive() {
        let mut receiver = RawFrameReceiver::new(&config("lo"));
        let (tx, source) = queued();
        receiver.launch(source);

        let payload: Vec<u8> = (0..200u8).collect();
        push_all(&tx, frames(&[0xEE; 40], 0x0800));
        push_all(&tx, frames(&payload, ETHERNET_PROTOCOL_ID));
        tokio::time::sleep(Duration::from_millis(50)).await;

        receiver.set_expected_size(200);
        assert_eq!(complete(&mut receiver).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_frames_after_size_are_truncated() {
        let mut receiver = RawFrameReceiver::new(&config("lo"));
        let (tx, source) = queued();
        receiver.launch(source);

        receiver.set_expected_size(150);
        push_all(&tx, frames(&[4u8; 136], ETHERNET_PROTOCOL_ID));
        push_all(&tx, frames(&[5u8; 136], ETHERNET_PROTOCOL_ID));

        let bytes = complete(&mut receiver).await.unwrap();
        assert_eq!(bytes.len(), 150);
        assert!(bytes[..136].iter().all(|&b| b == 4));
        assert!(bytes[136..].iter().all(|&b| b == 5));
    }

    #[tokio::test]
    async fn test_source_failure_is_reported() {
        let mut receiver = RawFrameReceiver::new(&config("lo"));
        let (tx, source) = queued();
        receiver.launch(source);

        receiver.set_expected_size(64);
        tx.send(Err(io::Error::from(io::ErrorKind::ConnectionAborted)))
            .unwrap();
        assert!(matches!(
            complete(&mut receiver).await,
            Err(TransferError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_relaunch_after_timeout_discards_partial_transfer() {
        let mut receiver = RawFrameReceiver::new(&config("lo"));
        let (tx, source) = queued();
        receiver.launch(source);

        receiver.set_expected_size(200);
        push_all(&tx, frames(&[1u8; 68], ETHERNET_PROTOCOL_ID));
        let first = tokio::time::timeout(Duration::from_millis(100), receiver.await_complete()).await;
        assert!(first.is_err());

        let (tx, source) = queued();
        receiver.launch(source);
        receiver.set_expected_size(68);
        push_all(&tx, frames(&[2u8; 68], ETHERNET_PROTOCOL_ID));
        assert_eq!(complete(&mut receiver).await.unwrap(), vec![2u8; 68]);
    }

    #[test]
    fn test_transfer_ids_track_open_transfer() {
        let mut ids = TransferIds::default();
        let first = ids.open(10);
        let second = ids.open(20);
        assert_ne!(first.id, second.id);
        assert!(!ids.is_current(Some(first.id)));
        assert!(ids.is_current(Some(second.id)));
        assert!(ids.is_current(None));

        ids.clear();
        assert!(!ids.is_current(Some(second.id)));
    }
}
