use super::{Completion, DataReceiver, Expected, TransferIds, TransferSession};
use crate::{DataChannelConfig, TransferError};
use phantom_core::constants::DATA_CHUNK_SIZE;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

/// Stream backend: a TCP listener the camera connects back to.
///
/// Every accepted connection carries exactly one image. Its handler waits
/// until the expected size is declared, reads until that many bytes arrived
/// (or the peer closes within the tolerance), hands the buffer over and closes
/// the connection. A handler belongs to the transfer declared when it started
/// reading; its result is dropped if a newer transfer was declared meanwhile.
#[derive(Debug)]
pub struct StreamReceiver {
    bind_addr: SocketAddr,
    tolerance: usize,
    local_addr: Option<SocketAddr>,
    ids: TransferIds,
    size_tx: watch::Sender<Option<Expected>>,
    done_rx: Option<mpsc::Receiver<Completion>>,
    task: Option<JoinHandle<()>>,
}

impl StreamReceiver {
    pub fn new(config: &DataChannelConfig) -> Self {
        let (size_tx, _) = watch::channel(None);
        Self {
            bind_addr: config.bind_addr,
            tolerance: config.stream_tolerance,
            local_addr: None,
            ids: TransferIds::default(),
            size_tx,
            done_rx: None,
            task: None,
        }
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn clear_expected(&mut self) {
        self.ids.clear();
        self.size_tx.send_replace(None);
    }
}

impl DataReceiver for StreamReceiver {
    fn set_expected_size(&mut self, size: usize) {
        let expected = self.ids.open(size);
        debug!(size, transfer = expected.id, "Expecting stream transfer");
        self.size_tx.send_replace(Some(expected));
    }

    async fn start(&mut self) -> Result<(), TransferError> {
        if self.is_running() {
            return Ok(());
        }

        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| TransferError::Bind {
                target: self.bind_addr.to_string(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Data stream listener started");

        let (done_tx, done_rx) = mpsc::channel(4);
        let size_rx = self.size_tx.subscribe();
        let tolerance = self.tolerance;
        self.task = Some(tokio::spawn(accept_loop(listener, size_rx, done_tx, tolerance)));
        self.done_rx = Some(done_rx);
        self.local_addr = Some(local_addr);
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
            debug!(transfer = ?id, "Discarding result of an abandoned stream transfer");
        }
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!(addr = ?self.local_addr, "Data stream listener stopped");
        }
        self.done_rx = None;
        self.local_addr = None;
        self.clear_expected();
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for StreamReceiver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("StreamReceiver dropped while listening - aborting listener");
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    size_rx: watch::Receiver<Option<Expected>>,
    done_tx: mpsc::Sender<Completion>,
    tolerance: usize,
) {
    // Dropping the set when this task is aborted aborts the handlers too.
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "Accepted data connection");
                    handlers.spawn(handle_connection(
                        stream,
                        addr,
                        size_rx.clone(),
                        done_tx.clone(),
                        tolerance,
                    ));
                }
                Err(e) => {
                    error!("Data listener accept failed: {}", e);
                    let _ = done_tx.send((None, Err(e.into()))).await;
                    return;
                }
            },
            Some(_) = handlers.join_next() => {}
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    mut size_rx: watch::Receiver<Option<Expected>>,
    done_tx: mpsc::Sender<Completion>,
    tolerance: usize,
) {
    let expected = match size_rx.wait_for(Option::is_some).await {
        Ok(expected) => *expected,
        Err(_) => return,
    };
    let Some(Expected { id, size }) = expected else {
        return;
    };

    let result = receive(&mut stream, size, tolerance).await;
    match &result {
        Ok(bytes) => debug!(
            peer = %addr,
            transfer = id,
            len = bytes.len(),
            "Stream transfer complete"
        ),
        Err(e) => warn!(peer = %addr, transfer = id, "Stream transfer failed: {}", e),
    }
    drop(stream);

    if done_tx.send((Some(id), result)).await.is_err() {
        trace!("Stream receiver gone before transfer was collected");
    }
}

async fn receive(
    stream: &mut TcpStream,
    expected: usize,
    tolerance: usize,
) -> Result<Vec<u8>, TransferError> {
    let mut session = TransferSession::with_expected(expected);
    let mut chunk = vec![0u8; DATA_CHUNK_SIZE.min(expected.max(1))];

    while !session.is_complete() {
        match stream.read(&mut chunk).await? {
            0 => session.finish_short(tolerance)?,
            n => {
                session.push(&chunk[..n]);
            }
        }
    }
    Ok(session.take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn loopback_config() -> DataChannelConfig {
        DataChannelConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    async fn started() -> (StreamReceiver, SocketAddr) {
        let mut receiver = StreamReceiver::new(&loopback_config());
        receiver.start().await.unwrap();
        let addr = receiver.local_addr().unwrap();
        (receiver, addr)
    }

    #[tokio::test]
    async fn test_receives_exact_size() {
        let (mut receiver, addr) = started().await;
        receiver.set_expected_size(4096);

        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let sent = payload.clone();
        tokio::spawn(async move {
            let mut peer = TcpStream::connect(addr).await.unwrap();
            for chunk in sent.chunks(1000) {
                peer.write_all(chunk).await.unwrap();
            }
        });

        let bytes = tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, payload);
        receiver.stop();
    }

    #[tokio::test]
    async fn test_short_transfer_padded() {
        let (mut receiver, addr) = started().await;
        let size = 1000;
        receiver.set_expected_size(size);

        tokio::spawn(async move {
            let mut peer = TcpStream::connect(addr).await.unwrap();
            peer.write_all(&vec![0xAB; size - 60]).await.unwrap();
            peer.shutdown().await.unwrap();
        });

        let bytes = tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes.len(), size);
        assert!(bytes[size - 60..].iter().all(|&b| b == 0));
        assert!(bytes[..size - 60].iter().all(|&b| b == 0xAB));
    }

    #[tokio::test]
    async fn test_short_transfer_beyond_tolerance_fails() {
        let (mut receiver, addr) = started().await;
        receiver.set_expected_size(1000);

        tokio::spawn(async move {
            let mut peer = TcpStream::connect(addr).await.unwrap();
            peer.write_all(&[1u8; 500]).await.unwrap();
            peer.shutdown().await.unwrap();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
            .await
            .unwrap();
        assert!(matches!(
            result,
            Err(TransferError::Incomplete {
                received: 500,
                expected: 1000
            })
        ));
    }

    #[tokio::test]
    async fn test_connection_before_size_declared() {
        let (mut receiver, addr) = started().await;

        let mut peer = TcpStream::connect(addr).await.unwrap();
        peer.write_all(&[7u8; 64]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        receiver.set_expected_size(64);
        let bytes = tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, vec![7u8; 64]);
    }

    #[tokio::test]
    async fn test_consecutive_transfers() {
        let (mut receiver, addr) = started().await;

        for round in 0..3u8 {
            receiver.set_expected_size(32);
            tokio::spawn(async move {
                let mut peer = TcpStream::connect(addr).await.unwrap();
                peer.write_all(&[round; 32]).await.unwrap();
            });
            let bytes = tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(bytes, vec![round; 32]);
        }
    }

    #[tokio::test]
    async fn test_await_without_start() {
        let mut receiver = StreamReceiver::new(&loopback_config());
        assert!(matches!(
            receiver.await_complete().await,
            Err(TransferError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_releases() {
        let (mut receiver, addr) = started().await;
        receiver.start().await.unwrap();
        assert_eq!(receiver.local_addr(), Some(addr));
        assert!(receiver.is_running());

        receiver.stop();
        assert!(!receiver.is_running());
        assert!(receiver.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let (_receiver, addr) = started().await;
        let mut second = StreamReceiver::new(&DataChannelConfig {
            bind_addr: addr,
            ..Default::default()
        });
        assert!(matches!(
            second.start().await,
            Err(TransferError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn test_abandoned_transfer_does_not_leak_into_next() {
        let (mut receiver, addr) = started().await;
        receiver.set_expected_size(1000);

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            let mut peer = TcpStream::connect(addr).await.unwrap();
            peer.write_all(&[1u8; 500]).await.unwrap();
            let _ = release_rx.await;
        });

        let first = tokio::time::timeout(Duration::from_millis(200), receiver.await_complete()).await;
        assert!(first.is_err());
        // the stalled peer now closes and its handler reports Incomplete
        drop(release_tx);
        tokio::time::sleep(Duration::from_millis(50)).await;

        receiver.set_expected_size(32);
        tokio::spawn(async move {
            let mut peer = TcpStream::connect(addr).await.unwrap();
            peer.write_all(&[2u8; 32]).await.unwrap();
        });

        let bytes = tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, vec![2u8; 32]);
    }

    #[tokio::test]
    async fn test_failed_transfer_then_good_transfer() {
        let (mut receiver, addr) = started().await;

        receiver.set_expected_size(1000);
        tokio::spawn(async move {
            let mut peer = TcpStream::connect(addr).await.unwrap();
            peer.write_all(&[1u8; 10]).await.unwrap();
        });
        let failed = tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
            .await
            .unwrap();
        assert!(matches!(failed, Err(TransferError::Incomplete { .. })));

        receiver.set_expected_size(16);
        tokio::spawn(async move {
            let mut peer = TcpStream::connect(addr).await.unwrap();
            peer.write_all(&[3u8; 16]).await.unwrap();
        });
        let bytes = tokio::time::timeout(Duration::from_secs(5), receiver.await_complete())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, vec![3u8; 16]);
    }
}
