//! Camera discovery over UDP broadcast.
//!
//! One request datagram is broadcast; replies are collected until the
//! discovery window closes. Datagrams without the protocol marker are ignored.

use crate::{ClientError, DiscoveryConfig};
use phantom_core::constants::DISCOVERY_REQUEST;
use phantom_protocol::{CameraInfo, discovery::is_discovery_response};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

const MAX_DATAGRAM: usize = 1024;

/// Broadcast a discovery request and collect the cameras that answer.
///
/// No retry: a single request is sent and the call returns once
/// `config.timeout` has elapsed.
///
/// # Errors
/// Returns `ClientError::Io` if the socket cannot be bound, the request
/// cannot be sent or receiving a reply fails.
pub async fn discover(config: &DiscoveryConfig) -> Result<Vec<CameraInfo>, ClientError> {
    let socket = UdpSocket::bind(config.bind_addr).await?;
    socket.set_broadcast(true)?;

    socket.send_to(DISCOVERY_REQUEST, config.broadcast_addr).await?;
    info!(
        target_addr = %config.broadcast_addr,
        timeout_ms = config.timeout.as_millis() as u64,
        "Sent discovery request"
    );

    let cameras = collect_replies(&socket, Instant::now() + config.timeout).await?;
    info!(count = cameras.len(), "Discovery finished");
    Ok(cameras)
}

/// Source of reply datagrams.
trait ReplySource {
    fn recv_reply(&self, buf: &mut [u8])
    -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

impl ReplySource for UdpSocket {
    async fn recv_reply(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf).await
    }
}

/// Collect camera replies until `deadline`.
async fn collect_replies<S: ReplySource>(
    source: &S,
    deadline: Instant,
) -> Result<Vec<CameraInfo>, ClientError> {
    let mut cameras = Vec::new();
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        let (len, sender) = match tokio::time::timeout_at(deadline, source.recv_reply(&mut buf)).await
        {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                error!("Discovery receive failed: {}", e);
                return Err(e.into());
            }
            Err(_) => break,
        };

        let payload = &buf[..len];
        if !is_discovery_response(payload) {
            trace!(sender = %sender, len, "Ignoring non-discovery datagram");
            continue;
        }
        match CameraInfo::parse(payload, sender) {
            Ok(camera) => {
                debug!(
                    ip = %camera.ip,
                    port = camera.port,
                    serial = %camera.serial,
                    "Camera answered discovery"
                );
                cameras.push(camera);
            }
            Err(e) => warn!(sender = %sender, "Malformed discovery response: {}", e),
        }
    }

    Ok(cameras)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies served in order; silent once exhausted.
    struct ScriptedReplies(Mutex<VecDeque<io::Result<&'static str>>>);

    impl ScriptedReplies {
        fn new(replies: Vec<io::Result<&'static str>>) -> Self {
            Self(Mutex::new(replies.into()))
        }
    }

    impl ReplySource for ScriptedReplies {
        async fn recv_reply(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let next = self.0.lock().unwrap().pop_front();
            match next {
                Some(Ok(reply)) => {
                    buf[..reply.len()].copy_from_slice(reply.as_bytes());
                    Ok((reply.len(), "10.0.0.7:7380".parse().unwrap()))
                }
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_millis(100)
    }

    #[tokio::test]
    async fn test_collects_until_deadline() {
        let source = ScriptedReplies::new(vec![
            Ok("PH16 7115 1200 1001"),
            Ok("hello"),
            Ok("PH16 not-a-port 1200 1002"),
            Ok("PH16 7115 1200 1003"),
        ]);

        let cameras = collect_replies(&source, deadline()).await.unwrap();
        let serials: Vec<&str> = cameras.iter().map(|c| c.serial.as_str()).collect();
        assert_eq!(serials, vec!["1001", "1003"]);
    }

    #[tokio::test]
    async fn test_receive_failure_propagates() {
        let source = ScriptedReplies::new(vec![
            Ok("PH16 7115 1200 1001"),
            Err(io::Error::from(io::ErrorKind::ConnectionReset)),
        ]);

        assert!(matches!(
            collect_replies(&source, deadline()).await,
            Err(ClientError::Io(_))
        ));
    }
}
