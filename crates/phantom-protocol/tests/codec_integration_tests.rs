//! Integration tests for ControlCodec with Tokio streams.
//!
//! A client and a camera side exchange commands and responses over an
//! in-memory duplex stream, covering framing, multi-line responses and
//! partial writes.

use futures::{SinkExt, StreamExt};
use phantom_core::Error;
use phantom_protocol::{
    Command, ControlCodec, TaggedList, Value, format_error, format_ok, parse_response,
    parse_response_params,
};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

fn create_framed_duplex(
    buffer_size: usize,
) -> (
    Framed<DuplexStream, ControlCodec>,
    Framed<DuplexStream, ControlCodec>,
) {
    let (client, camera) = tokio::io::duplex(buffer_size);
    (
        Framed::new(client, ControlCodec::new()),
        Framed::new(camera, ControlCodec::new()),
    )
}

#[tokio::test]
async fn test_get_request_and_multiline_reply() {
    let (mut client, mut camera) = create_framed_duplex(1024);

    client.send(Command::get("info.sensors")).await.unwrap();

    let request = camera.next().await.unwrap().unwrap();
    let command = Command::parse(&request).unwrap();
    assert_eq!(command.verb(), "get");
    assert_eq!(command.tokens(), ["info.sensors"]);

    let lines = vec!["1".to_string(), "2".to_string(), "3".to_string()];
    camera.send(format_ok(&lines)).await.unwrap();

    let reply = client.next().await.unwrap().unwrap();
    assert_eq!(parse_response(&reply).unwrap(), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_image_request_reply_parameters() {
    let (mut client, mut camera) = create_framed_duplex(1024);

    let params = TaggedList::new()
        .with("cine", Value::SignedInt(-1))
        .with("start", 0u64)
        .with("cnt", 1u64)
        .with("fmt", 272u64);
    client.send(Command::with_params("img", params.clone())).await.unwrap();

    let request = Command::parse(&camera.next().await.unwrap().unwrap()).unwrap();
    assert_eq!(request.params(), Some(&params));

    camera
        .send("OK! {cine: -1, res: 640x480, fmt: 272}")
        .await
        .unwrap();
    let reply = parse_response_params(&client.next().await.unwrap().unwrap()).unwrap();
    assert_eq!(
        reply.get("res").and_then(Value::as_resolution),
        Some(phantom_core::Resolution::new(640, 480))
    );
    assert_eq!(reply.get("fmt").and_then(Value::as_u64), Some(272));
}

#[tokio::test]
async fn test_error_reply_surfaces_reason() {
    let (mut client, mut camera) = create_framed_duplex(1024);

    client.send(Command::get("info.bogus")).await.unwrap();
    let _ = camera.next().await.unwrap().unwrap();
    camera
        .send(format_error("name info.bogus is unknown"))
        .await
        .unwrap();

    let reply = client.next().await.unwrap().unwrap();
    match parse_response(&reply) {
        Err(Error::Command { reason }) => assert_eq!(reason, "name info.bogus is unknown"),
        other => panic!("expected command error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_line_split_across_writes() {
    let (raw_client, camera) = tokio::io::duplex(64);
    let mut camera = Framed::new(camera, ControlCodec::new());
    let mut raw_client = raw_client;

    raw_client.write_all(b"startdata {po").await.unwrap();
    raw_client.write_all(b"rt: 7116}\r").await.unwrap();
    raw_client.write_all(b"\ntrig\r\n").await.unwrap();

    let first = Command::parse(&camera.next().await.unwrap().unwrap()).unwrap();
    assert_eq!(first, Command::startdata(7116));

    let second = Command::parse(&camera.next().await.unwrap().unwrap()).unwrap();
    assert_eq!(second, Command::trig());
}

#[tokio::test]
async fn test_stream_ends_after_peer_closes() {
    let (client, mut camera) = create_framed_duplex(64);
    drop(client);
    assert!(camera.next().await.is_none());
}
