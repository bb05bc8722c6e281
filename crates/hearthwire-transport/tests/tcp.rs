//! Integration tests for the framed TCP transport.
//!
//! These spin up a real listener on a random port and talk to it with a
//! real client connection, so framing is exercised end to end.

use bytes::Bytes;
use hearthwire_transport::{Connection, TcpConnection, TcpTransport, Transport};
use tokio::io::AsyncWriteExt;

async fn bind() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_accept_and_send_receive() {
    let (mut transport, addr) = bind().await;

    let server = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });
    let client = TcpConnection::connect(&addr).await.expect("connect");
    let server_conn = server.await.expect("task should complete");

    client
        .send(Bytes::from_static(&[0x57, 0x00]))
        .await
        .expect("client send");
    let body = server_conn.recv().await.expect("recv").expect("frame");
    assert_eq!(&body[..], &[0x57, 0x00]);

    server_conn
        .send(Bytes::from_static(&[0x00, 0x00, 0x00, 0x00, 0x00]))
        .await
        .expect("server send");
    let reply = client.recv().await.expect("recv").expect("frame");
    assert_eq!(&reply[..], &[0x00, 0x00, 0x00, 0x00, 0x00]);
}

#[tokio::test]
async fn test_tcp_frames_arrive_in_order() {
    let (mut transport, addr) = bind().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });
    let client = TcpConnection::connect(&addr).await.unwrap();
    let server_conn = server.await.unwrap();

    for i in 0..20u8 {
        client.send(Bytes::from(vec![0x45, i])).await.unwrap();
    }
    for i in 0..20u8 {
        let body = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(body[1], i, "frame {i} out of order");
    }
}

#[tokio::test]
async fn test_tcp_recv_returns_none_on_clean_close() {
    let (mut transport, addr) = bind().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });
    let client = TcpConnection::connect(&addr).await.unwrap();
    let server_conn = server.await.unwrap();

    client.close().await.unwrap();
    drop(client);

    assert!(server_conn.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn test_tcp_garbage_marker_is_an_error() {
    let (mut transport, addr) = bind().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut raw = tokio::net::TcpStream::connect(&addr).await.unwrap();
    let server_conn = server.await.unwrap();

    raw.write_all(&[0x13, 0x37, 0x00, 0x01]).await.unwrap();

    let result = server_conn.recv().await;
    assert!(result.is_err(), "bad marker must surface as an error");
}

#[tokio::test]
async fn test_tcp_connection_ids_are_unique() {
    let (mut transport, addr) = bind().await;
    let accept = tokio::spawn(async move {
        let a = transport.accept().await.unwrap();
        let b = transport.accept().await.unwrap();
        (a, b)
    });
    let _c1 = TcpConnection::connect(&addr).await.unwrap();
    let _c2 = TcpConnection::connect(&addr).await.unwrap();
    let (a, b) = accept.await.unwrap();

    assert_ne!(a.id(), b.id());
}
