//! Integration tests for the WebSocket transport.
//!
//! These spin up a real WebSocket server and client to verify that data
//! actually flows over the network in both directions.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    use watchparty_transport::{Connection, Handshake, Transport, WebSocketTransport};

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    /// Binds on an OS-assigned port and accepts one client.
    async fn accept_one() -> (watchparty_transport::WebSocketConnection, ClientWs)
    {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();

        let server = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.complete().await.expect("handshake should succeed")
        });
        let client = connect_client(&addr).await;
        let conn = server.await.expect("task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_text_round_trip() {
        let (conn, mut client) = accept_one().await;

        client
            .send(Message::Text(r#"{"event":"leave-room"}"#.into()))
            .await
            .unwrap();
        let received = conn.recv().await.unwrap().unwrap();
        assert_eq!(received, br#"{"event":"leave-room"}"#);

        conn.send(br#"{"event":"left-room"}"#).await.unwrap();
        match client.next().await.unwrap().unwrap() {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"event":"left-room"}"#),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_utf8_goes_out_as_binary() {
        let (conn, mut client) = accept_one().await;
        conn.send(&[0xff, 0x00]).await.unwrap();
        match client.next().await.unwrap().unwrap() {
            Message::Binary(data) => assert_eq!(&data[..], &[0xff, 0x00]),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_is_not_blocked_by_pending_recv() {
        let (conn, mut client) = accept_one().await;
        let conn = Arc::new(conn);

        let reader = Arc::clone(&conn);
        let pending = tokio::spawn(async move { reader.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), conn.send(b"ping"))
            .await
            .expect("send must not wait for recv")
            .unwrap();
        assert!(client.next().await.is_some());

        client.close(None).await.unwrap();
        assert!(pending.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_client_close_yields_none() {
        let (conn, mut client) = accept_one().await;
        client.close(None).await.unwrap();
        assert!(conn.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connections_get_distinct_ids() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let a = transport.accept().await.unwrap().complete().await.unwrap();
            let b = transport.accept().await.unwrap().complete().await.unwrap();
            (a.id(), b.id())
        });
        let _c1 = connect_client(&addr).await;
        let _c2 = connect_client(&addr).await;
        let (a, b) = server.await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_silent_client_fails_handshake_after_timeout() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .unwrap()
            .with_handshake_timeout(Duration::from_millis(100));
        let addr = transport.local_addr().unwrap();

        // Connects at the TCP level and never sends an upgrade request.
        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();
        let pending = transport.accept().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), pending.complete())
            .await
            .expect("handshake must give up on its own");
        assert!(matches!(
            result,
            Err(watchparty_transport::TransportError::UpgradeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_accept_does_not_wait_for_handshake() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();
        let _stalled = transport.accept().await.unwrap();

        // A second client is accepted while the first handshake is still open.
        let client = tokio::spawn(async move { connect_client(&addr.to_string()).await });
        let pending = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("listener must not be held up")
            .unwrap();
        pending.complete().await.unwrap();
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_pong_counts_as_activity() {
        let (conn, mut client) = accept_one().await;
        let conn = Arc::new(conn);

        let reader = Arc::clone(&conn);
        let pending = tokio::spawn(async move { reader.recv().await });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(conn.idle_for() >= Duration::from_millis(100));

        conn.ping().await.unwrap();
        // The client answers the ping while reading.
        let msg = client.next().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Ping(_)));
        client.flush().await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while conn.idle_for() >= Duration::from_millis(100) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pong should reset the idle clock");

        client.close(None).await.unwrap();
        assert!(pending.await.unwrap().unwrap().is_none());
    }
}
