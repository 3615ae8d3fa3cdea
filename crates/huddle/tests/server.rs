//! Integration tests for the relay server over real TCP and WebSocket
//! connections.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use huddle::prelude::*;
use huddle_protocol::{FrameCodec, StreamDecoder};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(3);

// =========================================================================
// Test server
// =========================================================================

struct TestServer {
    tcp: String,
    ws: String,
    relay: Arc<Relay>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), HuddleError>>,
}

impl TestServer {
    async fn start(config: RelayConfig) -> Self {
        let server = HuddleServer::builder()
            .config(config)
            .tcp("127.0.0.1:0")
            .websocket("127.0.0.1:0")
            .build()
            .await
            .expect("server should build");

        let tcp = server.local_tcp_addr().expect("tcp addr").to_string();
        let ws = server.local_websocket_addr().expect("ws addr").to_string();
        let relay = server.relay();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));

        Self {
            tcp,
            ws,
            relay,
            stop: Some(stop),
            task,
        }
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(TIMEOUT, self.task)
            .await
            .expect("server should stop in time")
            .expect("server task should not panic")
            .expect("server should stop cleanly");
    }

    /// Polls until the relay reports `expected` peers.
    async fn wait_for_peers(&self, expected: usize) {
        tokio::time::timeout(TIMEOUT, async {
            while self.relay.peer_count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("peer count should settle");
    }
}

fn config() -> RelayConfig {
    RelayConfig {
        secret: "integration-secret".into(),
        ..RelayConfig::default()
    }
}

// =========================================================================
// Test client
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

enum Link {
    Tcp(TcpStream),
    Ws(Box<ClientWs>),
}

struct Client {
    link: Link,
    codec: FrameCodec,
    decoder: StreamDecoder,
    pending: VecDeque<Packet>,
    id: String,
}

impl Client {
    fn new(link: Link, config: &RelayConfig) -> Self {
        let codec = config.codec();
        Self {
            link,
            decoder: StreamDecoder::new(codec.clone(), usize::MAX),
            codec,
            pending: VecDeque::new(),
            id: String::new(),
        }
    }

    async fn tcp(server: &TestServer, config: &RelayConfig) -> Self {
        let stream = TcpStream::connect(&server.tcp).await.expect("tcp connect");
        Self::new(Link::Tcp(stream), config)
    }

    async fn ws(server: &TestServer, config: &RelayConfig) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", server.ws))
            .await
            .expect("ws connect");
        Self::new(Link::Ws(Box::new(ws)), config)
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        match &mut self.link {
            Link::Tcp(stream) => stream.write_all(bytes).await.expect("tcp write"),
            Link::Ws(ws) => ws
                .send(Message::Binary(bytes.to_vec().into()))
                .await
                .expect("ws send"),
        }
    }

    async fn send(&mut self, kind: PacketType, body: Value) {
        let frame = self.codec.encode(&Packet::new(kind, body)).expect("encode");
        self.send_raw(&frame).await;
    }

    /// Next chunk from the server, or `None` once it hangs up.
    async fn read_chunk(&mut self) -> Option<Vec<u8>> {
        match &mut self.link {
            Link::Tcp(stream) => {
                let mut buf = vec![0u8; 4096];
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => None,
                    Ok(n) => {
                        buf.truncate(n);
                        Some(buf)
                    }
                }
            }
            Link::Ws(ws) => loop {
                match ws.next().await {
                    Some(Ok(Message::Binary(data))) => return Some(data.to_vec()),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                    Some(Ok(_)) => continue,
                }
            },
        }
    }

    async fn recv(&mut self) -> Packet {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                if let Some(packet) = self.pending.pop_front() {
                    return packet;
                }
                let chunk = self
                    .read_chunk()
                    .await
                    .expect("connection closed while waiting for a packet");
                for frame in self.decoder.feed(&chunk) {
                    assert!(frame.checksum_ok, "checksum mismatch from server");
                    self.pending
                        .push_back(frame.into_packet().expect("known packet type"));
                }
            }
        })
        .await
        .expect("timed out waiting for a packet")
    }

    async fn recv_json(&mut self) -> Value {
        self.recv()
            .await
            .payload
            .as_json()
            .cloned()
            .expect("JSON payload")
    }

    async fn handshake(&mut self, name: &str) {
        self.send(PacketType::Handshake, json!({"name": name})).await;
        let ack = self.recv_json().await;
        assert_eq!(ack["status"], "ok");
        self.id = ack["clientId"].as_str().expect("clientId").to_owned();
    }

    async fn join(&mut self, room: &str) -> Value {
        self.send(PacketType::RoomControl, json!({"action": "join", "roomId": room}))
            .await;
        self.recv_json().await
    }

    /// Waits for the server to hang up, skipping any queued packets.
    async fn assert_closed(&mut self) {
        tokio::time::timeout(TIMEOUT, async {
            while self.read_chunk().await.is_some() {}
        })
        .await
        .expect("server should close the connection");
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_tcp_handshake_join_and_targeted_signaling() {
    let config = config();
    let server = TestServer::start(config.clone()).await;
    let mut alice = Client::tcp(&server, &config).await;
    let mut bob = Client::tcp(&server, &config).await;
    alice.handshake("alice").await;
    bob.handshake("bob").await;

    let ack = alice.join("lobby").await;
    assert_eq!(ack["event"], "joined");
    assert_eq!(ack["peers"], json!([]));

    let ack = bob.join("lobby").await;
    assert_eq!(
        ack["peers"],
        json!([{"clientId": alice.id.as_str(), "name": "alice"}])
    );
    assert_eq!(
        alice.recv_json().await,
        json!({"event": "peer-joined", "peerId": bob.id.as_str(), "name": "bob"})
    );

    alice
        .send(
            PacketType::Signaling,
            json!({"type": "offer", "targetId": bob.id.as_str(), "sdp": "v=0"}),
        )
        .await;
    let offer = bob.recv().await;
    assert_eq!(offer.kind, PacketType::Signaling);
    let offer = offer.payload.as_json().cloned().unwrap();
    assert_eq!(offer["sdp"], "v=0");
    assert_eq!(offer["from"], alice.id.as_str());

    server.stop().await;
}

#[tokio::test]
async fn test_tcp_byte_by_byte_writes_are_reassembled() {
    let config = config();
    let server = TestServer::start(config.clone()).await;
    let mut client = Client::tcp(&server, &config).await;

    let frame = config
        .codec()
        .encode(&Packet::new(PacketType::Handshake, json!({"name": "slow"})))
        .unwrap();
    for byte in &frame {
        client.send_raw(std::slice::from_ref(byte)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let ack = client.recv_json().await;
    assert_eq!(ack["status"], "ok");

    server.stop().await;
}

#[tokio::test]
async fn test_tcp_two_frames_in_one_write_both_handled() {
    let config = config();
    let server = TestServer::start(config.clone()).await;
    let mut client = Client::tcp(&server, &config).await;

    let codec = config.codec();
    let mut bytes = codec
        .encode(&Packet::new(PacketType::Handshake, json!({})))
        .unwrap();
    bytes.extend(
        codec
            .encode(&Packet::new(
                PacketType::RoomControl,
                json!({"action": "join", "roomId": "r"}),
            ))
            .unwrap(),
    );
    client.send_raw(&bytes).await;

    assert_eq!(client.recv_json().await["status"], "ok");
    assert_eq!(client.recv_json().await["event"], "joined");

    server.stop().await;
}

#[tokio::test]
async fn test_websocket_and_tcp_peers_share_a_room() {
    let config = config();
    let server = TestServer::start(config.clone()).await;
    let mut web = Client::ws(&server, &config).await;
    let mut native = Client::tcp(&server, &config).await;
    web.handshake("web").await;
    native.handshake("native").await;
    web.join("mixed").await;
    native.join("mixed").await;
    web.recv_json().await; // peer-joined

    web.send(
        PacketType::Signaling,
        json!({"type": "candidate", "candidate": "udp 1"}),
    )
    .await;
    let candidate = native.recv_json().await;
    assert_eq!(candidate["candidate"], "udp 1");
    assert_eq!(candidate["from"], web.id.as_str());

    native
        .send(PacketType::Signaling, json!({"type": "answer"}))
        .await;
    assert_eq!(web.recv_json().await["from"], native.id.as_str());

    server.stop().await;
}

#[tokio::test]
async fn test_keepalive_echoed_in_plain_mode() {
    let config = RelayConfig {
        obfuscate: false,
        ..config()
    };
    let server = TestServer::start(config.clone()).await;
    let mut client = Client::tcp(&server, &config).await;

    client
        .send(PacketType::Keepalive, json!({"t": 42}))
        .await;

    let echo = client.recv().await;
    assert_eq!(echo.kind, PacketType::Keepalive);
    assert_eq!(echo.payload.as_json().unwrap(), &json!({"t": 42}));

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_notifies_room_and_cleans_up() {
    let config = config();
    let server = TestServer::start(config.clone()).await;
    let mut alice = Client::tcp(&server, &config).await;
    let mut bob = Client::ws(&server, &config).await;
    alice.handshake("alice").await;
    bob.handshake("bob").await;
    alice.join("r").await;
    bob.join("r").await;
    alice.recv_json().await; // peer-joined
    let bob_id = bob.id.clone();

    drop(bob);

    assert_eq!(
        alice.recv_json().await,
        json!({"event": "peer-left", "peerId": bob_id})
    );
    server.wait_for_peers(1).await;
    assert_eq!(
        server.relay.members_of(&RoomId::from("r")).await,
        vec![PeerId::from(alice.id.as_str())]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let config = RelayConfig {
        max_frame_len: 64,
        ..config()
    };
    let server = TestServer::start(config.clone()).await;
    let mut client = Client::tcp(&server, &config).await;

    client.send_raw(&[0, 0, 1, 0, 2]).await;

    client.assert_closed().await;
    server.wait_for_peers(0).await;
    server.stop().await;
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let config = RelayConfig {
        idle_timeout_secs: 1,
        ..config()
    };
    let server = TestServer::start(config.clone()).await;
    let mut client = Client::tcp(&server, &config).await;

    client.assert_closed().await;
    server.wait_for_peers(0).await;
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_every_connection() {
    let config = config();
    let server = TestServer::start(config.clone()).await;
    let mut tcp = Client::tcp(&server, &config).await;
    let mut ws = Client::ws(&server, &config).await;
    tcp.handshake("a").await;
    ws.handshake("b").await;
    let relay = Arc::clone(&server.relay);

    server.stop().await;

    tcp.assert_closed().await;
    ws.assert_closed().await;
    assert_eq!(relay.peer_count().await, 0);
    assert_eq!(relay.room_count().await, 0);
}

#[tokio::test]
async fn test_stalled_websocket_upgrade_does_not_block_other_clients() {
    let config = RelayConfig {
        upgrade_timeout_secs: 1,
        ..config()
    };
    let server = TestServer::start(config.clone()).await;

    // Opens the socket but never sends the HTTP upgrade request.
    let mut stalled = TcpStream::connect(&server.ws).await.expect("tcp connect");

    let mut client = tokio::time::timeout(TIMEOUT, Client::ws(&server, &config))
        .await
        .expect("healthy client blocked behind a stalled upgrade");
    client.handshake("patient").await;
    server.wait_for_peers(1).await;

    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(TIMEOUT, stalled.read(&mut buf))
        .await
        .expect("stalled socket should be dropped after the upgrade timeout")
        .unwrap_or(0);
    assert_eq!(n, 0);

    server.stop().await;
}

#[test]
fn test_run_until_returns_after_connections_have_closed() {
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    // The server gets its own runtime. Dropping it cancels any task still
    // alive, so a connection task that outlived `run_until` would never
    // send its close frame.
    let server_thread = std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("server runtime");
        runtime.block_on(async move {
            let server = HuddleServer::builder()
                .config(config())
                .tcp("")
                .websocket("127.0.0.1:0")
                .build()
                .await
                .expect("server should build");
            let addr = server.local_websocket_addr().expect("ws addr");
            ready_tx
                .send((addr, server.relay()))
                .expect("test should be waiting");
            server
                .run_until(async move {
                    let _ = stop_rx.await;
                })
                .await
        })
    });
    let (addr, relay) = ready_rx.recv().expect("server should start");

    let client_runtime = tokio::runtime::Runtime::new().expect("client runtime");
    let mut ws = client_runtime.block_on(async {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("ws connect");
        tokio::time::timeout(TIMEOUT, async {
            while relay.peer_count().await != 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("peer should register");
        ws
    });

    stop_tx.send(()).expect("server should still be running");
    server_thread
        .join()
        .expect("server thread should not panic")
        .expect("server should stop cleanly");

    client_runtime.block_on(async {
        let frame = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("close frame should already be buffered");
        assert!(
            matches!(frame, Some(Ok(Message::Close(_)))),
            "expected a close frame, got {frame:?}"
        );
    });
}

#[tokio::test]
async fn test_build_without_listeners_returns_error() {
    let result = HuddleServer::builder()
        .tcp("")
        .websocket("")
        .build()
        .await;

    assert!(matches!(result, Err(HuddleError::NoListeners)));
}
