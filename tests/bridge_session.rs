//! Connector bridge wire protocol: handshake, request/reply correlation.

use sentinel_proto::{Action, ClientFrame, Event, Reply, ReplyData, ServerFrame};
use sentineld::config::Config;
use sentineld::gateway::Gateway;
use sentineld::platform::bridge::BridgeChat;
use sentineld::platform::ChatApi;
use sentineld::state::{Warden, WardenParams};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

struct Session {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Session {
    async fn send(&mut self, frame: &ClientFrame) {
        let mut line = serde_json::to_string(frame).unwrap();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Option<ServerFrame> {
        let mut line = String::new();
        let n = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            self.reader.read_line(&mut line),
        )
        .await
        .ok()?
        .ok()?;
        if n == 0 {
            return None;
        }
        serde_json::from_str(&line).ok()
    }
}

async fn start_daemon(
    token_value: Option<&str>,
) -> (Session, CancellationToken, Arc<Warden>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.daemon.data_dir = dir.path().join("data");
    config.daemon.metrics_port = 0;
    config.bridge.listen = "127.0.0.1:0".parse().unwrap();
    config.bridge.token = token_value.map(str::to_string);
    config.moderation.blocklist_path = dir.path().join("absent.config");

    let bridge = Arc::new(BridgeChat::new());
    let chat: Arc<dyn ChatApi> = bridge.clone();
    let warden = Warden::new(WardenParams { config, chat });

    let gateway = Gateway::bind(Arc::clone(&warden), bridge).await.unwrap();
    let addr = gateway.local_addr().unwrap();
    let token = CancellationToken::new();
    let run_token = token.clone();
    tokio::spawn(async move {
        let _ = gateway.run(run_token).await;
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    (
        Session {
            reader: BufReader::new(read_half),
            writer: write_half,
        },
        token,
        warden,
        dir,
    )
}

fn hello(token_value: Option<&str>) -> ClientFrame {
    ClientFrame::Event {
        event: Event::Hello {
            connector: "test-connector".to_string(),
            token: token_value.map(str::to_string),
            guilds: Vec::new(),
        },
    }
}

#[tokio::test]
async fn command_round_trips_over_the_wire() {
    let (mut session, token, _warden, _dir) = start_daemon(None).await;
    session.send(&hello(None)).await;

    // An unauthorized /flags invocation: the daemon first asks the
    // connector about the invoker's permissions...
    session
        .send(&ClientFrame::Event {
            event: Event::Command {
                guild: 1.into(),
                channel: 42.into(),
                invoker: 777.into(),
                name: "flags".to_string(),
                args: Vec::new(),
            },
        })
        .await;

    let ServerFrame::Request { seq, action } = session.recv().await.expect("permission request");
    assert!(matches!(action, Action::HasPermission { .. }));
    session
        .send(&ClientFrame::Reply {
            reply: Reply {
                seq,
                result: Ok(ReplyData::Bool { value: false }),
            },
        })
        .await;

    // ...then answers the invoker in-channel with the rejection.
    let ServerFrame::Request { seq, action } = session.recv().await.expect("reply message");
    match action {
        Action::SendMessage { channel, content } => {
            assert_eq!(channel, 42.into());
            assert!(content.contains("permission"));
        }
        other => panic!("unexpected action: {other:?}"),
    }
    session
        .send(&ClientFrame::Reply {
            reply: Reply {
                seq,
                result: Ok(ReplyData::Message {
                    message: sentinel_proto::MessageRef {
                        channel: 42.into(),
                        id: 1.into(),
                    },
                }),
            },
        })
        .await;

    token.cancel();
}

#[tokio::test]
async fn bad_token_is_rejected() {
    let (mut session, token, _warden, _dir) = start_daemon(Some("secret")).await;
    session.send(&hello(Some("wrong"))).await;

    // The daemon drops the session without issuing any request.
    assert!(session.recv().await.is_none());
    token.cancel();
}

#[tokio::test]
async fn hello_guilds_are_registered() {
    let (mut session, token, warden, _dir) = start_daemon(None).await;
    session
        .send(&ClientFrame::Event {
            event: Event::Hello {
                connector: "test-connector".to_string(),
                token: None,
                guilds: vec![5.into(), 6.into()],
            },
        })
        .await;

    // Guild init fetches pins through the connector; answer the requests
    // until both guilds are registered.
    for _ in 0..16 {
        let mut guilds = warden.known_guilds();
        guilds.sort();
        if guilds == vec![5.into(), 6.into()] {
            break;
        }
        let Some(ServerFrame::Request { seq, action }) = session.recv().await else {
            continue;
        };
        let result = match action {
            Action::EnsureMemoryChannel { .. } => Ok(ReplyData::Channel {
                channel: Some(900.into()),
            }),
            Action::ListPins { .. } => Ok(ReplyData::Pins { pins: Vec::new() }),
            _ => Ok(ReplyData::Unit),
        };
        session
            .send(&ClientFrame::Reply {
                reply: Reply { seq, result },
            })
            .await;
    }

    let mut guilds = warden.known_guilds();
    guilds.sort();
    assert_eq!(guilds, vec![5.into(), 6.into()]);
    token.cancel();
}
