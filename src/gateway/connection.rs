//! A single connector session.
//!
//! Frames are newline-delimited JSON over the socket. The first frame must
//! be a `hello` event carrying the shared token when one is configured.
//! After the handshake the session attaches itself to the bridge: a writer
//! task drains outbound requests, and the read loop dispatches inbound
//! events onto their own tasks so one slow handler never blocks the wire.

use crate::platform::bridge::BridgeChat;
use crate::services;
use crate::state::Warden;
use anyhow::{bail, Context};
use futures_util::{SinkExt, StreamExt};
use sentinel_proto::{ClientFrame, Event, ServerFrame};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Line length cap: a pin body for a very large guild still fits well
/// under this.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Outbound request queue depth before backpressure.
const OUTBOUND_QUEUE: usize = 256;

pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    warden: Arc<Warden>,
    bridge: Arc<BridgeChat>,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        warden: Arc<Warden>,
        bridge: Arc<BridgeChat>,
    ) -> Self {
        Self {
            stream,
            addr,
            warden,
            bridge,
        }
    }

    pub async fn run(self, token: CancellationToken) -> anyhow::Result<()> {
        let framed = Framed::new(
            self.stream,
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        );
        let (mut sink, mut stream) = framed.split();

        // Handshake: the first frame must be a hello event.
        let hello = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            line = stream.next() => line,
        };
        let Some(line) = hello else {
            bail!("connector closed before hello");
        };
        let line = line.context("failed to read hello frame")?;
        let frame: ClientFrame =
            serde_json::from_str(&line).context("failed to parse hello frame")?;
        let hello_event = match frame {
            ClientFrame::Event {
                event: event @ Event::Hello { .. },
            } => event,
            other => bail!("expected hello frame, got {other:?}"),
        };
        if let Event::Hello { token: presented, connector, .. } = &hello_event {
            if let Some(expected) = &self.warden.config.bridge.token {
                if presented.as_deref() != Some(expected.as_str()) {
                    warn!(addr = %self.addr, connector = %connector, "connector rejected: bad token");
                    bail!("connector presented an invalid token");
                }
            }
            info!(addr = %self.addr, connector = %connector, "connector authenticated");
        }

        // Attach to the bridge and start the writer.
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_QUEUE);
        let generation = self.bridge.attach(outbound_tx);

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let line = match serde_json::to_string(&frame) {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(error = %err, "failed to encode outbound frame");
                        continue;
                    }
                };
                if let Err(err) = sink.send(line).await {
                    debug!(error = %err, "outbound write failed, closing writer");
                    break;
                }
            }
        });

        // The hello itself carries the initial guild list.
        tokio::spawn(services::handle_event(
            Arc::clone(&self.warden),
            hello_event,
        ));

        // Read loop.
        let result = loop {
            let next = tokio::select! {
                _ = token.cancelled() => break Ok(()),
                next = stream.next() => next,
            };
            let Some(line) = next else {
                break Ok(());
            };
            let line = match line {
                Ok(line) => line,
                Err(err) => break Err(anyhow::Error::new(err).context("read failed")),
            };
            match serde_json::from_str::<ClientFrame>(&line) {
                Ok(ClientFrame::Event { event }) => {
                    tokio::spawn(services::handle_event(Arc::clone(&self.warden), event));
                }
                Ok(ClientFrame::Reply { reply }) => {
                    self.bridge.resolve(reply);
                }
                Err(err) => {
                    // Skip the malformed frame, keep the session.
                    debug!(error = %err, "malformed frame skipped");
                }
            }
        };

        self.bridge.detach(generation);
        writer.abort();
        result
    }
}
