//! Gateway - TCP listener that accepts the platform connector.
//!
//! The gateway binds the bridge address and runs connector sessions. Only
//! one connector drives the bridge at a time; a newly accepted session
//! replaces the previous attachment.

mod connection;

pub use connection::Connection;

use crate::platform::bridge::BridgeChat;
use crate::state::Warden;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Accepts connector connections and runs their session loops.
pub struct Gateway {
    listener: TcpListener,
    warden: Arc<Warden>,
    bridge: Arc<BridgeChat>,
}

impl Gateway {
    /// Bind the gateway to the configured bridge address.
    pub async fn bind(warden: Arc<Warden>, bridge: Arc<BridgeChat>) -> anyhow::Result<Self> {
        let addr = warden.config.bridge.listen;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Bridge listener bound");
        Ok(Self {
            listener,
            warden,
            bridge,
        })
    }

    /// The bound listener address (useful with an ephemeral port).
    pub fn local_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connectors until shutdown.
    pub async fn run(self, token: CancellationToken) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Bridge listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            info!(%addr, "Connector connection accepted");
                            let warden = Arc::clone(&self.warden);
                            let bridge = Arc::clone(&self.bridge);
                            let token = token.clone();
                            tokio::spawn(async move {
                                let connection = Connection::new(stream, addr, warden, bridge);
                                if let Err(e) = connection.run(token).await {
                                    error!(%addr, error = %e, "Connector session error");
                                }
                                info!(%addr, "Connector session closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connector connection");
                        }
                    }
                }
            }
        }
    }
}
