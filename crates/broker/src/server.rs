//! TCP Listener: the accept loop that turns each inbound connection into a
//! single parse-authorize-respond cycle, with cooperative shutdown.
//!
//! Mirrors the teacher's listener shape (accept loop, spawn-per-connection,
//! `CancellationToken`-driven shutdown) generalized from a persistent
//! Unix-socket protocol to a one-shot TCP/JSON one.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use broker_proto::constants::{ACCEPT_POLL, CLIENT_READ_TIMEOUT, CLIENT_WRITE_TIMEOUT, REQUEST_READ_CAP};
use broker_proto::types::RawRequest;

use crate::core::BrokerCore;
use crate::error::BrokerError;

/// Bind to `bind_addr` and accept connections until `shutdown` fires.
///
/// Exits within one [`ACCEPT_POLL`] period of cancellation; in-flight
/// workers are left to finish their single request.
pub async fn serve(core: Arc<BrokerCore>, bind_addr: &str, shutdown: CancellationToken) -> Result<(), BrokerError> {
	let listener = TcpListener::bind(bind_addr)
		.await
		.map_err(|source| BrokerError::Bind {
			addr: bind_addr.to_string(),
			source,
		})?;
	info!(addr = %bind_addr, "broker listening");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				info!("shutdown requested, exiting accept loop");
				break;
			}
			accepted = timeout(ACCEPT_POLL, listener.accept()) => {
				match accepted {
					Ok(Ok((stream, peer))) => {
						let core = Arc::clone(&core);
						tokio::spawn(async move {
							if let Err(err) = handle_connection(core, stream, peer).await {
								warn!(%peer, %err, "connection error");
							}
						});
					}
					Ok(Err(err)) => warn!(%err, "accept error"),
					Err(_elapsed) => continue,
				}
			}
		}
	}

	Ok(())
}

/// Read one request, dispatch it, write one response, close. Never
/// surfaces an error to the peer for reasons other than malformed JSON —
/// every other failure is a normal `{"status":"error",...}` response.
#[tracing::instrument(name = "connection", skip(core, stream), fields(%peer))]
async fn handle_connection(core: Arc<BrokerCore>, mut stream: TcpStream, peer: SocketAddr) -> std::io::Result<()> {
	let mut buf = vec![0u8; REQUEST_READ_CAP];
	let n = timeout(CLIENT_READ_TIMEOUT, stream.read(&mut buf))
		.await
		.map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"))??;

	let response = match serde_json::from_slice::<RawRequest>(&buf[..n]) {
		Ok(request) => {
			info!(action = %request.action, "dispatching request");
			core.handle_request(request)
		}
		Err(err) => {
			warn!(%err, "malformed request");
			serde_json::json!({"status": "error", "message": err.to_string()})
		}
	};

	let bytes = serde_json::to_vec(&response)?;
	timeout(CLIENT_WRITE_TIMEOUT, stream.write_all(&bytes))
		.await
		.map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "write timed out"))??;

	Ok(())
}
