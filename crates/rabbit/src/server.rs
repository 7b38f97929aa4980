//! TCP server helpers.
//!
//! Spec §6: "ALPN `rabbit/1`; default TCP/QUIC port `7443`." The listener
//! and socket lifecycle are the caller's concern; this module wraps an
//! accepted stream as a [`Transport`] and drives a [`Burrow`] over it.

use std::sync::Arc;

use rabbit_core::{BurrowConfig, Capabilities, Transport};
use rabbit_proto::{Dispatcher, ResumeRegistry};
use rabbit_registry::SelectorResolver;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::engine::{self, Burrow};

/// Wrap a single accepted TCP stream as a [`Transport`].
pub fn serve_connection(stream: TcpStream) -> Transport {
    Transport::stream(stream)
}

/// Accept connections on `addr` forever. Each connection gets its own
/// [`Burrow`], built from a fresh [`Dispatcher`] via `make_dispatcher`, and
/// runs its read loop on its own task until the peer disconnects.
///
/// All connections share one [`ResumeRegistry`] for the listener's
/// lifetime (spec §8 S5 "reconnect and resume"): a token a session saved on
/// one tunnel must still be reachable from the fresh tunnel a reconnecting
/// client opens.
pub async fn run_tcp_server<R, F>(
    addr: &str,
    config: BurrowConfig,
    our_caps: Capabilities,
    make_dispatcher: F,
) -> std::io::Result<()>
where
    R: SelectorResolver + 'static,
    F: Fn() -> Dispatcher<R> + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "rabbit burrow listening");
    let make_dispatcher = Arc::new(make_dispatcher);
    let resumes = Arc::new(ResumeRegistry::new());

    loop {
        let (socket, peer_addr) = listener.accept().await?;
        info!(%peer_addr, "accepted connection");
        let transport = serve_connection(socket);
        let burrow: Burrow<R> = engine::new_tunnel(
            transport,
            config.clone(),
            make_dispatcher(),
            our_caps,
            resumes.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = burrow.run().await {
                warn!(%peer_addr, error = %e, "connection ended with error");
            }
        });
    }
}
