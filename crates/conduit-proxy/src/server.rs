use crate::config::ProxyConfig;
use crate::session;
use conduit_common::Diagnostics;
use conduit_logger::{log, LogSeverity::*};
use conduit_protocol::TranslationRegistry;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Accept loop. Each accepted client becomes one independent session; nothing
/// is shared between sessions except the read-only registry.
pub async fn run(
    config: ProxyConfig,
    registry: Arc<TranslationRegistry>,
    diagnostics: Arc<dyn Diagnostics>,
) -> tokio::io::Result<()> {
    let listener = TcpListener::bind(&config.listen_addr).await?;
    log(format!("Listening on {}", config.listen_addr), Info);

    let mut next_connection_id: u64 = 0;
    loop {
        let (socket, addr) = listener.accept().await?;
        next_connection_id += 1;
        log(
            format!("New connection from: {} (#{})", addr, next_connection_id),
            Info,
        );

        let config = config.clone();
        let registry = registry.clone();
        let diagnostics = diagnostics.clone();
        let connection_id = next_connection_id;
        tokio::spawn(async move {
            if let Err(session_error) =
                session::run_session(socket, config, registry, diagnostics, connection_id).await
            {
                log(
                    format!("Session #{} ended: {}", connection_id, session_error),
                    Warning,
                );
            }
        });
    }
}
