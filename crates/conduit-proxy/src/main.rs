use conduit_logger::{log, LogDiagnostics, LogSeverity::Info};
use conduit_protocol::rewrite;
use conduit_protocol::{EntityTaxonomy, EntityTracker, TranslationRegistry};
use conduit_proxy::config::{ProxyConfig, TranslationUnit};
use conduit_proxy::server;
use std::path::Path;
use std::sync::Arc;

/// Stand-in entity-tracking collaborator: records entry into play in the log.
struct LogEntityTracker;

impl EntityTracker for LogEntityTracker {
    fn connection_entered_play(&self, connection_id: u64, taxonomy: EntityTaxonomy) {
        log(
            format!(
                "Connection #{} entered play (entity taxonomy {})",
                connection_id, taxonomy.protocol_version
            ),
            Info,
        );
    }
}

#[tokio::main]
async fn main() {
    log("Conduit init".to_string(), Info);

    let config = ProxyConfig::load_or_default(Path::new("conduit.json"));

    // The registry is built once here and only ever read afterwards.
    let mut registry = TranslationRegistry::new();
    match config.unit {
        TranslationUnit::Text => {
            rewrite::text::register(&mut registry, Arc::new(LogEntityTracker))
        }
        TranslationUnit::World => rewrite::world::register(&mut registry),
    }

    if let Err(server_error) =
        server::run(config, Arc::new(registry), Arc::new(LogDiagnostics)).await
    {
        log(format!("Server failed: {}", server_error), conduit_logger::LogSeverity::Fatal);
    }
}
