//! Maps a (connection state, direction, packet id) to the pipeline that
//! translates it and the id it carries on the other side. Built once per
//! version pair at startup; read without locking afterwards.

use crate::buffer::PacketBuffer;
use crate::chunk::Environment;
use crate::pipeline::{Pipeline, Translation};
use conduit_common::{ConnectionState, Diagnostics, Direction, TranslateError};
use std::collections::HashMap;
use std::sync::Arc;

/// Version of the entity-kind table a connection's packets will use once it
/// is in the play state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityTaxonomy {
    pub protocol_version: u32,
}

/// External collaborator notified when a connection starts playing. Entity
/// state tracking itself lives outside the translation core.
pub trait EntityTracker: Send + Sync {
    fn connection_entered_play(&self, connection_id: u64, taxonomy: EntityTaxonomy);
}

/// Translation-relevant state of one connection. Owned by that connection's
/// session; only pipeline steps running on this connection's packets touch
/// it.
#[derive(Debug)]
pub struct Connection {
    pub id: u64,
    pub state: ConnectionState,
    /// World kind for terrain packets on this connection.
    pub environment: Environment,
}

impl Connection {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: ConnectionState::Handshake,
            environment: Environment::Normal,
        }
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }
}

struct PacketMapping {
    dest_id: i32,
    pipeline: Pipeline,
}

/// One version pair's packet mappings. Translating across more than two
/// versions is done by chaining registries, never by one registry.
#[derive(Default)]
pub struct TranslationRegistry {
    mappings: HashMap<(ConnectionState, Direction, i32), PacketMapping>,
    serverbound_login_acknowledged: Option<i32>,
    serverbound_finish_configuration: Option<i32>,
    clientbound_start_configuration: Option<i32>,
    entity_tracker: Option<Arc<dyn EntityTracker>>,
    player_taxonomy: Option<EntityTaxonomy>,
}

impl TranslationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_clientbound(
        &mut self,
        state: ConnectionState,
        source_id: i32,
        dest_id: i32,
        pipeline: Pipeline,
    ) {
        self.mappings.insert(
            (state, Direction::Clientbound, source_id),
            PacketMapping { dest_id, pipeline },
        );
    }

    pub fn register_serverbound(
        &mut self,
        state: ConnectionState,
        source_id: i32,
        dest_id: i32,
        pipeline: Pipeline,
    ) {
        self.mappings.insert(
            (state, Direction::Serverbound, source_id),
            PacketMapping { dest_id, pipeline },
        );
    }

    /// Serverbound login packet that moves the connection into the
    /// configuration state.
    pub fn set_login_acknowledged(&mut self, packet_id: i32) {
        self.serverbound_login_acknowledged = Some(packet_id);
    }

    /// Serverbound configuration packet that moves the connection into the
    /// play state.
    pub fn set_finish_configuration(&mut self, packet_id: i32) {
        self.serverbound_finish_configuration = Some(packet_id);
    }

    /// Clientbound play packet that moves the connection back into the
    /// configuration state.
    pub fn set_start_configuration(&mut self, packet_id: i32) {
        self.clientbound_start_configuration = Some(packet_id);
    }

    pub fn set_entity_tracker(&mut self, tracker: Arc<dyn EntityTracker>, taxonomy: EntityTaxonomy) {
        self.entity_tracker = Some(tracker);
        self.player_taxonomy = Some(taxonomy);
    }

    /// Translates one packet (id prefix plus payload) for the given
    /// connection and direction.
    ///
    /// A packet kind with no mapping is forwarded byte-identical; unknown
    /// packets are benign, not errors. A failing pipeline discards the
    /// partial output and surfaces the error; the connection layer decides
    /// what to do with the packet.
    pub fn translate(
        &self,
        connection: &mut Connection,
        direction: Direction,
        packet: &[u8],
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<u8>, TranslateError> {
        let mut source = PacketBuffer::from_bytes(packet.to_vec());
        let packet_id = source.read_varint().map_err(TranslateError::from_wire)?;

        let output = match self.mappings.get(&(connection.state, direction, packet_id)) {
            None => packet.to_vec(),
            Some(mapping) => {
                let mut dest = PacketBuffer::new();
                dest.write_varint(mapping.dest_id);
                let mut translation =
                    Translation::new(&mut source, &mut dest, connection, diagnostics);
                mapping.pipeline.run(&mut translation)?;
                dest.into_bytes()
            }
        };

        self.apply_state_transition(connection, direction, packet_id);
        Ok(output)
    }

    /// State transitions ride on sentinel packets and take effect for every
    /// later packet on this connection's stream.
    fn apply_state_transition(
        &self,
        connection: &mut Connection,
        direction: Direction,
        packet_id: i32,
    ) {
        match (connection.state, direction) {
            (ConnectionState::Login, Direction::Serverbound)
                if self.serverbound_login_acknowledged == Some(packet_id) =>
            {
                connection.state = ConnectionState::Configuration;
            }
            (ConnectionState::Configuration, Direction::Serverbound)
                if self.serverbound_finish_configuration == Some(packet_id) =>
            {
                self.enter_play(connection);
            }
            (ConnectionState::Play, Direction::Clientbound)
                if self.clientbound_start_configuration == Some(packet_id) =>
            {
                connection.state = ConnectionState::Configuration;
            }
            _ => {}
        }
    }

    fn enter_play(&self, connection: &mut Connection) {
        connection.state = ConnectionState::Play;
        if let (Some(tracker), Some(taxonomy)) = (&self.entity_tracker, self.player_taxonomy) {
            tracker.connection_entered_play(connection.id, taxonomy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FieldKind;
    use assert_matches::assert_matches;
    use conduit_common::NullDiagnostics;
    use std::sync::Mutex;

    fn play_connection(id: u64) -> Connection {
        let mut connection = Connection::new(id);
        connection.set_state(ConnectionState::Play);
        connection
    }

    fn packet(id: i32, payload: &[u8]) -> Vec<u8> {
        let mut buffer = PacketBuffer::new();
        buffer.write_varint(id);
        buffer.write_bytes(payload);
        buffer.into_bytes()
    }

    #[test]
    fn test_unknown_packet_is_forwarded_byte_identical() {
        let registry = TranslationRegistry::new();
        let mut connection = play_connection(1);
        let raw = packet(0x42, &[1, 2, 3]);

        let out = registry
            .translate(&mut connection, Direction::Clientbound, &raw, &NullDiagnostics)
            .unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_registered_packet_is_remapped() {
        let mut registry = TranslationRegistry::new();
        registry.register_clientbound(
            ConnectionState::Play,
            0x10,
            0x20,
            Pipeline::new().copy(FieldKind::VarInt),
        );
        let mut connection = play_connection(1);

        let out = registry
            .translate(
                &mut connection,
                Direction::Clientbound,
                &packet(0x10, &[0x07]),
                &NullDiagnostics,
            )
            .unwrap();
        assert_eq!(out, packet(0x20, &[0x07]));
    }

    #[test]
    fn test_direction_and_state_scope_the_lookup() {
        let mut registry = TranslationRegistry::new();
        registry.register_clientbound(
            ConnectionState::Play,
            0x10,
            0x20,
            Pipeline::new().copy(FieldKind::VarInt),
        );
        let mut connection = play_connection(1);

        // Same id, other direction: no mapping, passthrough.
        let raw = packet(0x10, &[0x07]);
        let out = registry
            .translate(&mut connection, Direction::Serverbound, &raw, &NullDiagnostics)
            .unwrap();
        assert_eq!(out, raw);

        // Same id, other state: no mapping, passthrough.
        connection.set_state(ConnectionState::Configuration);
        let out = registry
            .translate(&mut connection, Direction::Clientbound, &raw, &NullDiagnostics)
            .unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_malformed_packet_surfaces_error() {
        let mut registry = TranslationRegistry::new();
        registry.register_clientbound(
            ConnectionState::Play,
            0x10,
            0x10,
            Pipeline::new().copy(FieldKind::String),
        );
        let mut connection = play_connection(1);

        // The string length prefix overruns the packet.
        let mut raw = PacketBuffer::new();
        raw.write_varint(0x10);
        raw.write_varint(100);
        let result = registry.translate(
            &mut connection,
            Direction::Clientbound,
            &raw.into_bytes(),
            &NullDiagnostics,
        );
        assert_matches!(result, Err(TranslateError::MalformedPacket(_)));
    }

    struct RecordingTracker {
        seen: Mutex<Vec<(u64, EntityTaxonomy)>>,
    }

    impl EntityTracker for RecordingTracker {
        fn connection_entered_play(&self, connection_id: u64, taxonomy: EntityTaxonomy) {
            self.seen.lock().unwrap().push((connection_id, taxonomy));
        }
    }

    #[test]
    fn test_state_transitions_and_entity_hook() {
        let taxonomy = EntityTaxonomy {
            protocol_version: 762,
        };
        let tracker = Arc::new(RecordingTracker {
            seen: Mutex::new(Vec::new()),
        });

        let mut registry = TranslationRegistry::new();
        registry.set_login_acknowledged(0x03);
        registry.set_finish_configuration(0x02);
        registry.set_start_configuration(0x41);
        registry.set_entity_tracker(tracker.clone(), taxonomy);

        let mut connection = Connection::new(9);
        connection.set_state(ConnectionState::Login);

        registry
            .translate(
                &mut connection,
                Direction::Serverbound,
                &packet(0x03, &[]),
                &NullDiagnostics,
            )
            .unwrap();
        assert_eq!(connection.state, ConnectionState::Configuration);

        registry
            .translate(
                &mut connection,
                Direction::Serverbound,
                &packet(0x02, &[]),
                &NullDiagnostics,
            )
            .unwrap();
        assert_eq!(connection.state, ConnectionState::Play);
        assert_eq!(*tracker.seen.lock().unwrap(), vec![(9, taxonomy)]);

        // Play can drop back into configuration on the clientbound sentinel.
        registry
            .translate(
                &mut connection,
                Direction::Clientbound,
                &packet(0x41, &[]),
                &NullDiagnostics,
            )
            .unwrap();
        assert_eq!(connection.state, ConnectionState::Configuration);
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        let mut registry = TranslationRegistry::new();
        registry.register_clientbound(
            ConnectionState::Play,
            0x01,
            0x02,
            Pipeline::new().copy(FieldKind::VarInt),
        );
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut connection = play_connection(i);
                    registry
                        .translate(
                            &mut connection,
                            Direction::Clientbound,
                            &packet(0x01, &[0x05]),
                            &NullDiagnostics,
                        )
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), packet(0x02, &[0x05]));
        }
    }
}
