//! Terrain translation unit: chunk packets are decoded with the
//! environment-aware chunk codec and re-encoded for the destination version.
//! The environment itself is learned from the join packet on the same
//! connection, so the unit also registers a handler that records it.

use crate::chunk::{ChunkCodec, Environment};
use crate::pipeline::{Pipeline, Translation};
use crate::registry::TranslationRegistry;
use crate::types::{Int, UnsignedByte};
use conduit_common::{ConnectionState, TranslateError};

/// Clientbound play packets this unit rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientboundPlay {
    ChunkData = 0x22,
    JoinGame = 0x25,
}

impl ClientboundPlay {
    pub const fn id(self) -> i32 {
        self as i32
    }
}

pub fn register(registry: &mut TranslationRegistry) {
    registry.register_clientbound(
        ConnectionState::Play,
        ClientboundPlay::JoinGame.id(),
        ClientboundPlay::JoinGame.id(),
        join_game(),
    );
    registry.register_clientbound(
        ConnectionState::Play,
        ClientboundPlay::ChunkData.id(),
        ClientboundPlay::ChunkData.id(),
        chunk_data(),
    );
}

/// Records the connection's environment from the dimension field; every later
/// chunk packet on this connection decodes against it.
fn join_game() -> Pipeline {
    Pipeline::new().handler(|tr| {
        tr.passthrough(Int)?; // Entity id
        tr.passthrough(UnsignedByte)?; // Gamemode
        let dimension = tr.passthrough(Int)?;
        tr.connection().environment = match dimension {
            -1 => Environment::Nether,
            1 => Environment::End,
            _ => Environment::Normal,
        };
        // Difficulty, max players, level type and the debug flag are not
        // modeled and flow through as trailing bytes.
        Ok(())
    })
}

fn chunk_data() -> Pipeline {
    Pipeline::new().handler(chunk_transform)
}

fn chunk_transform(tr: &mut Translation<'_>) -> Result<(), TranslateError> {
    let environment = tr.connection().environment;
    let codec = ChunkCodec::for_environment(environment);

    let (source, dest, diagnostics) = tr.io();
    let chunk = codec.read(source, diagnostics).map_err(TranslateError::from_wire)?;
    codec.write(dest, &chunk).map_err(TranslateError::from_wire)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PacketBuffer;
    use crate::chunk::{Chunk, ChunkSection, Palette, SectionLight, LIGHT_LENGTH};
    use crate::registry::Connection;
    use conduit_common::{Direction, NullDiagnostics};

    fn test_registry() -> TranslationRegistry {
        let mut registry = TranslationRegistry::new();
        register(&mut registry);
        registry
    }

    fn play_connection(environment: Environment) -> Connection {
        let mut connection = Connection::new(1);
        connection.set_state(ConnectionState::Play);
        connection.environment = environment;
        connection
    }

    fn chunk_packet(environment: Environment, sky_light: bool) -> Vec<u8> {
        let mut sections: [Option<ChunkSection>; 16] = Default::default();
        let mut section = ChunkSection::new(
            4,
            Palette::Indirect {
                palette: vec![0, 33],
            },
            vec![0; 256],
        );
        section.light = SectionLight::new(
            vec![0xFF; LIGHT_LENGTH],
            sky_light.then(|| vec![0xEE; LIGHT_LENGTH]),
        );
        sections[0] = Some(section);

        let chunk = Chunk {
            x: 3,
            z: -2,
            full_chunk: false,
            bitmask: 0b1,
            sections,
            biomes: None,
            block_entities: Vec::new(),
        };

        let mut payload = PacketBuffer::new();
        payload.write_varint(ClientboundPlay::ChunkData.id());
        ChunkCodec::for_environment(environment)
            .write(&mut payload, &chunk)
            .unwrap();
        payload.into_bytes()
    }

    #[test]
    fn test_join_game_records_environment() {
        let registry = test_registry();
        let mut connection = play_connection(Environment::Normal);

        let mut packet = PacketBuffer::new();
        packet.write_varint(ClientboundPlay::JoinGame.id());
        packet.write_i32(77); // Entity id
        packet.write_u8(0); // Gamemode
        packet.write_i32(-1); // Dimension
        packet.write_u8(2); // Difficulty, trailing from here on
        let bytes = packet.into_bytes();

        let out = registry
            .translate(&mut connection, Direction::Clientbound, &bytes, &NullDiagnostics)
            .unwrap();
        assert_eq!(out, bytes);
        assert_eq!(connection.environment, Environment::Nether);
    }

    #[test]
    fn test_chunk_packet_reencodes_stably() {
        let registry = test_registry();
        let mut connection = play_connection(Environment::Normal);
        let packet = chunk_packet(Environment::Normal, true);

        let out = registry
            .translate(&mut connection, Direction::Clientbound, &packet, &NullDiagnostics)
            .unwrap();
        assert_eq!(out, packet);
    }

    #[test]
    fn test_chunk_packet_trailing_junk_is_dropped_by_reencode() {
        let registry = test_registry();
        let mut connection = play_connection(Environment::Nether);
        let clean = chunk_packet(Environment::Nether, false);
        let mut dirty = clean.clone();
        dirty.extend_from_slice(&[0x00, 0x01, 0x02]);

        let out = registry
            .translate(&mut connection, Direction::Clientbound, &dirty, &NullDiagnostics)
            .unwrap();
        assert_eq!(out, clean);
    }
}
