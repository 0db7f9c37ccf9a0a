//! Codec for terrain chunk packets: a presence bitmask selecting up to 16
//! vertical sections, each followed by its lighting data, then optional biome
//! data and the chunk's block entities.

use crate::buffer::PacketBuffer;
use crate::types::{ContextType, NamedTagArray, WireType};
use conduit_common::{Diagnostics, NullDiagnostics};
use conduit_nbt::Tag;
use std::io;
use std::str::FromStr;

/// 16x16x16 blocks at half a byte of light per block.
pub const LIGHT_LENGTH: usize = 2048;

/// Biome data is a fixed 256 ints for a full chunk.
pub const BIOME_ENTRIES: usize = 256;
const BIOME_BYTES: usize = BIOME_ENTRIES * 4;

/// The world kind a connection plays in. Only worlds with a sky carry
/// sky-light data in their chunk packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Normal,
    Nether,
    End,
}

impl Environment {
    pub fn has_sky(self) -> bool {
        matches!(self, Environment::Normal)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "normal" => Ok(Environment::Normal),
            "nether" => Ok(Environment::Nether),
            "end" => Ok(Environment::End),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}

/// Light data attached to one section. Sky light is only present for chunks
/// read in an environment with a sky; on write its presence is decided by
/// this struct alone, not by the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionLight {
    block_light: Vec<u8>,
    sky_light: Option<Vec<u8>>,
}

impl Default for SectionLight {
    fn default() -> Self {
        Self {
            block_light: vec![0; LIGHT_LENGTH],
            sky_light: None,
        }
    }
}

impl SectionLight {
    pub fn new(block_light: Vec<u8>, sky_light: Option<Vec<u8>>) -> Self {
        Self {
            block_light,
            sky_light,
        }
    }

    pub fn has_sky_light(&self) -> bool {
        self.sky_light.is_some()
    }

    pub fn set_sky_light(&mut self, sky_light: Option<Vec<u8>>) {
        self.sky_light = sky_light;
    }

    pub fn read_block_light(&mut self, buffer: &mut PacketBuffer) -> io::Result<()> {
        self.block_light = buffer.read_bytes(LIGHT_LENGTH)?;
        Ok(())
    }

    pub fn read_sky_light(&mut self, buffer: &mut PacketBuffer) -> io::Result<()> {
        self.sky_light = Some(buffer.read_bytes(LIGHT_LENGTH)?);
        Ok(())
    }

    pub fn write_block_light(&self, buffer: &mut PacketBuffer) {
        buffer.write_bytes(&self.block_light);
    }

    pub fn write_sky_light(&self, buffer: &mut PacketBuffer) {
        if let Some(sky_light) = &self.sky_light {
            buffer.write_bytes(sky_light);
        }
    }
}

/// Palette for the block data of one section.
#[derive(Debug, Clone, PartialEq)]
pub enum Palette {
    /// Block values are global state ids.
    Direct,
    /// Block values index into a per-section list of global state ids.
    Indirect { palette: Vec<u32> },
}

/// One vertical slice of a chunk: packed block data plus its light.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSection {
    bits_per_block: u8,
    palette: Palette,
    /// Block values packed `bits_per_block` at a time into 64-bit words.
    data: Vec<u64>,
    pub light: SectionLight,
}

impl ChunkSection {
    pub fn new(bits_per_block: u8, palette: Palette, data: Vec<u64>) -> Self {
        Self {
            bits_per_block,
            palette,
            data,
            light: SectionLight::default(),
        }
    }

    pub fn get_palette(&self) -> &Palette {
        &self.palette
    }

    pub fn read(buffer: &mut PacketBuffer) -> io::Result<ChunkSection> {
        let bits_per_block = buffer.read_u8()?;

        let palette = if bits_per_block <= 8 {
            let palette_length = buffer.read_varint()?;
            if palette_length < 0 || palette_length as usize > buffer.remaining() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Palette claims {} entries", palette_length),
                ));
            }
            let mut palette = Vec::with_capacity(palette_length as usize);
            for _ in 0..palette_length {
                palette.push(buffer.read_varint()? as u32);
            }
            Palette::Indirect { palette }
        } else {
            Palette::Direct
        };

        let data_length = buffer.read_varint()?;
        if data_length < 0 || data_length as usize * 8 > buffer.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Section data claims {} words, {} bytes remain",
                    data_length,
                    buffer.remaining()
                ),
            ));
        }
        let mut data = Vec::with_capacity(data_length as usize);
        for _ in 0..data_length {
            data.push(buffer.read_i64()? as u64);
        }

        Ok(ChunkSection::new(bits_per_block, palette, data))
    }

    pub fn write(&self, buffer: &mut PacketBuffer) {
        buffer.write_u8(self.bits_per_block);

        if let Palette::Indirect { palette } = &self.palette {
            buffer.write_varint(palette.len() as i32);
            for entry in palette {
                buffer.write_varint(*entry as i32);
            }
        }

        buffer.write_varint(self.data.len() as i32);
        for value in &self.data {
            buffer.write_i64(*value as i64);
        }
    }
}

/// A decoded chunk packet. Constructed fresh on every read and only turned
/// back into bytes by the explicit write path.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub x: i32,
    pub z: i32,
    pub full_chunk: bool,
    /// Bit i set means section i is present.
    pub bitmask: u16,
    pub sections: [Option<ChunkSection>; 16],
    /// Present only for full chunks.
    pub biomes: Option<Vec<i32>>,
    /// Block-entity records in packet order, keeping their root names.
    pub block_entities: Vec<(String, Tag)>,
}

impl Chunk {
    pub fn has_section(&self, index: usize) -> bool {
        index < 16 && (self.bitmask & (1 << index)) != 0
    }
}

static WITH_SKYLIGHT: ChunkCodec = ChunkCodec {
    environment: Environment::Normal,
};
static WITHOUT_SKYLIGHT: ChunkCodec = ChunkCodec {
    environment: Environment::Nether,
};

/// Chunk codec parameterized by the environment the chunk is read in. The
/// environment only matters on read; the write path takes every decision from
/// the chunk itself.
#[derive(Debug)]
pub struct ChunkCodec {
    environment: Environment,
}

impl ChunkCodec {
    /// Returns a shared codec for the environment. All skyless environments
    /// decode identically, so they share one instance.
    pub fn for_environment(environment: Environment) -> &'static ChunkCodec {
        if environment.has_sky() {
            &WITH_SKYLIGHT
        } else {
            &WITHOUT_SKYLIGHT
        }
    }

    pub fn read(
        &self,
        input: &mut PacketBuffer,
        diagnostics: &dyn Diagnostics,
    ) -> io::Result<Chunk> {
        let chunk_x = input.read_i32()?;
        let chunk_z = input.read_i32()?;

        let full_chunk = input.read_bool()?;
        let bitmask = input.read_varint()? as u16;

        // The length prefix bounds all section and biome data; fields past it
        // belong to the rest of the packet.
        let data_length = input.read_varint()?;
        if data_length < 0 || data_length as usize > input.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Section data length {} overruns packet ({} bytes remain)",
                    data_length,
                    input.remaining()
                ),
            ));
        }
        let mut data = input.read_sub_buffer(data_length as usize)?;

        // Read sections
        let mut sections: [Option<ChunkSection>; 16] = Default::default();
        for i in 0..16 {
            if (bitmask & (1 << i)) == 0 {
                continue; // Section not set
            }

            let mut section = ChunkSection::read(&mut data)?;
            section.light.read_block_light(&mut data)?;
            if self.environment.has_sky() {
                section.light.read_sky_light(&mut data)?;
            }
            sections[i] = Some(section);
        }

        let biomes = if full_chunk {
            if data.remaining() >= BIOME_BYTES {
                let mut biomes = Vec::with_capacity(BIOME_ENTRIES);
                for _ in 0..BIOME_ENTRIES {
                    biomes.push(data.read_i32()?);
                }
                Some(biomes)
            } else {
                // Malformed upstream data; keep the chunk usable.
                diagnostics.warn(format!(
                    "Chunk x={} z={} doesn't have biome data!",
                    chunk_x, chunk_z
                ));
                Some(vec![0; BIOME_ENTRIES])
            }
        } else {
            None
        };

        let block_entities = NamedTagArray.read(input)?;

        // Some producers attach unexpected trailing data; tolerate it.
        if input.remaining() > 0 {
            let trailing = input.read_remaining();
            diagnostics.debug(format!(
                "Found {} more bytes than expected while reading the chunk: {}/{}",
                trailing.len(),
                chunk_x,
                chunk_z
            ));
        }

        Ok(Chunk {
            x: chunk_x,
            z: chunk_z,
            full_chunk,
            bitmask,
            sections,
            biomes,
            block_entities,
        })
    }

    pub fn write(&self, output: &mut PacketBuffer, chunk: &Chunk) -> io::Result<()> {
        output.write_i32(chunk.x);
        output.write_i32(chunk.z);

        output.write_bool(chunk.full_chunk);
        output.write_varint(chunk.bitmask as i32);

        // Scratch buffer scoped to this call; dropped on every exit path.
        let mut data = PacketBuffer::new();
        for section in chunk.sections.iter().flatten() {
            section.write(&mut data);
            section.light.write_block_light(&mut data);

            if !section.light.has_sky_light() {
                continue; // No sky light, we're done here.
            }
            section.light.write_sky_light(&mut data);
        }

        // The length prefix covers the biome region too; the credit is a
        // fixed part of the format, added exactly when biome data follows.
        let biome_credit = if chunk.biomes.is_some() { BIOME_BYTES } else { 0 };
        output.write_varint((data.len() + biome_credit) as i32);
        output.write_bytes(data.get_buffer());

        // Write biome data
        if let Some(biomes) = &chunk.biomes {
            for value in biomes {
                output.write_i32(*value);
            }
        }

        // Write block entities
        NamedTagArray.write(output, &chunk.block_entities)?;

        Ok(())
    }
}

impl ContextType for ChunkCodec {
    type Value = Chunk;
    type Context = Environment;

    fn read(&self, buffer: &mut PacketBuffer, context: &Environment) -> io::Result<Chunk> {
        ChunkCodec::for_environment(*context).read(buffer, &NullDiagnostics)
    }

    fn write(
        &self,
        buffer: &mut PacketBuffer,
        _context: &Environment,
        value: &Chunk,
    ) -> io::Result<()> {
        ChunkCodec::write(self, buffer, value)
    }
}
