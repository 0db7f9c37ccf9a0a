use crate::buffer::PacketBuffer;
use conduit_nbt::Tag;
use std::io;

/// A named, stateless rule for reading one value of `Value` from a packet
/// buffer and writing it back.
///
/// `read` consumes exactly the bytes belonging to one value and advances the
/// cursor; `write` appends exactly the bytes `read` would reproduce. Writers
/// use the same minimal-length encoding as any compliant encoder; the wire
/// format carries no redundancy that would catch a non-minimal length.
pub trait WireType {
    type Value;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Self::Value>;
    fn write(&self, buffer: &mut PacketBuffer, value: &Self::Value) -> io::Result<()>;
}

/// A codec that needs an extra context value at read/write time, without the
/// context being part of the produced value (e.g. whether the surrounding
/// environment has a sky). Implementations may be pooled across contexts that
/// decode identically; a pooled instance must never carry data from one call
/// to the next.
pub trait ContextType {
    type Value;
    type Context;

    fn read(&self, buffer: &mut PacketBuffer, context: &Self::Context) -> io::Result<Self::Value>;
    fn write(
        &self,
        buffer: &mut PacketBuffer,
        context: &Self::Context,
        value: &Self::Value,
    ) -> io::Result<()>;
}

// A borrowed codec reads and writes like the codec itself; passthrough-style
// callers borrow one codec for a read and a write in sequence.
impl<T: WireType> WireType for &T {
    type Value = T::Value;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<T::Value> {
        (*self).read(buffer)
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &T::Value) -> io::Result<()> {
        (*self).write(buffer, value)
    }
}

macro_rules! primitive_type {
    ($name:ident, $value:ty, $read:ident, $write:ident) => {
        pub struct $name;

        impl WireType for $name {
            type Value = $value;

            fn read(&self, buffer: &mut PacketBuffer) -> io::Result<$value> {
                buffer.$read()
            }

            fn write(&self, buffer: &mut PacketBuffer, value: &$value) -> io::Result<()> {
                buffer.$write(*value);
                Ok(())
            }
        }
    };
}

primitive_type!(VarInt, i32, read_varint, write_varint);
primitive_type!(VarLong, i64, read_varlong, write_varlong);
primitive_type!(Boolean, bool, read_bool, write_bool);
primitive_type!(Byte, i8, read_i8, write_i8);
primitive_type!(UnsignedByte, u8, read_u8, write_u8);
primitive_type!(Short, i16, read_i16, write_i16);
primitive_type!(UnsignedShort, u16, read_u16, write_u16);
primitive_type!(Int, i32, read_i32, write_i32);
primitive_type!(Long, i64, read_i64, write_i64);
primitive_type!(Float, f32, read_f32, write_f32);
primitive_type!(Double, f64, read_f64, write_f64);

/// Length-prefixed UTF-8 string.
pub struct WireString;

impl WireType for WireString {
    type Value = String;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<String> {
        buffer.read_string()
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &String) -> io::Result<()> {
        buffer.write_string(value);
        Ok(())
    }
}

/// 128-bit UUID as two big-endian longs.
pub struct WireUuid;

impl WireType for WireUuid {
    type Value = uuid::Uuid;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<uuid::Uuid> {
        buffer.read_uuid()
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &uuid::Uuid) -> io::Result<()> {
        buffer.write_uuid(*value);
        Ok(())
    }
}

/// Boolean-prefixed optional value. Field order is part of the format: the
/// flag byte always precedes the value.
pub struct Optional<T>(pub T);

impl<T: WireType> WireType for Optional<T> {
    type Value = Option<T::Value>;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Option<T::Value>> {
        if buffer.read_bool()? {
            Ok(Some(self.0.read(buffer)?))
        } else {
            Ok(None)
        }
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Option<T::Value>) -> io::Result<()> {
        match value {
            Some(inner) => {
                buffer.write_bool(true);
                self.0.write(buffer, inner)
            }
            None => {
                buffer.write_bool(false);
                Ok(())
            }
        }
    }
}

/// VarInt-count-prefixed homogeneous array.
pub struct VarIntArray<T>(pub T);

impl<T: WireType> WireType for VarIntArray<T> {
    type Value = Vec<T::Value>;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Vec<T::Value>> {
        let count = buffer.read_varint()?;
        if count < 0 || count as usize > buffer.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Array claims {} entries, {} bytes remain", count, buffer.remaining()),
            ));
        }
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(self.0.read(buffer)?);
        }
        Ok(values)
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Vec<T::Value>) -> io::Result<()> {
        buffer.write_varint(value.len() as i32);
        for entry in value {
            self.0.write(buffer, entry)?;
        }
        Ok(())
    }
}

/// VarInt-length-prefixed raw byte blob.
pub struct ByteArray;

impl WireType for ByteArray {
    type Value = Vec<u8>;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Vec<u8>> {
        let length = buffer.read_varint()?;
        if length < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Negative byte array length",
            ));
        }
        buffer.read_bytes(length as usize)
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Vec<u8>) -> io::Result<()> {
        buffer.write_varint(value.len() as i32);
        buffer.write_bytes(value);
        Ok(())
    }
}

/// Fixed-size 256-byte message signature.
pub struct SignatureBytes;

impl WireType for SignatureBytes {
    type Value = Vec<u8>;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Vec<u8>> {
        buffer.read_bytes(256)
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Vec<u8>) -> io::Result<()> {
        if value.len() != 256 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Signature must be exactly 256 bytes, got {}", value.len()),
            ));
        }
        buffer.write_bytes(value);
        Ok(())
    }
}

/// Every byte between the cursor and the end of the packet. Reading never
/// fails; an exhausted buffer yields an empty value.
pub struct RemainingBytes;

impl WireType for RemainingBytes {
    type Value = Vec<u8>;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Vec<u8>> {
        Ok(buffer.read_remaining())
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Vec<u8>) -> io::Result<()> {
        buffer.write_bytes(value);
        Ok(())
    }
}

/// A text component carried as a length-prefixed JSON string.
pub struct JsonText;

impl WireType for JsonText {
    type Value = serde_json::Value;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<serde_json::Value> {
        let raw = buffer.read_string()?;
        serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &serde_json::Value) -> io::Result<()> {
        buffer.write_string(&value.to_string());
        Ok(())
    }
}

/// A tag tree in network form: type id directly followed by the payload.
pub struct NetworkTag;

impl WireType for NetworkTag {
    type Value = Tag;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Tag> {
        Tag::read_network(buffer)
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Tag) -> io::Result<()> {
        value.write_network(buffer)
    }
}

/// A network tag where a lone TAG_End type id means "absent".
pub struct OptionalNetworkTag;

impl WireType for OptionalNetworkTag {
    type Value = Option<Tag>;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Option<Tag>> {
        match Tag::read_network(buffer)? {
            Tag::End => Ok(None),
            tag => Ok(Some(tag)),
        }
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Option<Tag>) -> io::Result<()> {
        match value {
            Some(tag) => tag.write_network(buffer),
            None => Tag::End.write_network(buffer),
        }
    }
}

/// VarInt-count-prefixed list of named root tags, each keeping its name so a
/// re-encode reproduces the original bytes.
pub struct NamedTagArray;

impl WireType for NamedTagArray {
    type Value = Vec<(String, Tag)>;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Vec<(String, Tag)>> {
        let count = buffer.read_varint()?;
        if count < 0 || count as usize > buffer.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Tag array claims {} entries, {} bytes remain", count, buffer.remaining()),
            ));
        }
        let mut tags = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tags.push(Tag::read(buffer)?);
        }
        Ok(tags)
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Vec<(String, Tag)>) -> io::Result<()> {
        buffer.write_varint(value.len() as i32);
        for (name, tag) in value {
            tag.write(buffer, name)?;
        }
        Ok(())
    }
}

/// An inventory slot: presence flag, then item id, count and attached tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStack {
    pub item_id: i32,
    pub amount: i8,
    pub tag: Option<Tag>,
}

pub struct Slot;

impl WireType for Slot {
    type Value = Option<ItemStack>;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<Option<ItemStack>> {
        if !buffer.read_bool()? {
            return Ok(None);
        }
        let item_id = buffer.read_varint()?;
        let amount = buffer.read_i8()?;
        let tag = OptionalNetworkTag.read(buffer)?;
        Ok(Some(ItemStack {
            item_id,
            amount,
            tag,
        }))
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &Option<ItemStack>) -> io::Result<()> {
        match value {
            None => {
                buffer.write_bool(false);
                Ok(())
            }
            Some(item) => {
                buffer.write_bool(true);
                buffer.write_varint(item.item_id);
                buffer.write_i8(item.amount);
                OptionalNetworkTag.write(buffer, &item.tag)
            }
        }
    }
}

/// A profile public key: expiry, then key and signature blobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileKey {
    pub expires_at: i64,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

pub struct ProfileKeyType;

impl WireType for ProfileKeyType {
    type Value = ProfileKey;

    fn read(&self, buffer: &mut PacketBuffer) -> io::Result<ProfileKey> {
        Ok(ProfileKey {
            expires_at: buffer.read_i64()?,
            public_key: ByteArray.read(buffer)?,
            signature: ByteArray.read(buffer)?,
        })
    }

    fn write(&self, buffer: &mut PacketBuffer, value: &ProfileKey) -> io::Result<()> {
        buffer.write_i64(value.expires_at);
        ByteArray.write(buffer, &value.public_key)?;
        ByteArray.write(buffer, &value.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn roundtrip<T: WireType>(ty: &T, value: T::Value) -> T::Value {
        let mut buffer = PacketBuffer::new();
        ty.write(&mut buffer, &value).unwrap();
        let mut buffer = PacketBuffer::from_bytes(buffer.into_bytes());
        let read = ty.read(&mut buffer).unwrap();
        assert_eq!(buffer.remaining(), 0, "codec left bytes behind");
        read
    }

    #[test]
    fn test_optional_roundtrip() {
        assert_eq!(roundtrip(&Optional(WireString), None), None);
        assert_eq!(
            roundtrip(&Optional(WireString), Some("hi".to_string())),
            Some("hi".to_string())
        );
    }

    #[test]
    fn test_var_int_array_roundtrip() {
        let values = vec![1, 127, 128, -1];
        assert_eq!(roundtrip(&VarIntArray(VarInt), values.clone()), values);
    }

    #[test]
    fn test_var_int_array_overrun_is_rejected() {
        let mut buffer = PacketBuffer::new();
        buffer.write_varint(1000); // Claims far more entries than bytes remain
        buffer.write_varint(1);
        let mut buffer = PacketBuffer::from_bytes(buffer.into_bytes());
        assert!(VarIntArray(VarInt).read(&mut buffer).is_err());
    }

    #[test]
    fn test_json_text_roundtrip() {
        let value = serde_json::json!({"text": "hello", "bold": true});
        assert_eq!(roundtrip(&JsonText, value.clone()), value);
    }

    #[test]
    fn test_optional_network_tag() {
        assert_eq!(roundtrip(&OptionalNetworkTag, None), None);

        let mut map = IndexMap::new();
        map.insert("text".to_string(), Tag::String("hi".to_string()));
        let tag = Tag::Compound(map);
        assert_eq!(roundtrip(&OptionalNetworkTag, Some(tag.clone())), Some(tag));
    }

    #[test]
    fn test_named_tag_array_keeps_names() {
        let mut map = IndexMap::new();
        map.insert("id".to_string(), Tag::String("minecraft:chest".to_string()));
        let tags = vec![("".to_string(), Tag::Compound(map))];
        assert_eq!(roundtrip(&NamedTagArray, tags.clone()), tags);
    }

    #[test]
    fn test_slot_roundtrip() {
        assert_eq!(roundtrip(&Slot, None), None);

        let item = ItemStack {
            item_id: 276,
            amount: 1,
            tag: None,
        };
        assert_eq!(roundtrip(&Slot, Some(item.clone())), Some(item));
    }

    #[test]
    fn test_signature_bytes_rejects_wrong_length() {
        let mut buffer = PacketBuffer::new();
        assert!(SignatureBytes.write(&mut buffer, &vec![0u8; 17]).is_err());
        assert!(SignatureBytes.write(&mut buffer, &vec![0u8; 256]).is_ok());
    }
}
