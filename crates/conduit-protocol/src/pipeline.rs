//! Per-packet field pipeline: an ordered list of steps pulling typed values
//! from the source packet and pushing re-encoded values into the destination
//! packet. Declarative field lists and free-form handler functions run
//! through the same step dispatch.

use crate::buffer::PacketBuffer;
use crate::registry::Connection;
use crate::types::{
    Boolean, Byte, Double, Float, Int, Long, Short, UnsignedByte, UnsignedShort, VarInt, VarLong,
    WireString, WireType, WireUuid,
};
use conduit_common::{Diagnostics, TranslateError};

/// Wire shape of a declaratively copied field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    VarInt,
    VarLong,
    Bool,
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    Long,
    Float,
    Double,
    String,
    Uuid,
}

/// A value produced by a declarative step.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    VarInt(i32),
    VarLong(i64),
    Bool(bool),
    Byte(i8),
    UnsignedByte(u8),
    Short(i16),
    UnsignedShort(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Uuid(uuid::Uuid),
}

impl FieldValue {
    fn as_integral(&self) -> Option<i64> {
        match self {
            FieldValue::VarInt(v) | FieldValue::Int(v) => Some(i64::from(*v)),
            FieldValue::VarLong(v) | FieldValue::Long(v) => Some(*v),
            FieldValue::Byte(v) => Some(i64::from(*v)),
            FieldValue::UnsignedByte(v) => Some(i64::from(*v)),
            FieldValue::Short(v) => Some(i64::from(*v)),
            FieldValue::UnsignedShort(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(f64::from(*v)),
            FieldValue::Double(v) => Some(*v),
            _ => self.as_integral().map(|v| v as f64),
        }
    }
}

impl FieldKind {
    fn read(self, source: &mut PacketBuffer) -> Result<FieldValue, TranslateError> {
        self.read_wire(source).map_err(TranslateError::from_wire)
    }

    fn read_wire(self, source: &mut PacketBuffer) -> std::io::Result<FieldValue> {
        let value = match self {
            FieldKind::VarInt => FieldValue::VarInt(VarInt.read(source)?),
            FieldKind::VarLong => FieldValue::VarLong(VarLong.read(source)?),
            FieldKind::Bool => FieldValue::Bool(Boolean.read(source)?),
            FieldKind::Byte => FieldValue::Byte(Byte.read(source)?),
            FieldKind::UnsignedByte => FieldValue::UnsignedByte(UnsignedByte.read(source)?),
            FieldKind::Short => FieldValue::Short(Short.read(source)?),
            FieldKind::UnsignedShort => FieldValue::UnsignedShort(UnsignedShort.read(source)?),
            FieldKind::Int => FieldValue::Int(Int.read(source)?),
            FieldKind::Long => FieldValue::Long(Long.read(source)?),
            FieldKind::Float => FieldValue::Float(Float.read(source)?),
            FieldKind::Double => FieldValue::Double(Double.read(source)?),
            FieldKind::String => FieldValue::String(WireString.read(source)?),
            FieldKind::Uuid => FieldValue::Uuid(WireUuid.read(source)?),
        };
        Ok(value)
    }

    fn write(self, dest: &mut PacketBuffer, value: &FieldValue) -> Result<(), TranslateError> {
        match self {
            FieldKind::VarInt => VarInt.write(dest, &(self.integral_of(value)? as i32))?,
            FieldKind::VarLong => VarLong.write(dest, &self.integral_of(value)?)?,
            FieldKind::Bool => match value {
                FieldValue::Bool(v) => Boolean.write(dest, v)?,
                other => return Err(retype_mismatch(self, other)),
            },
            FieldKind::Byte => Byte.write(dest, &(self.integral_of(value)? as i8))?,
            FieldKind::UnsignedByte => UnsignedByte.write(dest, &(self.integral_of(value)? as u8))?,
            FieldKind::Short => Short.write(dest, &(self.integral_of(value)? as i16))?,
            FieldKind::UnsignedShort => {
                UnsignedShort.write(dest, &(self.integral_of(value)? as u16))?
            }
            FieldKind::Int => Int.write(dest, &(self.integral_of(value)? as i32))?,
            FieldKind::Long => Long.write(dest, &self.integral_of(value)?)?,
            FieldKind::Float => Float.write(dest, &(self.float_of(value)? as f32))?,
            FieldKind::Double => Double.write(dest, &self.float_of(value)?)?,
            FieldKind::String => match value {
                FieldValue::String(v) => WireString.write(dest, v)?,
                other => return Err(retype_mismatch(self, other)),
            },
            FieldKind::Uuid => match value {
                FieldValue::Uuid(v) => WireUuid.write(dest, v)?,
                other => return Err(retype_mismatch(self, other)),
            },
        }
        Ok(())
    }

    fn integral_of(self, value: &FieldValue) -> Result<i64, TranslateError> {
        value
            .as_integral()
            .ok_or_else(|| retype_mismatch(self, value))
    }

    fn float_of(self, value: &FieldValue) -> Result<f64, TranslateError> {
        value.as_float().ok_or_else(|| retype_mismatch(self, value))
    }
}

fn retype_mismatch(kind: FieldKind, value: &FieldValue) -> TranslateError {
    TranslateError::MalformedPacket(format!("Cannot write {:?} as {:?}", value, kind))
}

/// Cursor pair for one packet in flight: fields not yet consumed on the
/// source side, bytes already re-encoded on the destination side.
pub struct Translation<'a> {
    source: &'a mut PacketBuffer,
    dest: &'a mut PacketBuffer,
    connection: &'a mut Connection,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> Translation<'a> {
    pub fn new(
        source: &'a mut PacketBuffer,
        dest: &'a mut PacketBuffer,
        connection: &'a mut Connection,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            source,
            dest,
            connection,
            diagnostics,
        }
    }

    /// Reads a value from the source packet without re-encoding it.
    pub fn read<T: WireType>(&mut self, ty: T) -> Result<T::Value, TranslateError> {
        ty.read(self.source).map_err(TranslateError::from_wire)
    }

    /// Appends a value to the destination packet.
    pub fn write<T: WireType>(&mut self, ty: T, value: &T::Value) -> Result<(), TranslateError> {
        ty.write(self.dest, value).map_err(TranslateError::from_wire)
    }

    /// Copies one field unchanged and returns it, so handlers can branch on
    /// values such as counts and flags.
    pub fn passthrough<T: WireType>(&mut self, ty: T) -> Result<T::Value, TranslateError> {
        let value = self.read(&ty)?;
        self.write(&ty, &value)?;
        Ok(value)
    }

    pub fn source(&mut self) -> &mut PacketBuffer {
        self.source
    }

    pub fn dest(&mut self) -> &mut PacketBuffer {
        self.dest
    }

    pub fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    pub fn diagnostics(&self) -> &dyn Diagnostics {
        self.diagnostics
    }

    /// Splits the translation into source cursor, destination cursor and
    /// diagnostics handle, for codecs that drive all three at once.
    pub fn io(&mut self) -> (&mut PacketBuffer, &mut PacketBuffer, &dyn Diagnostics) {
        (self.source, self.dest, self.diagnostics)
    }
}

pub type StepFn = Box<dyn Fn(&mut Translation<'_>) -> Result<(), TranslateError> + Send + Sync>;

/// One pipeline step. All three flavors execute through the same dispatch in
/// [`Pipeline::run`].
pub enum Step {
    /// Read a field of the given shape and re-encode it unchanged.
    Copy(FieldKind),
    /// Read with one shape, write with another. The semantic value carries
    /// over; only the on-wire representation changes.
    Retype(FieldKind, FieldKind),
    /// Free-form handler with full access to both cursors.
    Custom(StepFn),
}

/// The ordered steps translating one packet kind.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn copy(mut self, kind: FieldKind) -> Self {
        self.steps.push(Step::Copy(kind));
        self
    }

    pub fn retype(mut self, from: FieldKind, to: FieldKind) -> Self {
        self.steps.push(Step::Retype(from, to));
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Translation<'_>) -> Result<(), TranslateError> + Send + Sync + 'static,
    {
        self.steps.push(Step::Custom(Box::new(handler)));
        self
    }

    /// Executes the steps in registration order, then copies any unread
    /// source bytes through verbatim. Returns the trailing byte count.
    ///
    /// A failing step aborts the packet; the caller discards the partial
    /// destination buffer, so no bytes are truncated or duplicated.
    pub fn run(&self, translation: &mut Translation<'_>) -> Result<usize, TranslateError> {
        for step in &self.steps {
            match step {
                Step::Copy(kind) => {
                    let value = kind.read(translation.source)?;
                    kind.write(translation.dest, &value)?;
                }
                Step::Retype(from, to) => {
                    let value = from.read(translation.source)?;
                    to.write(translation.dest, &value)?;
                }
                Step::Custom(handler) => handler(translation)?,
            }
        }

        // Trailing overflow: fields this pipeline's schema does not model.
        // Tolerated, copied through, and reported.
        let trailing = translation.source.read_remaining();
        if !trailing.is_empty() {
            translation.dest.write_bytes(&trailing);
            translation.diagnostics.debug(format!(
                "Copied {} trailing bytes through untranslated",
                trailing.len()
            ));
        }
        Ok(trailing.len())
    }
}
