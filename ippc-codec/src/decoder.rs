//! Tag-dispatch decoder

use crate::reconstruct;
use crate::registry;
use crate::tags::{split_tag, DecodedTag, SizeClass, TypeTag};
use crate::RECURSION_LIMIT;
use bytes::Bytes;
use ippc_core::{Complex, Map, PackError, PackResult, Set, Value};

/// Decoder for the self-describing wire format.
///
/// Holds a read cursor over a message body and rebuilds one value per
/// [`Decoder::decode_value`] call. Reading past the declared end fails
/// with [`PackError::OutOfInput`] and the partial value is discarded.
/// Container lengths are capped against the remaining input before any
/// allocation, so a forged length cannot reserve more than the message
/// itself could hold.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder over a message body.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            depth: 0,
        }
    }

    /// Sub-decoder continuing at the caller's nesting depth.
    pub(crate) fn with_depth(buf: &'a [u8], depth: usize) -> Self {
        Self { buf, pos: 0, depth }
    }

    /// Decode one value.
    pub fn decode_value(&mut self) -> PackResult<Value> {
        let tag = self.read_byte()?;
        match split_tag(tag)? {
            DecodedTag::Plain(kind) => self.decode_plain(kind),
            DecodedTag::Sized(kind, size) => {
                let len = self.read_len(size)?;
                self.decode_sized(kind, len)
            }
        }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the declared end.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn enter(&mut self, context: &'static str) -> PackResult<()> {
        if self.depth >= RECURSION_LIMIT {
            return Err(PackError::RecursionLimit(context));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn read_byte(&mut self) -> PackResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_bytes(&mut self, n: usize) -> PackResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(PackError::OutOfInput)?;
        if end > self.buf.len() {
            return Err(PackError::OutOfInput);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read a length field as a signed little-endian integer of the
    /// given width. Negative lengths are rejected.
    fn read_len(&mut self, size: SizeClass) -> PackResult<usize> {
        let b = self.read_bytes(size.width())?;
        let len = match size {
            SizeClass::One => i8::from_le_bytes([b[0]]) as i64,
            SizeClass::Two => i16::from_le_bytes([b[0], b[1]]) as i64,
            SizeClass::Four => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
            SizeClass::Eight => {
                i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
        };
        if len < 0 {
            return Err(PackError::InvalidLength(len));
        }
        usize::try_from(len).map_err(|_| PackError::InvalidLength(len))
    }

    fn decode_plain(&mut self, kind: TypeTag) -> PackResult<Value> {
        match kind {
            TypeTag::Int1 => {
                let b = self.read_bytes(1)?;
                Ok(Value::Int(i8::from_le_bytes([b[0]]) as i64))
            }
            TypeTag::Int2 => {
                let b = self.read_bytes(2)?;
                Ok(Value::Int(i16::from_le_bytes([b[0], b[1]]) as i64))
            }
            TypeTag::Int4 => {
                let b = self.read_bytes(4)?;
                Ok(Value::Int(
                    i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64
                ))
            }
            TypeTag::Int8 => {
                let b = self.read_bytes(8)?;
                Ok(Value::Int(i64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ])))
            }
            TypeTag::UInt => {
                let b = self.read_bytes(8)?;
                Ok(Value::from(u64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ])))
            }
            TypeTag::Float => Ok(Value::Float(self.read_f64()?)),
            TypeTag::Complex => {
                let re = self.read_f64()?;
                let im = self.read_f64()?;
                Ok(Value::Complex(Complex::new(re, im)))
            }
            TypeTag::Unit => Ok(Value::Unit),
            TypeTag::True => Ok(Value::Bool(true)),
            TypeTag::False => Ok(Value::Bool(false)),
            other => Err(PackError::InvalidTag(other.base())),
        }
    }

    fn read_f64(&mut self) -> PackResult<f64> {
        let b = self.read_bytes(8)?;
        let bits = u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
        Ok(f64::from_bits(bits))
    }

    fn decode_sized(&mut self, kind: TypeTag, len: usize) -> PackResult<Value> {
        match kind {
            TypeTag::Str => {
                let bytes = self.read_bytes(len)?;
                let text = String::from_utf8(bytes.to_vec())?;
                Ok(Value::Text(text))
            }
            TypeTag::Bytes => Ok(Value::Bytes(Bytes::copy_from_slice(self.read_bytes(len)?))),
            TypeTag::ByteArray => Ok(Value::ByteArray(self.read_bytes(len)?.to_vec())),
            TypeTag::Tuple => self
                .decode_sequence(len, "unpacking a tuple")
                .map(Value::Tuple),
            TypeTag::List => self
                .decode_sequence(len, "unpacking a list")
                .map(Value::List),
            TypeTag::Dict => self.decode_map(len),
            TypeTag::Set => self.decode_anyset(len, "unpacking a set").map(Value::Set),
            TypeTag::FrozenSet => self
                .decode_anyset(len, "unpacking a frozenset")
                .map(Value::FrozenSet),
            TypeTag::Class => self.decode_class(len),
            TypeTag::Singleton => self.decode_singleton(len),
            TypeTag::Instance => self.decode_instance(len),
            other => Err(PackError::InvalidTag(other.base())),
        }
    }

    fn decode_sequence(&mut self, len: usize, context: &'static str) -> PackResult<Vec<Value>> {
        self.enter(context)?;
        let result = self.decode_sequence_items(len);
        self.leave();
        result
    }

    fn decode_sequence_items(&mut self, len: usize) -> PackResult<Vec<Value>> {
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.decode_value()?);
        }
        Ok(items)
    }

    fn decode_map(&mut self, len: usize) -> PackResult<Value> {
        self.enter("unpacking a map")?;
        let result = self.decode_map_entries(len);
        self.leave();
        result
    }

    fn decode_map_entries(&mut self, len: usize) -> PackResult<Value> {
        let mut map = Map::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            let key = self.decode_value()?;
            let value = self.decode_value()?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    fn decode_anyset(&mut self, len: usize, context: &'static str) -> PackResult<Set> {
        self.enter(context)?;
        let result = self.decode_set_items(len);
        self.leave();
        result
    }

    fn decode_set_items(&mut self, len: usize) -> PackResult<Set> {
        let mut set = Set::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            set.insert(self.decode_value()?);
        }
        Ok(set)
    }

    fn decode_class(&mut self, len: usize) -> PackResult<Value> {
        let identity = self.read_bytes(len)?;
        match registry::lookup(identity) {
            Some(entry) => Ok(entry.to_value()),
            None => Err(class_miss(identity)),
        }
    }

    fn decode_singleton(&mut self, len: usize) -> PackResult<Value> {
        let identity = self.read_bytes(len)?;
        match registry::lookup(identity) {
            Some(entry) => Ok(entry.to_value()),
            None => Err(singleton_miss(identity)),
        }
    }

    fn decode_instance(&mut self, len: usize) -> PackResult<Value> {
        let inner = self.read_bytes(len)?;
        let mut sub = Decoder::with_depth(inner, self.depth);
        let reduction = sub.decode_value()?;
        reconstruct::rebuild(reduction)
    }
}

fn identity_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Re-decode a missed class identity purely for the error message.
fn class_miss(identity: &[u8]) -> PackError {
    let mut ident = Decoder::new(identity);
    let module = match ident.decode_value() {
        Ok(value) => value,
        Err(err) => return err,
    };
    let qualname = match ident.decode_value() {
        Ok(value) => identity_text(&value),
        Err(err) => return err,
    };
    match module {
        Value::Text(module) if module == "builtins" => {
            PackError::UnknownIdentity(format!("<class '{}'>", qualname))
        }
        module => {
            PackError::UnknownIdentity(format!("<class '{}.{}'>", identity_text(&module), qualname))
        }
    }
}

/// Re-decode a missed singleton identity purely for the error message.
fn singleton_miss(identity: &[u8]) -> PackError {
    let mut ident = Decoder::new(identity);
    match ident.decode_value() {
        Ok(name) => PackError::UnknownIdentity(format!("'{}'", identity_text(&name))),
        Err(err) => err,
    }
}
