//! Kind-dispatch encoder

use crate::buffer::MsgBuf;
use crate::tags::{SizeClass, TypeTag, INT1_MIN, INT2_MIN, INT4_MIN};
use crate::RECURSION_LIMIT;
use bytes::Bytes;
use ippc_core::{ClassSpec, Instance, Map, PackError, PackResult, Reduction, Set, Value};

/// Encoder for the self-describing wire format.
///
/// Walks a value tree and emits `tag | payload` for every node, picking
/// the narrowest integer and length widths as it goes. Recursive kinds
/// are bounded by [`RECURSION_LIMIT`]; identity and instance payloads
/// are built in scratch encoders that share the ambient depth so nesting
/// cannot hide inside them.
#[derive(Debug, Default)]
pub struct Encoder {
    msg: MsgBuf,
    depth: usize,
}

impl Encoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self {
            msg: MsgBuf::new(),
            depth: 0,
        }
    }

    /// Scratch encoder continuing at the caller's nesting depth.
    pub(crate) fn with_depth(depth: usize) -> Self {
        Self {
            msg: MsgBuf::new(),
            depth,
        }
    }

    /// Encode one value, appending to the message body.
    pub fn pack_value(&mut self, value: &Value) -> PackResult<()> {
        match value {
            Value::Unit => self.pack_tag(TypeTag::Unit),
            Value::Bool(true) => self.pack_tag(TypeTag::True),
            Value::Bool(false) => self.pack_tag(TypeTag::False),
            Value::Int(i) => self.pack_int(*i),
            Value::UInt(u) => match i64::try_from(*u) {
                Ok(i) => self.pack_int(i),
                Err(_) => self.pack_fixed(TypeTag::UInt, &u.to_le_bytes()),
            },
            Value::Float(f) => self.pack_fixed(TypeTag::Float, &f.to_bits().to_le_bytes()),
            Value::Complex(c) => {
                self.pack_tag(TypeTag::Complex)?;
                self.msg.append2(
                    &c.re.to_bits().to_le_bytes(),
                    &c.im.to_bits().to_le_bytes(),
                )
            }
            Value::Text(s) => self.pack_text(s),
            Value::Bytes(b) => self.pack_data(TypeTag::Bytes, b),
            Value::ByteArray(b) => self.pack_data(TypeTag::ByteArray, b),
            Value::Tuple(items) => self.pack_sequence(TypeTag::Tuple, items, "packing a tuple"),
            Value::List(items) => self.pack_sequence(TypeTag::List, items, "packing a list"),
            Value::Map(map) => self.pack_map(map),
            Value::Set(set) => self.pack_anyset(TypeTag::Set, set, "packing a set"),
            Value::FrozenSet(set) => {
                self.pack_anyset(TypeTag::FrozenSet, set, "packing a frozenset")
            }
            Value::Class(class) => self.pack_class(class),
            Value::Singleton(s) => self.pack_singleton(s.name()),
            Value::Instance(inst) => self.pack_instance(inst),
        }
    }

    /// The bytes encoded so far.
    pub fn as_slice(&self) -> &[u8] {
        self.msg.as_slice()
    }

    /// Hand the encoded body out as an immutable byte string.
    pub fn finish(self) -> Bytes {
        self.msg.freeze()
    }

    /// Hand the backing buffer out (the framer's path).
    pub(crate) fn into_msg(self) -> MsgBuf {
        self.msg
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

    fn pack_tag(&mut self, tag: TypeTag) -> PackResult<()> {
        self.msg.append_byte(tag.base())
    }

    fn pack_fixed(&mut self, tag: TypeTag, payload: &[u8]) -> PackResult<()> {
        self.msg.append2(&[tag.base()], payload)
    }

    /// Emit `tag|size_class` and the length field itself.
    fn pack_len(&mut self, tag: TypeTag, len: usize) -> PackResult<()> {
        let len = i64::try_from(len).map_err(|_| PackError::IntegerOverflow)?;
        let size = SizeClass::for_len(len);
        let field = len.to_le_bytes();
        self.msg
            .append2(&[tag.base() | size.width() as u8], &field[..size.width()])
    }

    fn pack_data(&mut self, tag: TypeTag, data: &[u8]) -> PackResult<()> {
        self.pack_len(tag, data.len())?;
        self.msg.append(data)
    }

    pub(crate) fn pack_text(&mut self, text: &str) -> PackResult<()> {
        self.pack_data(TypeTag::Str, text.as_bytes())
    }

    /// Narrowest signed encoding. The negative side fills each width to
    /// its two's-complement minimum; the positive side widens already at
    /// the signed maximum (126 is the largest 1-byte positive value).
    fn pack_int(&mut self, value: i64) -> PackResult<()> {
        if value < 0 {
            if value < INT2_MIN {
                if value < INT4_MIN {
                    self.pack_fixed(TypeTag::Int8, &value.to_le_bytes())
                } else {
                    self.pack_fixed(TypeTag::Int4, &(value as i32).to_le_bytes())
                }
            } else if value < INT1_MIN {
                self.pack_fixed(TypeTag::Int2, &(value as i16).to_le_bytes())
            } else {
                self.pack_fixed(TypeTag::Int1, &(value as i8).to_le_bytes())
            }
        } else if value < i16::MAX as i64 {
            if value < i8::MAX as i64 {
                self.pack_fixed(TypeTag::Int1, &(value as i8).to_le_bytes())
            } else {
                self.pack_fixed(TypeTag::Int2, &(value as i16).to_le_bytes())
            }
        } else if value < i32::MAX as i64 {
            self.pack_fixed(TypeTag::Int4, &(value as i32).to_le_bytes())
        } else {
            self.pack_fixed(TypeTag::Int8, &value.to_le_bytes())
        }
    }

    fn pack_sequence(
        &mut self,
        tag: TypeTag,
        items: &[Value],
        context: &'static str,
    ) -> PackResult<()> {
        self.enter(context)?;
        let result = self.pack_sequence_items(tag, items);
        self.leave();
        result
    }

    fn pack_sequence_items(&mut self, tag: TypeTag, items: &[Value]) -> PackResult<()> {
        self.pack_len(tag, items.len())?;
        for item in items {
            self.pack_value(item)?;
        }
        Ok(())
    }

    fn pack_map(&mut self, map: &Map) -> PackResult<()> {
        self.enter("packing a map")?;
        let result = self.pack_map_entries(map);
        self.leave();
        result
    }

    fn pack_map_entries(&mut self, map: &Map) -> PackResult<()> {
        self.pack_len(TypeTag::Dict, map.len())?;
        for (key, value) in map.iter() {
            self.pack_value(key)?;
            self.pack_value(value)?;
        }
        Ok(())
    }

    fn pack_anyset(&mut self, tag: TypeTag, set: &Set, context: &'static str) -> PackResult<()> {
        self.enter(context)?;
        let result = self.pack_set_items(tag, set);
        self.leave();
        result
    }

    fn pack_set_items(&mut self, tag: TypeTag, set: &Set) -> PackResult<()> {
        self.pack_len(tag, set.len())?;
        for item in set.iter() {
            self.pack_value(item)?;
        }
        Ok(())
    }

    fn pack_class(&mut self, class: &ClassSpec) -> PackResult<()> {
        let mut ident = Encoder::with_depth(self.depth);
        ident.pack_text(class.module())?;
        ident.pack_text(class.qualname())?;
        self.pack_data(TypeTag::Class, ident.as_slice())
    }

    fn pack_singleton(&mut self, name: &str) -> PackResult<()> {
        let mut ident = Encoder::with_depth(self.depth);
        ident.pack_text(name)?;
        self.pack_data(TypeTag::Singleton, ident.as_slice())
    }

    fn pack_instance(&mut self, inst: &Instance) -> PackResult<()> {
        let Some(reduction) = inst.reduce() else {
            return Err(PackError::Unencodable(inst.type_name().to_string()));
        };
        match reduction {
            Reduction::Singleton(name) => self.pack_singleton(&name),
            Reduction::Construct {
                class,
                args,
                state,
                extend,
                update,
            } => {
                let mut items = vec![Value::Class(class), Value::Tuple(args)];
                let mut tail = vec![state, extend, update];
                while matches!(tail.last(), Some(None)) {
                    tail.pop();
                }
                for slot in tail {
                    items.push(slot.unwrap_or(Value::Unit));
                }
                let mut inner = Encoder::with_depth(self.depth);
                inner.pack_sequence(TypeTag::Tuple, &items, "packing an instance")?;
                self.pack_data(TypeTag::Instance, inner.as_slice())
            }
        }
    }
}
