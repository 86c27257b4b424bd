//! Self-describing binary wire codec for the ippc value model
//!
//! Values are encoded as a tag byte followed by a payload; length-bearing
//! kinds carry the width of their length field in the tag's low nibble,
//! always the smallest width that fits. Classes and singletons travel as
//! registered identities, arbitrary objects as reconstruction tuples.
//!
//! The public operations are:
//!
//! - [`register`]: add a class or singleton to the identity registry
//! - [`pack`]: encode a value into a message body
//! - [`encode`]: encode a value into a framed message
//! - [`unpack`]: decode a message body back into a value
//! - [`size`]: decode a body length from a frame prefix

pub mod buffer;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod registry;
pub mod tags;

mod reconstruct;

pub use buffer::MsgBuf;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use registry::Registered;

use bytes::Bytes;
use ippc_core::{PackResult, Value};

/// Nesting bound shared by the encoder and the decoder.
pub const RECURSION_LIMIT: usize = 1000;

/// Encode a value into a message body (no outer frame).
pub fn pack(value: &Value) -> PackResult<Bytes> {
    let mut encoder = Encoder::new();
    encoder.pack_value(value)?;
    Ok(encoder.finish())
}

/// Encode a value into a framed message ready for a stream transport.
pub fn encode(value: &Value) -> PackResult<Bytes> {
    let mut encoder = Encoder::new();
    encoder.pack_value(value)?;
    let body = encoder.into_msg();
    Ok(frame::frame(body.as_slice())?.freeze())
}

/// Decode one value from a message body.
pub fn unpack(bytes: &[u8]) -> PackResult<Value> {
    Decoder::new(bytes).decode_value()
}

/// Decode a framed body length from a 1, 2, 4 or 8-byte prefix.
pub fn size(prefix: &[u8]) -> PackResult<i64> {
    frame::size(prefix)
}

/// Add a class or singleton to the process-wide identity registry.
pub fn register(entry: impl Into<Registered>) -> PackResult<()> {
    registry::register(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ippc_core::{
        ClassSpec, Complex, Instance, PackError, Reduction, Transmissible, NOT_IMPLEMENTED,
    };
    use rand::Rng;
    use std::sync::Arc;

    struct Point {
        x: i64,
        y: i64,
    }

    impl Transmissible for Point {
        fn type_name(&self) -> &'static str {
            "Point"
        }

        fn reduce(&self) -> Option<Reduction> {
            Some(Reduction::construct(
                point_class(),
                vec![Value::Int(self.x), Value::Int(self.y)],
            ))
        }
    }

    fn make_point(args: &[Value]) -> PackResult<Box<dyn Transmissible>> {
        match args {
            [Value::Int(x), Value::Int(y)] => Ok(Box::new(Point { x: *x, y: *y })),
            _ => Err(PackError::BadReconstruction(
                "Point takes two ints".to_string(),
            )),
        }
    }

    fn point_class() -> Arc<ClassSpec> {
        ClassSpec::new("geo.shapes", "Point", make_point)
    }

    #[test]
    fn test_encode_unit_scenario() {
        assert_eq!(encode(&Value::Unit).unwrap().as_ref(), &[0x01, 0x01, 0x21]);
        assert_eq!(size(&[0x01]).unwrap(), 1);
    }

    #[test]
    fn test_frame_wraps_pack() {
        let value = Value::List(vec![
            Value::Text("framing".into()),
            Value::Int(12345),
            Value::Complex(Complex::new(0.5, -0.5)),
        ]);
        let body = pack(&value).unwrap();
        let framed = encode(&value).unwrap();

        let width = framed[0] as usize;
        assert_eq!(
            size(&framed[1..1 + width]).unwrap(),
            i64::try_from(body.len()).unwrap()
        );
        assert_eq!(&framed[1 + width..], body.as_ref());
    }

    #[test]
    fn test_not_implemented_round_trip() {
        let value = Value::Singleton(Arc::clone(&NOT_IMPLEMENTED));
        let bytes = pack(&value).unwrap();
        assert_eq!(bytes[0], 0xe1);
        assert_eq!(unpack(&bytes).unwrap(), value);
    }

    #[test]
    fn test_registered_class_round_trip() {
        register(point_class()).unwrap();
        let value = Value::Class(point_class());
        assert_eq!(unpack(&pack(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_registered_instance_round_trip() {
        register(point_class()).unwrap();
        let value = Value::Instance(Instance::new(Point { x: 3, y: -4 }));
        let bytes = pack(&value).unwrap();
        assert_eq!(bytes[0] & 0xf0, 0xf0);
        assert_eq!(unpack(&bytes).unwrap(), value);
    }

    #[test]
    fn test_scalar_packing_is_deterministic() {
        let values = [
            Value::Int(-77),
            Value::Float(3.25),
            Value::Text("same".into()),
            Value::Bytes(bytes::Bytes::from_static(b"abc")),
        ];
        for value in values {
            assert_eq!(pack(&value).unwrap(), pack(&value).unwrap());
        }
    }

    fn random_value(rng: &mut impl Rng, depth: usize) -> Value {
        let top = if depth == 0 { 8 } else { 11 };
        match rng.gen_range(0..top) {
            0 => Value::Unit,
            1 => Value::Bool(rng.gen_bool(0.5)),
            2 => Value::Int(rng.gen_range(i64::MIN..=i64::MAX)),
            3 => Value::UInt(rng.gen_range(0..=u64::MAX)),
            4 => Value::Float(rng.gen_range(-1.0e9..1.0e9)),
            5 => Value::Complex(Complex::new(
                rng.gen_range(-1.0e9..1.0e9),
                rng.gen_range(-1.0e9..1.0e9),
            )),
            6 => {
                let len = rng.gen_range(0..16);
                let text: String = (0..len)
                    .map(|_| rng.gen_range(b'a'..=b'z') as char)
                    .collect();
                Value::Text(text)
            }
            7 => {
                let len = rng.gen_range(0..16);
                let data: Vec<u8> = (0..len).map(|_| rng.gen_range(0..=u8::MAX)).collect();
                Value::ByteArray(data)
            }
            8 => {
                let len = rng.gen_range(0..4);
                Value::List((0..len).map(|_| random_value(rng, depth - 1)).collect())
            }
            9 => {
                let len = rng.gen_range(0..4);
                Value::Tuple((0..len).map(|_| random_value(rng, depth - 1)).collect())
            }
            _ => {
                let len = rng.gen_range(0..4);
                Value::Map(
                    (0..len)
                        .map(|i| (Value::Int(i), random_value(rng, depth - 1)))
                        .collect(),
                )
            }
        }
    }

    #[test]
    fn test_randomized_round_trips() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let value = random_value(&mut rng, 3);
            let bytes = pack(&value).unwrap();
            assert_eq!(unpack(&bytes).unwrap(), value, "value: {}", value);
        }
    }
}
