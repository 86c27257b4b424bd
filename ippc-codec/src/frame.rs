//! Outer message framing
//!
//! A framed message is `size_class_byte | body_length | body`. A reader
//! takes the first byte, reads that many more bytes to learn the body
//! length, then reads the body; the length field reuses the codec's
//! little-endian signed size-class convention.

use crate::buffer::MsgBuf;
use crate::tags::SizeClass;
use ippc_core::{PackError, PackResult};

/// Wrap an already-packed body with its length prefix.
pub(crate) fn frame(body: &[u8]) -> PackResult<MsgBuf> {
    let len = i64::try_from(body.len()).map_err(|_| PackError::IntegerOverflow)?;
    let size = SizeClass::for_len(len);
    let total = body
        .len()
        .checked_add(1 + size.width())
        .ok_or(PackError::Allocation)?;
    let mut msg = MsgBuf::with_capacity(total)?;
    let field = len.to_le_bytes();
    msg.append_byte(size.width() as u8)?;
    msg.append2(&field[..size.width()], body)?;
    log::trace!("framed {} byte body", body.len());
    Ok(msg)
}

/// Decode a body length from a frame prefix of 1, 2, 4 or 8 bytes.
pub fn size(prefix: &[u8]) -> PackResult<i64> {
    match prefix.len() {
        1 => Ok(i8::from_le_bytes([prefix[0]]) as i64),
        2 => Ok(i16::from_le_bytes([prefix[0], prefix[1]]) as i64),
        4 => Ok(i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as i64),
        8 => Ok(i64::from_le_bytes([
            prefix[0], prefix[1], prefix[2], prefix[3], prefix[4], prefix[5], prefix[6],
            prefix[7],
        ])),
        n => Err(PackError::InvalidLength(n as i64)),
    }
}
