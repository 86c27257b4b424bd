//! Growable message buffer

use bytes::Bytes;
use ippc_core::{PackError, PackResult};

/// Initial allocation granularity.
const MIN_ALLOC: usize = 32;

/// Append-only byte buffer backing the encoder.
///
/// Growth doubles the current capacity (or jumps straight to the needed
/// size, whichever is larger), rounded up to a multiple of 8 with a
/// 32-byte floor. All allocation goes through `try_reserve_exact`, so
/// running out of memory surfaces as [`PackError::Allocation`] instead
/// of aborting. Size arithmetic that overflows is reported the same way.
///
/// The buffer also keeps a movable start so a transport can peel
/// consumed bytes off the front with [`MsgBuf::drain`]; the codec itself
/// only ever appends.
#[derive(Debug, Default)]
pub struct MsgBuf {
    data: Vec<u8>,
    start: usize,
}

impl MsgBuf {
    /// Construct an empty buffer.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            start: 0,
        }
    }

    /// Construct an empty buffer pre-grown for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> PackResult<Self> {
        let mut buf = Self::new();
        buf.grow(capacity)?;
        Ok(buf)
    }

    /// Ensure room for `additional` more bytes.
    fn grow(&mut self, additional: usize) -> PackResult<()> {
        let needed = self
            .data
            .len()
            .checked_add(additional)
            .ok_or(PackError::Allocation)?;
        if needed > self.data.capacity() {
            let target = needed
                .max(self.data.capacity().saturating_mul(2))
                .max(MIN_ALLOC)
                .checked_add(7)
                .ok_or(PackError::Allocation)?
                & !7;
            self.data
                .try_reserve_exact(target - self.data.len())
                .map_err(|_| PackError::Allocation)?;
        }
        Ok(())
    }

    /// Append a single byte.
    pub fn append_byte(&mut self, byte: u8) -> PackResult<()> {
        self.grow(1)?;
        self.data.push(byte);
        Ok(())
    }

    /// Append a byte slice.
    pub fn append(&mut self, bytes: &[u8]) -> PackResult<()> {
        self.grow(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Append two byte slices back to back with a single growth step.
    pub fn append2(&mut self, first: &[u8], second: &[u8]) -> PackResult<()> {
        let total = first
            .len()
            .checked_add(second.len())
            .ok_or(PackError::Allocation)?;
        self.grow(total)?;
        self.data.extend_from_slice(first);
        self.data.extend_from_slice(second);
        Ok(())
    }

    /// Logical length, not counting drained bytes.
    pub fn len(&self) -> usize {
        self.data.len() - self.start
    }

    /// Whether the buffer holds no readable bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The readable bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..]
    }

    /// Discard `n` bytes from the front.
    pub fn drain(&mut self, n: usize) -> PackResult<()> {
        if n > self.len() {
            return Err(PackError::OutOfInput);
        }
        self.start += n;
        Ok(())
    }

    /// Hand the contents out as an immutable byte string.
    pub fn freeze(mut self) -> Bytes {
        if self.start > 0 {
            self.data.drain(..self.start);
        }
        Bytes::from(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_len() {
        let mut buf = MsgBuf::new();
        buf.append_byte(0x01).unwrap();
        buf.append(&[0x02, 0x03]).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_slice(), &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_append2() {
        let mut buf = MsgBuf::new();
        buf.append2(&[0xaa], &[0xbb, 0xcc]).unwrap();
        assert_eq!(buf.as_slice(), &[0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn test_growth_past_granularity() {
        let mut buf = MsgBuf::new();
        let chunk = [0x55u8; 100];
        for _ in 0..10 {
            buf.append(&chunk).unwrap();
        }
        assert_eq!(buf.len(), 1000);
        assert!(buf.as_slice().iter().all(|&b| b == 0x55));
    }

    #[test]
    fn test_drain_moves_start() {
        let mut buf = MsgBuf::new();
        buf.append(&[1, 2, 3, 4]).unwrap();
        buf.drain(2).unwrap();
        assert_eq!(buf.as_slice(), &[3, 4]);
        assert_eq!(buf.len(), 2);
        assert!(buf.drain(3).is_err());
    }

    #[test]
    fn test_freeze_after_drain() {
        let mut buf = MsgBuf::new();
        buf.append(&[9, 8, 7]).unwrap();
        buf.drain(1).unwrap();
        assert_eq!(buf.freeze().as_ref(), &[8, 7]);
    }
}
