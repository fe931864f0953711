//! Big-endian byte cursor and writer shared by the AMF3 and envelope codecs

use amfxml_core::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Largest value a U29 can carry
pub(crate) const U29_MAX: u32 = 0x1FFF_FFFF;

/// Read cursor over a borrowed buffer
#[derive(Debug)]
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Borrow the next `n` bytes and advance past them
    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::malformed(
                self.pos,
                format!(
                    "unexpected end of stream: need {} bytes, {} remain",
                    n,
                    self.remaining()
                ),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    /// Read a UTF-8 string of `len` bytes
    pub(crate) fn read_utf8(&mut self, len: usize) -> Result<String> {
        let at = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| Error::malformed(at, format!("invalid UTF-8: {}", e)))
    }

    /// Read an AMF3 variable-length 29-bit unsigned integer
    ///
    /// Up to three bytes carry 7 bits each (high bit = continue); a fourth
    /// byte carries a full 8 bits.
    pub(crate) fn read_u29(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..3 {
            let b = self.read_u8()?;
            if b & 0x80 == 0 {
                return Ok((value << 7) | u32::from(b));
            }
            value = (value << 7) | u32::from(b & 0x7F);
        }
        let b = self.read_u8()?;
        Ok((value << 8) | u32::from(b))
    }
}

/// Growable output buffer
#[derive(Debug, Default)]
pub(crate) struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn put_u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub(crate) fn put_u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub(crate) fn put_f64(&mut self, v: f64) {
        let mut b = [0u8; 8];
        BigEndian::write_f64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub(crate) fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write an AMF3 variable-length 29-bit unsigned integer, shortest form
    pub(crate) fn put_u29(&mut self, v: u32) -> Result<()> {
        if v > U29_MAX {
            return Err(Error::ValueTooLarge {
                what: "U29 integer",
                len: v as usize,
                max: U29_MAX as usize,
            });
        }
        if v < 0x80 {
            self.put_u8(v as u8);
        } else if v < 0x4000 {
            self.put_u8(((v >> 7) | 0x80) as u8);
            self.put_u8((v & 0x7F) as u8);
        } else if v < 0x20_0000 {
            self.put_u8(((v >> 14) | 0x80) as u8);
            self.put_u8((((v >> 7) & 0x7F) | 0x80) as u8);
            self.put_u8((v & 0x7F) as u8);
        } else {
            self.put_u8(((v >> 22) | 0x80) as u8);
            self.put_u8((((v >> 15) & 0x7F) | 0x80) as u8);
            self.put_u8((((v >> 8) & 0x7F) | 0x80) as u8);
            self.put_u8((v & 0xFF) as u8);
        }
        Ok(())
    }
}
