//! Little-endian cursor primitives shared by the container and instruction codecs.
//!
//! Besides fixed-width integers, the container format packs several records
//! as C bitfields: fields are laid out least significant bit first over a
//! little-endian byte sequence. [`BitField`] layouts describe such records and
//! [`Record`] holds the decoded values in layout order.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eof {
    pub offset: usize,
    pub wanted: usize,
    pub available: usize,
}

impl From<Eof> for ParseError {
    fn from(e: Eof) -> Self {
        ParseError::Truncated { offset: e.offset, wanted: e.wanted, available: e.available }
    }
}

/// One field of a bitfield record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField<F> {
    pub field: F,
    pub bits: u8,
}

/// Number of bytes a record with this layout occupies.
pub fn record_len<F>(layout: &[BitField<F>]) -> usize {
    layout.iter().map(|f| f.bits as usize).sum::<usize>().div_ceil(8)
}

pub fn fits(value: u64, bits: u8) -> bool {
    bits >= 64 || value < (1u64 << bits)
}

pub fn align_up(pos: usize, alignment: usize) -> usize {
    pos.div_ceil(alignment) * alignment
}

fn extract_bits(bytes: &[u8], start: usize, width: u8) -> u64 {
    let mut value = 0u64;
    for i in 0..width as usize {
        let bit = start + i;
        if (bytes[bit / 8] >> (bit % 8)) & 1 == 1 {
            value |= 1 << i;
        }
    }
    value
}

fn insert_bits(bytes: &mut [u8], start: usize, width: u8, value: u64) {
    for i in 0..width as usize {
        let bit = start + i;
        if (value >> i) & 1 == 1 {
            bytes[bit / 8] |= 1 << (bit % 8);
        } else {
            bytes[bit / 8] &= !(1 << (bit % 8));
        }
    }
}

/// Values of a bitfield record, in layout order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<F> {
    values: Vec<(F, u64)>,
}

impl<F: Copy + PartialEq> Record<F> {
    pub fn zeroed(layout: &[BitField<F>]) -> Self {
        Self { values: layout.iter().map(|f| (f.field, 0)).collect() }
    }

    pub fn get(&self, field: F) -> u64 {
        self.values.iter().find(|(f, _)| *f == field).map(|(_, v)| *v).unwrap_or(0)
    }

    pub fn set(&mut self, field: F, value: u64) {
        if let Some(slot) = self.values.iter_mut().find(|(f, _)| *f == field) {
            slot.1 = value;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, u64)> + '_ {
        self.values.iter().copied()
    }

    pub fn decode(bytes: &[u8], layout: &[BitField<F>]) -> Self {
        let mut start = 0;
        let mut values = Vec::with_capacity(layout.len());
        for f in layout {
            values.push((f.field, extract_bits(bytes, start, f.bits)));
            start += f.bits as usize;
        }
        Self { values }
    }

    /// Packs the record; the first field whose value exceeds its width is returned as the error.
    pub fn encode(&self, layout: &[BitField<F>]) -> Result<Vec<u8>, (F, u64)> {
        let mut out = vec![0u8; record_len(layout)];
        let mut start = 0;
        for f in layout {
            let v = self.get(f.field);
            if !fits(v, f.bits) {
                return Err((f.field, v));
            }
            insert_bits(&mut out, start, f.bits, v);
            start += f.bits as usize;
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Eof> {
        if self.remaining() < n {
            return Err(Eof { offset: self.pos, wanted: n, available: self.remaining() });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn get_u8(&mut self) -> Result<u8, Eof> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, Eof> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn get_u32(&mut self) -> Result<u32, Eof> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn get_u64(&mut self) -> Result<u64, Eof> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn get_i8(&mut self) -> Result<i8, Eof> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn get_i32(&mut self) -> Result<i32, Eof> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn get_f64(&mut self) -> Result<f64, Eof> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8], Eof> {
        self.take(n)
    }

    /// Reads an unsigned little-endian integer of 1, 2, 4 or 8 bytes.
    pub fn get_uint(&mut self, width: usize) -> Result<u64, Eof> {
        Ok(LittleEndian::read_uint(self.take(width)?, width))
    }

    pub fn get_record<F: Copy + PartialEq>(&mut self, layout: &[BitField<F>]) -> Result<Record<F>, Eof> {
        let bytes = self.take(record_len(layout))?;
        Ok(Record::decode(bytes, layout))
    }

    /// Consumes the padding up to the next multiple of `alignment` and returns it.
    pub fn skip_padding(&mut self, alignment: usize) -> Result<&'a [u8], Eof> {
        let target = align_up(self.pos, alignment);
        self.take(target - self.pos)
    }
}

#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_i32(&mut self, v: i32) {
        let mut b = [0u8; 4];
        LittleEndian::write_i32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_f64(&mut self, v: f64) {
        let mut b = [0u8; 8];
        LittleEndian::write_f64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_uint(&mut self, width: usize, v: u64) {
        let mut b = [0u8; 8];
        LittleEndian::write_uint(&mut b[..width], v, width);
        self.buf.extend_from_slice(&b[..width]);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_record<F: Copy + PartialEq>(
        &mut self,
        layout: &[BitField<F>],
        record: &Record<F>,
    ) -> Result<(), (F, u64)> {
        let bytes = record.encode(layout)?;
        self.buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Zero-fills up to the next multiple of `alignment`.
    pub fn pad_to(&mut self, alignment: usize) {
        let target = align_up(self.buf.len(), alignment);
        self.buf.resize(target, 0);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum F {
        Wide,
        Offset,
        Length,
    }

    const STRING_LIKE: &[BitField<F>] = &[
        BitField { field: F::Wide, bits: 1 },
        BitField { field: F::Offset, bits: 23 },
        BitField { field: F::Length, bits: 8 },
    ];

    #[test]
    fn packs_lsb_first() {
        let mut r = Record::zeroed(STRING_LIKE);
        r.set(F::Wide, 1);
        r.set(F::Offset, 5);
        r.set(F::Length, 3);
        let bytes = r.encode(STRING_LIKE).unwrap();
        assert_eq!(bytes, vec![0x0b, 0x00, 0x00, 0x03]);
        assert_eq!(Record::decode(&bytes, STRING_LIKE), r);
    }

    #[test]
    fn rejects_values_wider_than_field() {
        let mut r = Record::zeroed(STRING_LIKE);
        r.set(F::Length, 256);
        assert_eq!(r.encode(STRING_LIKE), Err((F::Length, 256)));
    }

    #[test]
    fn reader_reports_eof_position() {
        let mut r = Reader::new(&[1, 2, 3]);
        assert_eq!(r.get_u16().unwrap(), 0x0201);
        assert_eq!(r.get_u32(), Err(Eof { offset: 2, wanted: 4, available: 1 }));
    }

    #[test]
    fn padding_round_trip() {
        let mut w = Writer::default();
        w.put_u8(7);
        w.pad_to(4);
        w.put_uint(2, 0xbeef);
        let bytes = w.into_inner();
        assert_eq!(bytes, vec![7, 0, 0, 0, 0xef, 0xbe]);

        let mut r = Reader::new(&bytes);
        r.get_u8().unwrap();
        assert_eq!(r.skip_padding(4).unwrap(), &[0, 0, 0]);
        assert_eq!(r.get_uint(2).unwrap(), 0xbeef);
        assert!(r.is_empty());
    }
}
