// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Strict DER writer/reader for the wrapped-key wire format.
//
// The hardware parser expects context-specific tags above 30 (the
// no-auth-required marker is [503]), so the encoder emits high-tag-number
// identifiers itself. The reader accepts DER only: definite minimal lengths,
// minimal non-negative integers, and no trailing bytes.

use std::cmp::Ordering;

use keyward_core::error::{KeywardError, Result};

fn malformed(what: &str) -> KeywardError {
    KeywardError::ImportRejected(format!("malformed DER: {what}"))
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub class: Class,
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub const INTEGER: Tag = Tag::universal(2, false);
    pub const OCTET_STRING: Tag = Tag::universal(4, false);
    pub const NULL: Tag = Tag::universal(5, false);
    pub const SEQUENCE: Tag = Tag::universal(16, true);
    pub const SET: Tag = Tag::universal(17, true);

    pub const fn universal(number: u32, constructed: bool) -> Self {
        Self {
            class: Class::Universal,
            constructed,
            number,
        }
    }

    /// Context-specific constructed tag, as used by `[n] EXPLICIT`.
    pub const fn explicit(number: u32) -> Self {
        Self {
            class: Class::ContextSpecific,
            constructed: true,
            number,
        }
    }

    fn identifier(&self) -> Vec<u8> {
        let class_bits = match self.class {
            Class::Universal => 0x00,
            Class::Application => 0x40,
            Class::ContextSpecific => 0x80,
            Class::Private => 0xC0,
        };
        let constructed_bit = if self.constructed { 0x20 } else { 0x00 };

        if self.number < 31 {
            return vec![class_bits | constructed_bit | self.number as u8];
        }

        // High-tag-number form: 0x1F then base-128 groups, MSB first.
        let mut groups = Vec::with_capacity(5);
        let mut n = self.number;
        loop {
            groups.push((n & 0x7F) as u8);
            n >>= 7;
            if n == 0 {
                break;
            }
        }
        groups.reverse();
        let last = groups.len() - 1;
        for group in &mut groups[..last] {
            *group |= 0x80;
        }

        let mut id = Vec::with_capacity(groups.len() + 1);
        id.push(class_bits | constructed_bit | 0x1F);
        id.extend_from_slice(&groups);
        id
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

fn push_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let significant = &bytes[first..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Encode a single TLV.
pub fn tlv(tag: Tag, content: &[u8]) -> Vec<u8> {
    let identifier = tag.identifier();
    let mut out = Vec::with_capacity(identifier.len() + 5 + content.len());
    out.extend_from_slice(&identifier);
    push_length(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

/// Non-negative INTEGER with minimal two's-complement content.
pub fn integer(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let mut content = Vec::with_capacity(9);
    if bytes[first] & 0x80 != 0 {
        content.push(0x00);
    }
    content.extend_from_slice(&bytes[first..]);
    tlv(Tag::INTEGER, &content)
}

pub fn octet_string(bytes: &[u8]) -> Vec<u8> {
    tlv(Tag::OCTET_STRING, bytes)
}

pub fn null() -> Vec<u8> {
    tlv(Tag::NULL, &[])
}

/// SEQUENCE of already-encoded elements, in the given order.
pub fn sequence<I>(items: I) -> Vec<u8>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let content: Vec<u8> = items.into_iter().flatten().collect();
    tlv(Tag::SEQUENCE, &content)
}

/// SET OF already-encoded elements, sorted into DER order.
pub fn set_of(mut items: Vec<Vec<u8>>) -> Vec<u8> {
    items.sort_by(|a, b| der_set_order(a, b));
    let content: Vec<u8> = items.into_iter().flatten().collect();
    tlv(Tag::SET, &content)
}

/// `[n] EXPLICIT` wrapper around an encoded element.
pub fn explicit(number: u32, inner: &[u8]) -> Vec<u8> {
    tlv(Tag::explicit(number), inner)
}

/// X.690 11.6: compare as octet strings, shorter padded with trailing zeros.
fn der_set_order(a: &[u8], b: &[u8]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// One decoded TLV.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub tag: Tag,
    pub content: &'a [u8],
    /// The full encoding, identifier and length included.
    pub raw: &'a [u8],
}

/// Sequential reader over concatenated DER elements.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .input
            .get(self.pos)
            .ok_or_else(|| malformed("unexpected end of input"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_tag(&mut self) -> Result<Tag> {
        let first = self.byte()?;
        let class = match first >> 6 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::ContextSpecific,
            _ => Class::Private,
        };
        let constructed = first & 0x20 != 0;
        let low = u32::from(first & 0x1F);
        if low != 0x1F {
            return Ok(Tag {
                class,
                constructed,
                number: low,
            });
        }

        let mut number: u32 = 0;
        for i in 0..5 {
            let b = self.byte()?;
            if i == 0 && b == 0x80 {
                return Err(malformed("non-minimal tag number"));
            }
            number = number
                .checked_mul(128)
                .ok_or_else(|| malformed("tag number overflow"))?
                | u32::from(b & 0x7F);
            if b & 0x80 == 0 {
                if number < 31 {
                    return Err(malformed("high-tag form used for a low tag number"));
                }
                return Ok(Tag {
                    class,
                    constructed,
                    number,
                });
            }
        }
        Err(malformed("tag number too long"))
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        if first == 0x80 {
            return Err(malformed("indefinite length"));
        }
        let count = usize::from(first & 0x7F);
        if count > 4 {
            return Err(malformed("length too large"));
        }
        let mut len: usize = 0;
        for i in 0..count {
            let b = self.byte()?;
            if i == 0 && b == 0 {
                return Err(malformed("non-minimal length"));
            }
            len = (len << 8) | usize::from(b);
        }
        if len < 0x80 {
            return Err(malformed("long-form length for a short value"));
        }
        Ok(len)
    }

    /// Read the next element of any tag.
    pub fn read(&mut self) -> Result<Element<'a>> {
        let start = self.pos;
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| malformed("length exceeds input"))?;
        let content = &self.input[self.pos..end];
        let raw = &self.input[start..end];
        self.pos = end;
        Ok(Element { tag, content, raw })
    }

    /// Read the next element and require `tag`.
    pub fn expect(&mut self, tag: Tag) -> Result<Element<'a>> {
        let element = self.read()?;
        if element.tag != tag {
            return Err(malformed(&format!(
                "expected tag {:?}/{}, found {:?}/{}",
                tag.class, tag.number, element.tag.class, element.tag.number
            )));
        }
        Ok(element)
    }

    pub fn read_integer(&mut self) -> Result<u64> {
        decode_integer(self.expect(Tag::INTEGER)?.content)
    }

    pub fn read_octet_string(&mut self) -> Result<&'a [u8]> {
        Ok(self.expect(Tag::OCTET_STRING)?.content)
    }

    pub fn read_null(&mut self) -> Result<()> {
        let element = self.expect(Tag::NULL)?;
        if !element.content.is_empty() {
            return Err(malformed("NULL with content"));
        }
        Ok(())
    }

    /// Read a SEQUENCE and return a reader over its content.
    pub fn read_sequence(&mut self) -> Result<Reader<'a>> {
        Ok(Reader::new(self.expect(Tag::SEQUENCE)?.content))
    }

    /// Require that every byte has been consumed.
    pub fn finish(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(malformed("trailing bytes"))
        }
    }
}

/// Decode a minimal non-negative INTEGER that fits in 64 bits.
pub fn decode_integer(content: &[u8]) -> Result<u64> {
    let (&first, rest) = content
        .split_first()
        .ok_or_else(|| malformed("empty INTEGER"))?;
    if first & 0x80 != 0 {
        return Err(malformed("negative INTEGER"));
    }
    if first == 0 && rest.first().is_some_and(|b| b & 0x80 == 0) {
        return Err(malformed("non-minimal INTEGER"));
    }
    let digits = if first == 0 && !rest.is_empty() { rest } else { content };
    if digits.len() > 8 {
        return Err(malformed("INTEGER too large"));
    }
    Ok(digits.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_encodings() {
        assert_eq!(integer(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(integer(32), vec![0x02, 0x01, 0x20]);
        assert_eq!(integer(128), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(integer(256), vec![0x02, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn high_tag_number_identifier() {
        // [503] EXPLICIT NULL: 0xBF 0x83 0x77, length 2, 05 00
        assert_eq!(explicit(503, &null()), vec![0xBF, 0x83, 0x77, 0x02, 0x05, 0x00]);
        assert_eq!(explicit(1, &null())[0], 0xA1);
    }

    #[test]
    fn long_lengths() {
        let body = vec![0xAB; 300];
        let encoded = octet_string(&body);
        assert_eq!(&encoded[..4], &[0x04, 0x82, 0x01, 0x2C]);

        let mut reader = Reader::new(&encoded);
        assert_eq!(reader.read_octet_string().unwrap(), body.as_slice());
        reader.finish().unwrap();
    }

    #[test]
    fn set_of_sorts_members() {
        let encoded = set_of(vec![integer(64), integer(1), integer(5)]);
        assert_eq!(
            encoded,
            vec![0x31, 0x09, 0x02, 0x01, 0x01, 0x02, 0x01, 0x05, 0x02, 0x01, 0x40]
        );
    }

    #[test]
    fn reads_high_tag_back() {
        let encoded = explicit(503, &null());
        let mut reader = Reader::new(&encoded);
        let element = reader.read().unwrap();
        assert_eq!(element.tag, Tag::explicit(503));
        Reader::new(element.content).read_null().unwrap();
    }

    #[test]
    fn rejects_non_minimal_integer() {
        assert!(decode_integer(&[0x00, 0x05]).is_err());
        assert!(decode_integer(&[0x80]).is_err());
        assert!(decode_integer(&[]).is_err());
        assert_eq!(decode_integer(&[0x00, 0x80]).unwrap(), 128);
    }

    #[test]
    fn rejects_indefinite_and_non_minimal_lengths() {
        assert!(Reader::new(&[0x04, 0x80, 0x00, 0x00]).read().is_err());
        assert!(Reader::new(&[0x04, 0x81, 0x01, 0xAA]).read().is_err());
        assert!(Reader::new(&[0x04, 0x05, 0x01]).read().is_err());
    }

    #[test]
    fn trailing_bytes_detected() {
        let mut input = integer(7);
        input.push(0x00);
        let mut reader = Reader::new(&input);
        assert_eq!(reader.read_integer().unwrap(), 7);
        assert!(reader.finish().is_err());
    }
}
