//! Declarative field tables and the structure codec built on top of them.
//!
//! A [`Layout`] names every field of one fixed-size structure (a CDB, a
//! parameter list header, a descriptor). Layouts are `const` items, and
//! [`Layout::new`] rejects overlapping fields or fields running past the
//! declared size during constant evaluation, so a bad table fails to compile.
//!
//! Applying a layout to a buffer produces a [`Record`]: a map from field name
//! to [`Value`]. Encoding goes the other way.

use std::collections::BTreeMap;

use super::bitfield::{byte_mask, decode_field, encode_field, fits, run_width};
use super::error::{Error, Result};

/// Where a single field lives inside its structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    /// An integer field; see [`super::bitfield`] for how `mask` is interpreted.
    Bits { mask: u64, offset: usize },
    /// A run of raw bytes (identifiers, ASCII strings, addresses).
    Bytes { offset: usize, len: usize },
}

pub const fn bits(mask: u64, offset: usize) -> Field {
    Field::Bits { mask, offset }
}

pub const fn bytes(offset: usize, len: usize) -> Field {
    Field::Bytes { offset, len }
}

impl Field {
    const fn start(&self) -> usize {
        match *self {
            Field::Bits { offset, .. } | Field::Bytes { offset, .. } => offset,
        }
    }

    /// One past the last byte touched by the field.
    pub const fn end(&self) -> usize {
        match *self {
            Field::Bits { mask, offset } => offset + run_width(mask),
            Field::Bytes { offset, len } => offset + len,
        }
    }

    /// Bits of absolute byte `index` claimed by this field.
    const fn claims(&self, index: usize) -> u8 {
        if index < self.start() || index >= self.end() {
            return 0;
        }
        match *self {
            Field::Bits { mask, offset } => byte_mask(mask, index - offset),
            Field::Bytes { .. } => 0xff,
        }
    }

    const fn overlaps(&self, other: &Field) -> bool {
        let mut index = if self.start() > other.start() {
            self.start()
        } else {
            other.start()
        };
        while index < self.end() && index < other.end() {
            if self.claims(index) & other.claims(index) != 0 {
                return true;
            }
            index += 1;
        }
        false
    }
}

const fn same_name(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// A named, fixed-size structure description.
#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    /// Encoded size in bytes.
    pub size: usize,
    pub fields: &'static [(&'static str, Field)],
}

impl Layout {
    /// Builds a layout, panicking (at compile time, for `const` items) if two
    /// fields claim the same bit, a field is empty or duplicated, or a field
    /// does not fit inside `size` bytes.
    pub const fn new(
        name: &'static str,
        size: usize,
        fields: &'static [(&'static str, Field)],
    ) -> Layout {
        let mut i = 0;
        while i < fields.len() {
            let (field_name, field) = fields[i];
            match field {
                Field::Bits { mask, .. } => assert!(mask != 0, "empty bit field"),
                Field::Bytes { len, .. } => assert!(len != 0, "empty byte field"),
            }
            assert!(field.end() <= size, "field extends past the end of its layout");
            let mut j = i + 1;
            while j < fields.len() {
                let (other_name, other) = fields[j];
                assert!(!same_name(field_name, other_name), "duplicate field name");
                assert!(!field.overlaps(&other), "fields overlap");
                j += 1;
            }
            i += 1;
        }
        Layout { name, size, fields }
    }

    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, field)| *field)
    }

    /// Decodes every field of the layout from `buf`.
    pub fn decode(&self, buf: &[u8]) -> Result<Record> {
        let mut record = Record::new();
        self.decode_into(buf, &mut record)?;
        Ok(record)
    }

    /// Decodes every field of the layout from `buf` into an existing record.
    pub fn decode_into(&self, buf: &[u8], record: &mut Record) -> Result<()> {
        for &(name, field) in self.fields {
            let value = match field {
                Field::Bits { mask, offset } => {
                    Value::Int(decode_field(buf, mask, offset).map_err(|_| {
                        Error::truncated(self.name, field.end(), buf.len())
                    })?)
                }
                Field::Bytes { offset, len } => {
                    let run = buf
                        .get(offset..offset + len)
                        .ok_or_else(|| Error::truncated(self.name, offset + len, buf.len()))?;
                    Value::Bytes(run.to_vec())
                }
            };
            record.insert(name, value);
        }
        Ok(())
    }

    /// Decodes `buf`, treating bytes past its end as zero.
    ///
    /// Used for pages whose devices may legitimately return fewer bytes than
    /// the full layout (older revisions of a VPD page, for instance).
    pub fn decode_padded(&self, buf: &[u8]) -> Result<Record> {
        if buf.len() >= self.size {
            return self.decode(buf);
        }
        let mut padded = buf.to_vec();
        padded.resize(self.size, 0);
        self.decode(&padded)
    }

    /// Encodes `record` into a zeroed buffer of [`Layout::size`] bytes.
    ///
    /// Keys that are not part of the layout are ignored and integer values are
    /// truncated to their mask. Fields absent from `record` stay zero.
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut buf = vec![0; self.size];
        self.encode_into(record, &mut buf, false)?;
        Ok(buf)
    }

    /// Like [`Layout::encode`], but rejects unknown keys and values that do
    /// not fit their field.
    pub fn encode_strict(&self, record: &Record) -> Result<Vec<u8>> {
        let mut buf = vec![0; self.size];
        self.encode_into(record, &mut buf, true)?;
        Ok(buf)
    }

    /// Encodes `record` on top of `buf`, which must be at least
    /// [`Layout::size`] bytes long.
    pub fn encode_into(&self, record: &Record, buf: &mut [u8], strict: bool) -> Result<()> {
        if buf.len() < self.size {
            return Err(Error::truncated(self.name, self.size, buf.len()));
        }
        if strict {
            if let Some(key) = record.keys().find(|k| self.field(k).is_none()) {
                return Err(Error::UnknownField {
                    layout: self.name,
                    field: key,
                });
            }
        }
        for &(name, field) in self.fields {
            let Some(value) = record.get(name) else {
                continue;
            };
            match (field, value) {
                (Field::Bits { mask, offset }, Value::Int(v)) => {
                    if strict && !fits(mask, *v) {
                        return Err(Error::ValueOutOfRange {
                            field: name,
                            value: *v,
                            mask,
                        });
                    }
                    encode_field(buf, mask, offset, *v)?;
                }
                (Field::Bytes { offset, len }, Value::Bytes(b)) => {
                    if strict && b.len() > len {
                        return Err(Error::InvalidLength {
                            field: name,
                            value: b.len() as u64,
                            expected: "no longer than the field",
                        });
                    }
                    let n = b.len().min(len);
                    buf[offset..offset + n].copy_from_slice(&b[..n]);
                    buf[offset + n..offset + len].fill(0);
                }
                (Field::Bits { .. }, Value::Bytes(_)) => {
                    return Err(Error::FieldKind {
                        field: name,
                        expected: "an integer",
                    });
                }
                (Field::Bytes { .. }, Value::Int(_)) => {
                    return Err(Error::FieldKind {
                        field: name,
                        expected: "raw bytes",
                    });
                }
            }
        }
        Ok(())
    }
}

/// A decoded field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(u64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Int(_) => None,
        }
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as u64)
            }
        })*
    };
}
int_value!(u8, u16, u32, u64, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(u64::from(v))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Value {
    fn from(v: [u8; N]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

/// Field name to value mapping produced by [`Layout::decode`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record(BTreeMap<&'static str, Value>);

impl Record {
    pub fn new() -> Record {
        Record(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &'static str, value: impl Into<Value>) -> Record {
        self.0.insert(key, value.into());
        self
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key, value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Integer value of `key`, if present and an integer.
    pub fn get_int(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_int)
    }

    /// Integer value of `key`; absent fields read as zero, like an untouched
    /// byte in an encoded buffer.
    pub fn int(&self, key: &str) -> u64 {
        self.get_int(key).unwrap_or(0)
    }

    /// Raw bytes of `key`; absent fields read as empty.
    pub fn bytes(&self, key: &str) -> &[u8] {
        self.get(key).and_then(Value::as_bytes).unwrap_or(&[])
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// Moves every entry of `other` into `self`, replacing duplicates.
    pub fn merge(&mut self, other: Record) {
        self.0.extend(other.0);
    }
}

impl FromIterator<(&'static str, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (&'static str, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: Layout = Layout::new(
        "sample",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("protect", bits(0xe0, 1)),
            ("dpo", bits(0x10, 1)),
            ("fua", bits(0x08, 1)),
            ("lba", bits(0xffffffff, 2)),
            ("group", bits(0x1f, 6)),
            ("tl", bits(0xffff, 7)),
            ("tag", bytes(9, 3)),
        ],
    );

    #[test]
    fn round_trip() {
        let record = Record::new()
            .with("opcode", 0x28u8)
            .with("protect", 5u8)
            .with("dpo", true)
            .with("fua", false)
            .with("lba", 1024u32)
            .with("group", 0x11u8)
            .with("tl", 27u16)
            .with("tag", *b"abc");
        let buf = SAMPLE.encode(&record).unwrap();
        assert_eq!(buf[..9], [0x28, 0xb0, 0, 0, 0x04, 0, 0x11, 0, 27]);
        assert_eq!(SAMPLE.decode(&buf).unwrap(), record);
    }

    #[test]
    fn lenient_ignores_unknown_keys() {
        let record = Record::new().with("opcode", 0x12u8).with("bookkeeping", 7u8);
        let buf = SAMPLE.encode(&record).unwrap();
        assert_eq!(buf[0], 0x12);
        assert!(buf[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn strict_rejects_unknown_keys_and_wide_values() {
        let unknown = Record::new().with("bookkeeping", 7u8);
        let e = SAMPLE.encode_strict(&unknown).expect_err("unknown key");
        assert!(matches!(e, Error::UnknownField { field: "bookkeeping", .. }));

        let wide = Record::new().with("group", 0x20u8);
        let e = SAMPLE.encode_strict(&wide).expect_err("value wider than mask");
        assert!(matches!(e, Error::ValueOutOfRange { field: "group", value: 0x20, mask: 0x1f }));
        assert_eq!(SAMPLE.encode(&wide).unwrap()[6], 0);
    }

    #[test]
    fn kind_mismatch() {
        let record = Record::new().with("lba", vec![1, 2, 3]);
        assert!(matches!(
            SAMPLE.encode(&record),
            Err(Error::FieldKind { field: "lba", .. })
        ));
    }

    #[test]
    fn short_buffers() {
        let e = SAMPLE.decode(&[0u8; 8]).expect_err("tl needs byte 8");
        assert!(matches!(e, Error::Truncated { what: "sample", .. }));
        let record = SAMPLE.decode_padded(&[0x28]).unwrap();
        assert_eq!(record.int("opcode"), 0x28);
        assert_eq!(record.bytes("tag"), &[0, 0, 0]);
    }

    #[test]
    fn overlap_detection() {
        assert!(bits(0x80, 32).overlaps(&bits(0xffffffff, 32)));
        assert!(!bits(0x80, 32).overlaps(&bits(0x7fffffff, 32)));
        assert!(bits(0x0fff, 0).overlaps(&bits(0xffffff, 1)));
        assert!(!bits(0x0fffffff, 3).overlaps(&bits(0x0ffffff0, 0)));
        assert!(bytes(4, 8).overlaps(&bits(0x01, 11)));
    }
}
