//! Composite key codec
//!
//! Keys are a fixed sequence of typed fields described by a [`KeySchema`].
//! Fields are joined by [`SEPARATOR`]; the last field carries no trailing
//! separator. Integers are fixed-width big-endian so byte order equals
//! numeric order, which the maturity sweep relies on for range scans.
//!
//! A prefix of `k < n` fields encodes each field followed by the separator,
//! so the prefix `alice` never matches the depositor `alicea`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved byte between key fields. Never allowed inside string fields.
pub const SEPARATOR: u8 = 0x00;

/// Shape of one key field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 string, separator-free
    Str,
    /// 8-byte big-endian integer
    U64,
    /// 4-byte big-endian integer
    U32,
}

/// One decoded key field
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    /// String field
    Str(String),
    /// 64-bit integer field
    U64(u64),
    /// 32-bit integer field
    U32(u32),
}

impl Field {
    /// Kind of this field
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Str(_) => FieldKind::Str,
            Field::U64(_) => FieldKind::U64,
            Field::U32(_) => FieldKind::U32,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Field::Str(s) => {
                if s.as_bytes().contains(&SEPARATOR) {
                    return Err(Error::validation(format!(
                        "key field {:?} contains the reserved separator",
                        s
                    )));
                }
                out.extend_from_slice(s.as_bytes());
            }
            Field::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::U32(v) => out.extend_from_slice(&v.to_be_bytes()),
        }
        Ok(())
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Str(s.to_string())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Str(s) => write!(f, "{}", s),
            Field::U64(v) => write!(f, "{}", v),
            Field::U32(v) => write!(f, "{}", v),
        }
    }
}

/// Field layout of one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySchema {
    /// Namespace name, used in error messages
    pub name: &'static str,
    /// Field order
    pub fields: &'static [FieldKind],
}

impl KeySchema {
    /// Encode a full key
    pub fn encode(&self, parts: &[Field]) -> Result<Vec<u8>> {
        if parts.len() != self.fields.len() {
            return Err(Error::validation(format!(
                "{} key expects {} fields, got {}",
                self.name,
                self.fields.len(),
                parts.len()
            )));
        }
        self.write_fields(parts)
    }

    /// Encode the leading `parts` of a key for a prefix scan. Must be
    /// strictly shorter than the full key.
    pub fn encode_prefix(&self, parts: &[Field]) -> Result<Vec<u8>> {
        if parts.len() >= self.fields.len() {
            return Err(Error::validation(format!(
                "{} prefix must have fewer than {} fields, got {}",
                self.name,
                self.fields.len(),
                parts.len()
            )));
        }
        self.write_fields(parts)
    }

    fn write_fields(&self, parts: &[Field]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(32);
        for (i, (part, kind)) in parts.iter().zip(self.fields).enumerate() {
            if part.kind() != *kind {
                return Err(Error::validation(format!(
                    "{} key field {} expects {:?}, got {:?}",
                    self.name,
                    i,
                    kind,
                    part.kind()
                )));
            }
            part.write_to(&mut out)?;
            if i + 1 < self.fields.len() {
                out.push(SEPARATOR);
            }
        }
        Ok(out)
    }

    /// Decode previously written key bytes. Any mismatch is corruption.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<Field>> {
        let mut parts = Vec::with_capacity(self.fields.len());
        let mut pos = 0usize;

        for (i, kind) in self.fields.iter().enumerate() {
            let last = i + 1 == self.fields.len();
            let rest = &bytes[pos..];

            let (field, consumed) = match kind {
                FieldKind::Str => {
                    let len = if last {
                        rest.len()
                    } else {
                        rest.iter().position(|b| *b == SEPARATOR).ok_or_else(|| {
                            self.corrupt(bytes, format!("missing separator after field {}", i))
                        })?
                    };
                    let s = std::str::from_utf8(&rest[..len])
                        .map_err(|_| self.corrupt(bytes, format!("field {} is not UTF-8", i)))?;
                    (Field::Str(s.to_string()), len)
                }
                FieldKind::U64 => {
                    let raw: [u8; 8] = rest
                        .get(..8)
                        .and_then(|b| b.try_into().ok())
                        .ok_or_else(|| self.corrupt(bytes, format!("field {} truncated", i)))?;
                    (Field::U64(u64::from_be_bytes(raw)), 8)
                }
                FieldKind::U32 => {
                    let raw: [u8; 4] = rest
                        .get(..4)
                        .and_then(|b| b.try_into().ok())
                        .ok_or_else(|| self.corrupt(bytes, format!("field {} truncated", i)))?;
                    (Field::U32(u32::from_be_bytes(raw)), 4)
                }
            };
            pos += consumed;
            parts.push(field);

            if !last {
                if bytes.get(pos) != Some(&SEPARATOR) {
                    return Err(self.corrupt(bytes, format!("missing separator after field {}", i)));
                }
                pos += 1;
            }
        }

        if pos != bytes.len() {
            return Err(self.corrupt(bytes, "trailing bytes".to_string()));
        }
        Ok(parts)
    }

    fn corrupt(&self, bytes: &[u8], reason: String) -> Error {
        Error::corruption(format!("{} key {:02x?}: {}", self.name, bytes, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH_SCHEMA: KeySchema = KeySchema {
        name: "epoch_test",
        fields: &[FieldKind::U64, FieldKind::U32, FieldKind::Str, FieldKind::Str],
    };

    const PAIR_SCHEMA: KeySchema = KeySchema {
        name: "pair_test",
        fields: &[FieldKind::Str, FieldKind::Str],
    };

    fn epoch_key(day: u64, lockup: u32, who: &str, denom: &str) -> Vec<Field> {
        vec![Field::U64(day), Field::U32(lockup), who.into(), denom.into()]
    }

    #[test]
    fn test_decode_inverts_encode() {
        let parts = epoch_key(499, 4, "quasar1axas", "uqsr");
        let bytes = EPOCH_SCHEMA.encode(&parts).unwrap();
        assert_eq!(EPOCH_SCHEMA.decode(&bytes).unwrap(), parts);
    }

    #[test]
    fn test_integer_order_matches_byte_order() {
        let a = EPOCH_SCHEMA.encode(&epoch_key(9, 1, "a", "ABC")).unwrap();
        let b = EPOCH_SCHEMA.encode(&epoch_key(10, 1, "a", "ABC")).unwrap();
        let c = EPOCH_SCHEMA.encode(&epoch_key(256, 1, "a", "ABC")).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_prefix_does_not_match_longer_identifier() {
        let prefix = PAIR_SCHEMA.encode_prefix(&["alice".into()]).unwrap();
        let own = PAIR_SCHEMA.encode(&["alice".into(), "ABC".into()]).unwrap();
        let other = PAIR_SCHEMA.encode(&["alicea".into(), "ABC".into()]).unwrap();
        assert!(own.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
    }

    #[test]
    fn test_epoch_lockup_prefix_selects_day_and_lockup() {
        let prefix = EPOCH_SCHEMA
            .encode_prefix(&[Field::U64(1), Field::U32(1)])
            .unwrap();
        let hit = EPOCH_SCHEMA.encode(&epoch_key(1, 1, "bob", "QSR")).unwrap();
        let other_lockup = EPOCH_SCHEMA.encode(&epoch_key(1, 2, "bob", "QSR")).unwrap();
        let other_day = EPOCH_SCHEMA.encode(&epoch_key(2, 1, "bob", "QSR")).unwrap();
        assert!(hit.starts_with(&prefix));
        assert!(!other_lockup.starts_with(&prefix));
        assert!(!other_day.starts_with(&prefix));
    }

    #[test]
    fn test_separator_in_string_rejected() {
        let err = PAIR_SCHEMA
            .encode(&["ali\0ce".into(), "ABC".into()])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_schema_shape_enforced() {
        assert!(PAIR_SCHEMA.encode(&["alice".into()]).is_err());
        assert!(PAIR_SCHEMA.encode(&[Field::U64(1), "ABC".into()]).is_err());
        assert!(PAIR_SCHEMA
            .encode_prefix(&["alice".into(), "ABC".into()])
            .is_err());
    }

    #[test]
    fn test_malformed_bytes_are_corruption() {
        let err = EPOCH_SCHEMA.decode(&[0, 0, 1]).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
        assert!(err.is_fatal());

        let err = PAIR_SCHEMA.decode(b"no-separator").unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));

        let err = PAIR_SCHEMA.decode(&[0xff, 0x00, b'A']).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }
}
