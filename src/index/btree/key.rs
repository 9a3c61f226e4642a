//! Key model for the B+Tree.
//!
//! A tree is created with a [`KeyType`] discriminator and every key
//! passed to it must carry the same discriminator. Keys serialize into
//! node cells with a type-specific codec: integers as 4 fixed bytes,
//! strings length-prefixed.

use crate::common::{Error, Result};

/// Discriminator for the key type an index was created with.
///
/// Persisted in the tree's header page as a single byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Signed 32-bit integer keys.
    Int = 0,
    /// Variable-length UTF-8 string keys.
    Str = 1,
}

impl KeyType {
    /// Convert from the persisted byte, if valid.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(KeyType::Int),
            1 => Some(KeyType::Str),
            _ => None,
        }
    }
}

/// A search key.
///
/// Keys of different types never meet inside one tree; the engine
/// rejects a mismatched key before it reaches a node. The derived
/// ordering is therefore only ever exercised within one variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    Int(i32),
    Str(String),
}

impl Key {
    /// The discriminator of this key.
    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Int(_) => KeyType::Int,
            Key::Str(_) => KeyType::Str,
        }
    }

    /// Serialized size in bytes.
    ///
    /// Integers are 4 bytes; strings are a 2-byte length prefix plus
    /// their UTF-8 bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Key::Int(_) => 4,
            Key::Str(s) => 2 + s.len(),
        }
    }

    /// Append this key's encoding to a buffer.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Key::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Key::Str(s) => {
                out.extend_from_slice(&(s.len() as u16).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Decode a key from the front of a cell.
    ///
    /// Returns the key and the number of bytes consumed.
    pub fn decode(key_type: KeyType, data: &[u8]) -> Result<(Self, usize)> {
        match key_type {
            KeyType::Int => {
                if data.len() < 4 {
                    return Err(Error::MalformedEntry);
                }
                let v = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                Ok((Key::Int(v), 4))
            }
            KeyType::Str => {
                if data.len() < 2 {
                    return Err(Error::MalformedEntry);
                }
                let len = u16::from_le_bytes([data[0], data[1]]) as usize;
                if data.len() < 2 + len {
                    return Err(Error::MalformedEntry);
                }
                let s = std::str::from_utf8(&data[2..2 + len])
                    .map_err(|_| Error::MalformedEntry)?;
                Ok((Key::Str(s.to_string()), 2 + len))
            }
        }
    }

    /// Validate this key against an index's configuration.
    ///
    /// # Errors
    /// - `Error::KeyTypeMismatch` if the discriminator disagrees
    /// - `Error::KeyTooLong` if the encoding exceeds `max_size`
    pub fn check(&self, key_type: KeyType, max_size: usize) -> Result<()> {
        if self.key_type() != key_type {
            return Err(Error::KeyTypeMismatch {
                expected: key_type,
                found: self.key_type(),
            });
        }
        let len = self.encoded_len();
        if len > max_size {
            return Err(Error::KeyTooLong {
                got: len,
                max: max_size,
            });
        }
        Ok(())
    }
}
