use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Vec3;

/// Ordered string fields captured from one persister.
///
/// Field meaning belongs to the persister kind that wrote them; the store and the
/// file format only move them around by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Vec<String>);

impl Snapshot {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn reader(&self) -> SnapshotReader<'_> {
        SnapshotReader {
            fields: &self.0,
            index: 0,
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Snapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("snapshot field {index} is missing (snapshot has {len} fields)")]
    MissingField { index: usize, len: usize },
    #[error("snapshot field {index} is not a valid {expected}: {raw:?}")]
    InvalidField {
        index: usize,
        expected: &'static str,
        raw: String,
    },
    #[error("snapshot has {actual} fields, expected {expected}")]
    UnexpectedFieldCount { expected: usize, actual: usize },
}

/// A value with a stable textual encoding inside a [`Snapshot`].
///
/// `decode(&encode(v))` must give back `v`; producers and consumers of a kind's
/// snapshot rely on that symmetry since the save file only carries strings.
pub trait SnapshotField: Sized {
    const TYPE_NAME: &'static str;

    fn encode(&self) -> String;
    fn decode(raw: &str) -> Option<Self>;
}

impl SnapshotField for bool {
    const TYPE_NAME: &'static str = "bool";

    fn encode(&self) -> String {
        let word = if *self { "True" } else { "False" };
        word.to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            Some(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }
}

macro_rules! impl_display_field {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl SnapshotField for $ty {
                const TYPE_NAME: &'static str = $name;

                fn encode(&self) -> String {
                    self.to_string()
                }

                fn decode(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }
            }
        )*
    };
}

impl_display_field!(
    i32 => "i32",
    i64 => "i64",
    u32 => "u32",
    u64 => "u64",
    f32 => "f32",
    f64 => "f64",
);

impl SnapshotField for String {
    const TYPE_NAME: &'static str = "string";

    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl SnapshotField for Vec3 {
    const TYPE_NAME: &'static str = "vector3";

    fn encode(&self) -> String {
        format!("({}, {}, {})", self.x, self.y, self.z)
    }

    fn decode(raw: &str) -> Option<Self> {
        let inner = raw.trim().strip_prefix('(')?.strip_suffix(')')?;
        let mut parts = inner.split(',').map(str::trim);
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Vec3 { x, y, z })
    }
}

#[derive(Debug, Default)]
pub struct SnapshotWriter {
    fields: Vec<String>,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: SnapshotField>(mut self, value: &T) -> Self {
        self.fields.push(value.encode());
        self
    }

    pub fn push_raw(mut self, raw: impl Into<String>) -> Self {
        self.fields.push(raw.into());
        self
    }

    pub fn finish(self) -> Snapshot {
        Snapshot(self.fields)
    }
}

pub struct SnapshotReader<'a> {
    fields: &'a [String],
    index: usize,
}

impl<'a> SnapshotReader<'a> {
    pub fn read<T: SnapshotField>(&mut self) -> Result<T, CodecError> {
        let raw = self.read_raw()?;
        T::decode(raw).ok_or_else(|| CodecError::InvalidField {
            index: self.index - 1,
            expected: T::TYPE_NAME,
            raw: raw.to_string(),
        })
    }

    pub fn read_raw(&mut self) -> Result<&'a str, CodecError> {
        let raw = self
            .fields
            .get(self.index)
            .ok_or(CodecError::MissingField {
                index: self.index,
                len: self.fields.len(),
            })?;
        self.index += 1;
        Ok(raw)
    }

    pub fn remaining(&self) -> usize {
        self.fields.len() - self.index
    }

    /// Rejects snapshots that carry more fields than the kind consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.index != self.fields.len() {
            return Err(CodecError::UnexpectedFieldCount {
                expected: self.index,
                actual: self.fields.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_use_capitalized_words() {
        let snapshot = SnapshotWriter::new().push(&true).push(&false).finish();
        assert_eq!(snapshot.fields(), ["True", "False"]);

        let mut reader = snapshot.reader();
        assert!(reader.read::<bool>().expect("first"));
        assert!(!reader.read::<bool>().expect("second"));
        reader.finish().expect("no trailing fields");
    }

    #[test]
    fn bool_decode_accepts_any_case() {
        assert_eq!(bool::decode(" true "), Some(true));
        assert_eq!(bool::decode("FALSE"), Some(false));
        assert_eq!(bool::decode("yes"), None);
    }

    #[test]
    fn vectors_are_component_triples() {
        let position = Vec3::new(1.5, -2.0, 0.25);
        let encoded = position.encode();
        assert_eq!(encoded, "(1.5, -2, 0.25)");
        assert_eq!(Vec3::decode(&encoded), Some(position));
        assert_eq!(Vec3::decode("(1, 2)"), None);
        assert_eq!(Vec3::decode("(1, 2, 3, 4)"), None);
        assert_eq!(Vec3::decode("1, 2, 3"), None);
    }

    #[test]
    fn float_encoding_survives_reparse() {
        let value = 0.1f32 + 0.2f32;
        assert_eq!(f32::decode(&value.encode()), Some(value));
    }

    #[test]
    fn missing_field_reports_position() {
        let snapshot = Snapshot::from_iter(["True"]);
        let mut reader = snapshot.reader();
        reader.read::<bool>().expect("first");
        let error = reader.read::<bool>().expect_err("second is missing");
        assert_eq!(error, CodecError::MissingField { index: 1, len: 1 });
    }

    #[test]
    fn invalid_field_reports_expected_type() {
        let snapshot = Snapshot::from_iter(["sprite_a", "maybe"]);
        let mut reader = snapshot.reader();
        assert_eq!(reader.read::<String>().expect("sprite"), "sprite_a");
        let error = reader.read::<bool>().expect_err("not a bool");
        assert_eq!(
            error,
            CodecError::InvalidField {
                index: 1,
                expected: "bool",
                raw: "maybe".to_string(),
            }
        );
    }

    #[test]
    fn finish_rejects_unconsumed_fields() {
        let snapshot = Snapshot::from_iter(["1", "2"]);
        let mut reader = snapshot.reader();
        let _ = reader.read::<u32>().expect("first");
        assert_eq!(reader.remaining(), 1);
        assert_eq!(
            reader.finish(),
            Err(CodecError::UnexpectedFieldCount {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn empty_string_field_is_preserved() {
        let snapshot = SnapshotWriter::new().push(&String::new()).finish();
        assert_eq!(snapshot.len(), 1);
        let mut reader = snapshot.reader();
        assert_eq!(reader.read::<String>().expect("empty"), "");
    }
}
