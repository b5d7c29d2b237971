//! Header representations and normalization.
//!
//! Headers reach the client in three shapes: an entry-iterable collection
//! (an [`http::HeaderMap`]), an ordered list of `(name, value)` pairs, or a
//! plain name → value record. Every merge in the client goes through
//! [`headers_init_to_record`], which turns any of them into a [`HeaderRecord`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use http::HeaderMap;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

/// Plain header mapping: name → value, one value per name.
pub type HeaderRecord = BTreeMap<String, String>;

// ============================================================================
// Headers Init
// ============================================================================

/// Any accepted header representation.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadersInit {
    /// Entry-iterable collection. Later entries for a name win.
    Entries(HeaderMap),
    /// Ordered `(name, value)` pairs. Pairs with an empty name or a missing
    /// value are dropped; later duplicates win.
    Pairs(Vec<(String, Option<String>)>),
    /// A plain record, used as-is.
    Map(HeaderRecord),
}

impl HeadersInit {
    /// Normalizes this representation into a plain record.
    pub fn into_record(self) -> HeaderRecord {
        match self {
            Self::Entries(map) => header_map_to_record(&map),
            Self::Pairs(pairs) => pairs_to_record(pairs),
            Self::Map(record) => record,
        }
    }
}

impl Default for HeadersInit {
    fn default() -> Self {
        Self::Map(HeaderRecord::new())
    }
}

impl From<HeaderMap> for HeadersInit {
    fn from(map: HeaderMap) -> Self {
        Self::Entries(map)
    }
}

impl From<HeaderRecord> for HeadersInit {
    fn from(record: HeaderRecord) -> Self {
        Self::Map(record)
    }
}

impl From<HashMap<String, String>> for HeadersInit {
    fn from(map: HashMap<String, String>) -> Self {
        Self::Map(map.into_iter().collect())
    }
}

impl From<Vec<(String, Option<String>)>> for HeadersInit {
    fn from(pairs: Vec<(String, Option<String>)>) -> Self {
        Self::Pairs(pairs)
    }
}

impl From<Vec<(String, String)>> for HeadersInit {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::Pairs(pairs.into_iter().map(|(k, v)| (k, Some(v))).collect())
    }
}

impl From<Vec<(&str, &str)>> for HeadersInit {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for HeadersInit
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        )
    }
}

// ============================================================================
// Serde
// ============================================================================

// Config files carry headers either as an object or as an array of pairs.
impl<'de> Deserialize<'de> for HeadersInit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = HeadersInit;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a header object or an array of [name, value] pairs")
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let record =
                    HeaderRecord::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(HeadersInit::Map(record))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(pair) = seq.next_element::<(String, Option<String>)>()? {
                    pairs.push(pair);
                }
                Ok(HeadersInit::Pairs(pairs))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(HeadersInit::default())
            }
        }

        deserializer.deserialize_any(HeadersVisitor)
    }
}

impl Serialize for HeadersInit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.clone().into_record().serialize(serializer)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Converts any accepted header representation into a plain record.
///
/// `None` yields an empty record.
pub fn headers_init_to_record(headers: Option<HeadersInit>) -> HeaderRecord {
    headers.map(HeadersInit::into_record).unwrap_or_default()
}

/// Converts a header collection (e.g. a response's headers) into a plain record.
///
/// Names come out lower-cased, as `HeaderMap` stores them. When a name has
/// several values the last one wins; values that are not valid UTF-8 are skipped.
pub fn header_map_to_record(headers: &HeaderMap) -> HeaderRecord {
    let mut record = HeaderRecord::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            record.insert(name.as_str().to_string(), value.to_string());
        }
    }
    record
}

/// Merges `overlay` over `base`; names present in both take the overlay value.
///
/// Names are matched ignoring ASCII case, as they are on the wire, and the
/// surviving entry keeps the overlay's spelling.
pub fn merge_headers(base: Option<HeadersInit>, overlay: Option<HeadersInit>) -> HeaderRecord {
    let mut merged = headers_init_to_record(base);
    for (name, value) in headers_init_to_record(overlay) {
        merged.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        merged.insert(name, value);
    }
    merged
}

fn pairs_to_record(pairs: Vec<(String, Option<String>)>) -> HeaderRecord {
    let mut record = HeaderRecord::new();
    for (name, value) in pairs {
        if name.is_empty() {
            continue;
        }
        if let Some(value) = value {
            record.insert(name, value);
        }
    }
    record
}

// ============================================================================
// Tests
// ============================================================================
