//! Structured values of the camera parameter language.
//!
//! Command arguments and response payloads share one small value language:
//!
//! ```text
//! 42                  unsigned integer
//! -1                  signed integer
//! 0x1b                hexadecimal integer
//! "Phantom"           quoted string
//! 1920 x 1080         resolution
//! info.name           dotted name
//! {cine: -1, cnt: 1}  tagged list
//! ```
//!
//! [`Value`]'s [`Display`](fmt::Display) implementation is the renderer: it
//! produces text that [`parse`](crate::parse) reads back into an equal value.
//!
//! ```
//! use phantom_protocol::{TaggedList, Value, parse};
//!
//! let mut params = TaggedList::new();
//! params.insert("cine", Value::SignedInt(-1));
//! params.insert("cnt", Value::UnsignedInt(1));
//!
//! let text = Value::List(params.clone()).to_string();
//! assert_eq!(text, "{cine: -1, cnt: 1}");
//! assert_eq!(parse(&text).unwrap(), Value::List(params));
//! ```

use phantom_core::Resolution;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dotted identifier path such as `info.sensor.temp`, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DottedName(String);

impl DottedName {
    /// Wrap a name without validating it.
    ///
    /// The parser only ever produces well-formed names; hand-built names that
    /// are not identifiers render fine but will not parse back.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DottedName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DottedName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One parsed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    UnsignedInt(u64),
    /// Produced by the parser only for literals written with a leading `-`.
    SignedInt(i64),
    HexInt(u64),
    QuotedString(String),
    Resolution(Resolution),
    Name(DottedName),
    List(TaggedList),
}

impl Value {
    /// Integer content of any of the three integer variants.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::UnsignedInt(n) | Value::HexInt(n) => i64::try_from(*n).ok(),
            Value::SignedInt(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UnsignedInt(n) | Value::HexInt(n) => Some(*n),
            Value::SignedInt(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_resolution(&self) -> Option<Resolution> {
        match self {
            Value::Resolution(res) => Some(*res),
            _ => None,
        }
    }

    /// Text content of a quoted string or a bare name.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::QuotedString(s) => Some(s),
            Value::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&TaggedList> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::UnsignedInt(n) => write!(f, "{n}"),
            Value::SignedInt(n) => write!(f, "{n}"),
            Value::HexInt(n) => write!(f, "0x{n:x}"),
            Value::QuotedString(s) => write!(f, "\"{s}\""),
            // "0x<h>" would read back as a hex literal
            Value::Resolution(res) if res.width == 0 => write!(f, "0 x {}", res.height),
            Value::Resolution(res) => write!(f, "{res}"),
            Value::Name(name) => write!(f, "{name}"),
            Value::List(list) => write!(f, "{list}"),
        }
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UnsignedInt(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        if n < 0 {
            Value::SignedInt(n)
        } else {
            Value::UnsignedInt(n.unsigned_abs())
        }
    }
}

impl From<Resolution> for Value {
    fn from(res: Resolution) -> Self {
        Value::Resolution(res)
    }
}

impl From<TaggedList> for Value {
    fn from(list: TaggedList) -> Self {
        Value::List(list)
    }
}

/// Ordered `name: value` mapping written as `{name: value, ...}`.
///
/// Keys keep the order in which they were first inserted. Inserting an
/// existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedList {
    entries: Vec<(DottedName, Value)>,
}

impl TaggedList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<DottedName>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<DottedName>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DottedName, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &DottedName> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl fmt::Display for TaggedList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

impl<K: Into<DottedName>, V: Into<Value>> FromIterator<(K, V)> for TaggedList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = TaggedList::new();
        for (k, v) in iter {
            list.insert(k, v);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_overwrites_in_place() {
        let mut list = TaggedList::new();
        list.insert("a", Value::UnsignedInt(1));
        list.insert("b", Value::UnsignedInt(2));
        let previous = list.insert("a", Value::UnsignedInt(3));

        assert_eq!(previous, Some(Value::UnsignedInt(1)));
        assert_eq!(list.len(), 2);
        let keys: Vec<&str> = list.keys().map(DottedName::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(list.get("a"), Some(&Value::UnsignedInt(3)));
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(Value::UnsignedInt(272).to_string(), "272");
        assert_eq!(Value::SignedInt(-272).to_string(), "-272");
        assert_eq!(Value::HexInt(0x001b21).to_string(), "0x1b21");
        assert_eq!(Value::QuotedString("a b".into()).to_string(), "\"a b\"");
        assert_eq!(
            Value::Resolution(Resolution::new(640, 480)).to_string(),
            "640x480"
        );
        assert_eq!(
            Value::Resolution(Resolution::new(0, 480)).to_string(),
            "0 x 480"
        );
        assert_eq!(Value::Name("info.name".into()).to_string(), "info.name");
    }

    #[test]
    fn test_render_nested_list() {
        let inner = TaggedList::new().with("x", 1u64);
        let outer = TaggedList::new().with("port", 7116u64).with("opt", inner);
        assert_eq!(outer.to_string(), "{port: 7116, opt: {x: 1}}");
    }

    #[test]
    fn test_from_i64_picks_variant() {
        assert_eq!(Value::from(-1i64), Value::SignedInt(-1));
        assert_eq!(Value::from(5i64), Value::UnsignedInt(5));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::SignedInt(-1).as_i64(), Some(-1));
        assert_eq!(Value::HexInt(16).as_u64(), Some(16));
        assert_eq!(Value::SignedInt(-1).as_u64(), None);
        assert_eq!(Value::Name("x.y".into()).as_str(), Some("x.y"));
        assert!(Value::UnsignedInt(1).as_list().is_none());
    }

    #[test]
    fn test_dotted_name_segments() {
        let name = DottedName::new("info.sensor.temp");
        assert_eq!(name.segments().collect::<Vec<_>>(), vec!["info", "sensor", "temp"]);
    }
}
