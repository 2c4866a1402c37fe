//! Camera attribute store used by the mock camera.
//!
//! Attribute values are kept as their text tokens; a multi-valued attribute
//! has several.

use phantom_core::{Error, Result};
use std::collections::BTreeMap;

/// Key/value store behind `get` and `set`.
pub trait AttributeStore: Send + 'static {
    /// Value tokens of `name`.
    ///
    /// # Errors
    /// Returns `Error::UnknownAttribute` for names the camera does not have.
    fn get(&self, name: &str) -> Result<Vec<String>>;

    /// Replace the value of an existing attribute.
    ///
    /// # Errors
    /// Returns `Error::UnknownAttribute` for names the camera does not have.
    fn set(&mut self, name: &str, value: Vec<String>) -> Result<()>;

    /// Every readable attribute name.
    fn property_names(&self) -> Vec<String>;
}

/// Defaults of a mock camera.
const DEFAULT_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("info.sensor", &["1"]),
    ("info.snsversion", &["13302"]),
    ("info.cfa", &["1"]),
    ("info.filter", &["1"]),
    ("info.hwver", &["1200"]),
    ("info.kernel", &["1200"]),
    ("info.swver", &["1200"]),
    ("info.xver", &["34"]),
    ("info.model", &["Phantom v2632"]),
    ("info.pver", &["16"]),
    ("info.sver", &["78"]),
    ("info.serial", &["146299363572937"]),
    ("info.name", &["MockPhantom"]),
    ("info.imgformats", &["8", "8R", "P10", "P12L", "P16", "P16R"]),
    ("info.xmax", &["1280"]),
    ("info.ymax", &["800"]),
    ("defc.res", &["1280x800"]),
    ("defc.exp", &["1000"]),
    ("defc.rate", &["1000"]),
    ("defc.ptframes", &["100"]),
    ("defc.mode", &["0"]),
];

/// In-memory attribute table.
#[derive(Debug, Clone)]
pub struct CameraAttributes {
    values: BTreeMap<String, Vec<String>>,
}

impl CameraAttributes {
    /// Empty table; every name is unknown.
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Table with an extra (or overridden) single-valued attribute.
    pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_values(name, std::iter::once(value))
    }

    pub fn with_values<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

impl Default for CameraAttributes {
    fn default() -> Self {
        DEFAULT_ATTRIBUTES
            .iter()
            .fold(Self::empty(), |table, (name, values)| {
                table.with_values(*name, values.iter().copied())
            })
    }
}

impl AttributeStore for CameraAttributes {
    fn get(&self, name: &str) -> Result<Vec<String>> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAttribute(name.to_string()))
    }

    fn set(&mut self, name: &str, value: Vec<String>) -> Result<()> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::UnknownAttribute(name.to_string())),
        }
    }

    fn property_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("info.name", &["MockPhantom"])]
    #[case("info.pver", &["16"])]
    #[case("info.hwver", &["1200"])]
    #[case("defc.res", &["1280x800"])]
    #[case("info.imgformats", &["8", "8R", "P10", "P12L", "P16", "P16R"])]
    fn test_defaults(#[case] name: &str, #[case] expected: &[&str]) {
        let attributes = CameraAttributes::default();
        assert_eq!(attributes.get(name).unwrap(), expected);
    }

    #[test]
    fn test_unknown_attribute() {
        let mut attributes = CameraAttributes::default();
        assert!(matches!(
            attributes.get("info.bogus"),
            Err(Error::UnknownAttribute(name)) if name == "info.bogus"
        ));
        assert!(attributes.set("info.bogus", vec!["1".into()]).is_err());
    }

    #[test]
    fn test_set_replaces_value() {
        let mut attributes = CameraAttributes::default();
        attributes.set("defc.exp", vec!["250".into()]).unwrap();
        assert_eq!(attributes.get("defc.exp").unwrap(), vec!["250"]);
    }

    #[test]
    fn test_property_names_sorted() {
        let attributes = CameraAttributes::empty().with("b.x", "1").with("a.y", "2");
        assert_eq!(attributes.property_names(), vec!["a.y", "b.x"]);
    }
}
