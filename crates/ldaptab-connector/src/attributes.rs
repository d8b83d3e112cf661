//! Directory entries and their normalized attribute maps.

use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;

/// Key under which the entry's distinguished name is stored.
pub const DN_KEY: &str = "dn";

/// An entry exactly as returned by the directory.
///
/// Attribute names keep the server's casing and values stay raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attributes in the order the server returned them.
    pub attributes: Vec<(String, Vec<Vec<u8>>)>,
}

impl RawEntry {
    /// Create an entry without attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Append an attribute with its values.
    pub fn with_values<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.attributes
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Append a single-valued attribute.
    pub fn with_value(self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.with_values(name, [value.into()])
    }
}

/// The value of one attribute, in one of its two shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Exactly one value.
    Single(Vec<u8>),
    /// Zero or several values, in server order.
    List(Vec<Vec<u8>>),
}

impl AttributeValue {
    fn from_values(values: &[Vec<u8>]) -> Self {
        match values {
            [single] => AttributeValue::Single(single.clone()),
            many => AttributeValue::List(many.to_vec()),
        }
    }

    /// All values as a slice-like list.
    pub fn values(&self) -> Vec<&[u8]> {
        match self {
            AttributeValue::Single(v) => vec![v.as_slice()],
            AttributeValue::List(values) => values.iter().map(Vec::as_slice).collect(),
        }
    }
}

/// Case-insensitive, multi-valued view of a directory entry.
///
/// Keys are lowercased once at construction. The map is immutable and cheap
/// to clone, so it can be handed to the host and read from several threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    inner: Arc<HashMap<String, Vec<Vec<u8>>>>,
}

impl AttributeMap {
    /// Build a map from already-collected attributes.
    ///
    /// Names are lowercased; when two names collide the last one wins.
    pub fn from_attributes<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<Vec<u8>>)>,
        K: AsRef<str>,
    {
        let inner = attributes
            .into_iter()
            .map(|(name, values)| (name.as_ref().to_lowercase(), values))
            .collect();
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Raw values of an attribute, looked up case-insensitively.
    pub fn get(&self, name: &str) -> Option<&[Vec<u8>]> {
        if let Some(values) = self.inner.get(name) {
            return Some(values.as_slice());
        }
        self.inner.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    /// The attribute in its tagged shape.
    pub fn value(&self, name: &str) -> Option<AttributeValue> {
        self.get(name).map(AttributeValue::from_values)
    }

    /// First value of an attribute decoded as UTF-8 (lossy).
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(|values| values.first())
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// All values of an attribute decoded as UTF-8 (lossy).
    pub fn get_strings(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|values| {
                values
                    .iter()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinguished name of the entry.
    pub fn dn(&self) -> String {
        self.get_str(DN_KEY).unwrap_or_default()
    }

    /// Check if an attribute is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Lowercased attribute names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// Number of attributes, including `dn`.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over attribute names and raw values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Vec<u8>>)> {
        self.inner.iter()
    }

    /// Render the map as JSON for logging.
    ///
    /// UTF-8 values become strings; binary values become base64 strings
    /// prefixed with `base64:`.
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .inner
            .iter()
            .map(|(name, values)| {
                let rendered = values
                    .iter()
                    .map(|v| match std::str::from_utf8(v) {
                        Ok(s) => serde_json::Value::String(s.to_string()),
                        Err(_) => serde_json::Value::String(format!(
                            "base64:{}",
                            base64::engine::general_purpose::STANDARD.encode(v)
                        )),
                    })
                    .collect();
                (name.clone(), serde_json::Value::Array(rendered))
            })
            .collect();
        serde_json::Value::Object(object)
    }
}

/// Convert a raw directory entry into its canonical attribute map.
///
/// The map is seeded with `dn`; every returned attribute is inserted under
/// its lowercased name with its values untouched.
pub fn normalize(entry: RawEntry) -> AttributeMap {
    let mut map: HashMap<String, Vec<Vec<u8>>> = HashMap::with_capacity(entry.attributes.len() + 1);
    map.insert(DN_KEY.to_string(), vec![entry.dn.into_bytes()]);
    for (name, values) in entry.attributes {
        map.insert(name.to_lowercase(), values);
    }
    AttributeMap {
        inner: Arc::new(map),
    }
}
