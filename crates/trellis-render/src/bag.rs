//! Attribute bags: the run-time props of one component invocation.

use indexmap::IndexMap;
use smol_str::SmolStr;
use trellis_engine::Value;

/// The props passed to a component invocation.
///
/// A bag is a per-invocation value: it owns nothing beyond the invocation it
/// was built for and is dropped when the nested render returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag {
    values: IndexMap<SmolStr, Value>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from an evaluated attribute map. Non-object values yield
    /// an empty bag.
    pub fn from_value(value: Value) -> Self {
        let mut bag = Self::new();
        if let Value::Object(map) = value {
            for (k, v) in map {
                bag.values.insert(SmolStr::from(k), v);
            }
        }
        bag
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Merge default values in place. Explicitly passed attributes keep
    /// priority: a default never overrides an existing entry.
    pub fn merge(&mut self, defaults: AttributeBag) {
        for (name, value) in defaults.values {
            self.values.entry(name).or_insert(value);
        }
    }

    /// A new, independent bag without the named entries.
    pub fn except(&self, names: &[&str]) -> AttributeBag {
        Self {
            values: self
                .values
                .iter()
                .filter(|(name, _)| !names.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// The bag as a scope value, for the `attributes` variable.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
