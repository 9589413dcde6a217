//! The data scope a template program executes against.

use indexmap::IndexMap;
use smol_str::SmolStr;

/// Scope values are plain JSON values.
pub type Value = serde_json::Value;

/// An ordered name → value map holding the variables visible to a template.
///
/// Insertion order is preserved so that generated output and diagnostics are
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: IndexMap<SmolStr, Value>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scope from a JSON object. Non-object values yield an empty scope.
    pub fn from_value(value: Value) -> Self {
        let mut scope = Self::new();
        if let Value::Object(map) = value {
            for (k, v) in map {
                scope.vars.insert(SmolStr::from(k), v);
            }
        }
        scope
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Set a variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<SmolStr>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Remove a variable, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Iterate over variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(SmolStr, Value)> for Scope {
    fn from_iter<I: IntoIterator<Item = (SmolStr, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
