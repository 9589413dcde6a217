//! Captured slot content for one component invocation.

use indexmap::IndexMap;
use smol_str::SmolStr;

/// Name of the default (unnamed) slot.
pub const DEFAULT_SLOT: &str = "slot";

/// The slots captured for one invocation: name → rendered string.
///
/// Redefining a slot name within one invocation is last-write-wins. That is
/// a deliberate contract, not an accident of implementation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotSet {
    slots: IndexMap<SmolStr, String>,
}

impl SlotSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a slot. An existing slot of the same name is replaced.
    pub fn insert(&mut self, name: impl Into<SmolStr>, content: String) {
        self.slots.insert(name.into(), content);
    }

    /// Store the default slot body.
    pub fn insert_default(&mut self, content: String) {
        self.insert(DEFAULT_SLOT, content);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &String)> {
        self.slots.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
