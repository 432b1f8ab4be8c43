//! In-memory brick registry.

use super::Brick;
use crate::errors::{BrickflowError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps registry ids to brick instances.
#[derive(Debug, Default)]
pub struct BrickRegistry {
    bricks: RwLock<HashMap<String, Arc<dyn Brick>>>,
}

impl BrickRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a brick, replacing any brick with the same id.
    pub fn register(&self, brick: Arc<dyn Brick>) {
        self.bricks.write().insert(brick.id().to_string(), brick);
    }

    /// Registers several bricks.
    pub fn register_all(&self, bricks: impl IntoIterator<Item = Arc<dyn Brick>>) {
        let mut map = self.bricks.write();
        for brick in bricks {
            map.insert(brick.id().to_string(), brick);
        }
    }

    /// Looks up a brick by id.
    pub fn lookup(&self, id: &str) -> Result<Arc<dyn Brick>> {
        self.bricks
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BrickflowError::invalid_definition(format!("Unknown brick: {id}")))
    }

    /// Returns true if a brick with `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.bricks.read().contains_key(id)
    }

    /// Returns the registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.bricks.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Removes every brick (primarily for tests).
    pub fn clear(&self) {
        self.bricks.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBrick;

    #[test]
    fn test_register_and_lookup() {
        let registry = BrickRegistry::new();
        registry.register(Arc::new(MockBrick::new("@acme/a")));

        assert!(registry.contains("@acme/a"));
        assert_eq!(registry.lookup("@acme/a").unwrap().id(), "@acme/a");

        let err = registry.lookup("@acme/missing").unwrap_err();
        assert_eq!(err.name(), "InvalidDefinitionError");
    }

    #[test]
    fn test_register_all_and_clear() {
        let registry = BrickRegistry::new();
        registry.register_all([
            Arc::new(MockBrick::new("@acme/b")) as Arc<dyn Brick>,
            Arc::new(MockBrick::new("@acme/a")),
        ]);
        assert_eq!(registry.ids(), vec!["@acme/a", "@acme/b"]);

        registry.clear();
        assert!(registry.ids().is_empty());
    }
}
