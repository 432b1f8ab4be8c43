//! Memoized capability queries.

use super::{Brick, BrickRegistry};
use crate::errors::{BrickflowError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Capabilities of a brick, resolved once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickCapabilities {
    /// The brick has no side effects.
    pub pure: bool,
    /// The brick operates relative to a root element.
    pub root_aware: bool,
}

/// Resolves and caches `is_pure`/`is_root_aware` per brick id.
///
/// One resolver lives for one top-level run, including its nested pipelines.
#[derive(Debug)]
pub struct CapabilityResolver {
    registry: Arc<BrickRegistry>,
    cache: DashMap<String, BrickCapabilities>,
}

impl CapabilityResolver {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub fn new(registry: Arc<BrickRegistry>) -> Self {
        Self {
            registry,
            cache: DashMap::new(),
        }
    }

    /// Returns the capabilities of `brick`, querying it on first use.
    pub async fn resolve(&self, brick: &dyn Brick) -> Result<BrickCapabilities> {
        CapabilityScope::root(self).resolve(brick).await
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if nothing was resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// A capability query in progress.
///
/// Handed to [`Brick::is_pure`] and [`Brick::is_root_aware`]. Composite bricks
/// resolve their nested bricks through it, which shares the run's cache and
/// rejects bricks that contain themselves.
#[derive(Debug)]
pub struct CapabilityScope<'a> {
    resolver: &'a CapabilityResolver,
    path: Vec<String>,
}

impl<'a> CapabilityScope<'a> {
    fn root(resolver: &'a CapabilityResolver) -> Self {
        Self {
            resolver,
            path: Vec::new(),
        }
    }

    /// Returns the registry nested bricks are looked up in.
    #[must_use]
    pub fn registry(&self) -> &BrickRegistry {
        &self.resolver.registry
    }

    /// Ids of the bricks whose capabilities are being resolved, outermost first.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Resolves `brick` within this scope.
    pub async fn resolve(&self, brick: &dyn Brick) -> Result<BrickCapabilities> {
        let id = brick.id();
        if self.path.iter().any(|entry| entry == id) {
            let chain = self
                .path
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(id))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(BrickflowError::invalid_definition(format!(
                "Recursive brick {id}: {chain}"
            )));
        }
        if let Some(cached) = self.resolver.cache.get(id) {
            return Ok(*cached);
        }

        let mut path = self.path.clone();
        path.push(id.to_string());
        let nested = CapabilityScope {
            resolver: self.resolver,
            path,
        };
        let capabilities = BrickCapabilities {
            pure: brick.is_pure(&nested).await?,
            root_aware: brick.is_root_aware(&nested).await?,
        };
        self.resolver.cache.insert(id.to_string(), capabilities);
        Ok(capabilities)
    }

    /// Looks up `id` and resolves it within this scope.
    pub async fn resolve_id(&self, id: &str) -> Result<BrickCapabilities> {
        let brick = self.registry().lookup(id)?;
        self.resolve(brick.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBrick;

    #[tokio::test]
    async fn test_resolves_once_per_brick() {
        let registry = Arc::new(BrickRegistry::new());
        let resolver = CapabilityResolver::new(Arc::clone(&registry));
        let brick = MockBrick::new("@acme/a").pure().root_aware();

        let first = resolver.resolve(&brick).await.unwrap();
        let second = resolver.resolve(&brick).await.unwrap();

        assert_eq!(first, BrickCapabilities { pure: true, root_aware: true });
        assert_eq!(first, second);
        assert_eq!(brick.capability_queries(), 2);
        assert_eq!(resolver.len(), 1);
    }

    #[tokio::test]
    async fn test_scope_rejects_brick_already_on_path() {
        let registry = Arc::new(BrickRegistry::new());
        let resolver = CapabilityResolver::new(registry);
        let brick = MockBrick::new("@acme/a");

        let scope = CapabilityScope {
            resolver: &resolver,
            path: vec!["@acme/outer".to_string(), "@acme/a".to_string()],
        };
        let err = scope.resolve(&brick).await.unwrap_err();
        assert_eq!(err.name(), "InvalidDefinitionError");
        assert!(err.message().contains("@acme/outer -> @acme/a -> @acme/a"));
        assert_eq!(brick.capability_queries(), 0);
        assert!(resolver.is_empty());
    }
}
