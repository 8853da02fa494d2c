//! # Node type registry
//!
//! Maps a node kind name to its [`NodeDefinition`]. Lookup consults three
//! tiers in order:
//!
//! 1. **Builtin**: the closed [`BuiltinKind`] set (branches, loops, waits).
//! 2. **Core**: the standard catalog seeded by [`Registry::new`].
//! 3. **Custom**: kinds added by embedding code through [`Registry::register`].
//!
//! The first two tiers are fixed once the registry exists. The custom tier
//! sits behind a reader/writer lock so one `Arc<Registry>` can serve several
//! compilations running on different threads.
//!
//! ```rust
//! use kumiki::registry::{NodeCategory, NodeDefinition, Registry};
//! use kumiki::schema::ValueType;
//!
//! let registry = Registry::new();
//! registry
//!     .register(
//!         NodeDefinition::new("spawnBoss", NodeCategory::Custom)
//!             .input("level", ValueType::Int),
//!     )
//!     .unwrap();
//! assert!(registry.contains("spawnBoss"));
//! ```

mod builtin;
mod definition;

pub use builtin::BuiltinKind;
pub use definition::*;

use crate::error::RegistryError;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegistryTier {
    Builtin,
    Core,
    Custom,
}

impl RegistryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryTier::Builtin => "builtin",
            RegistryTier::Core => "core",
            RegistryTier::Custom => "custom",
        }
    }
}

impl fmt::Display for RegistryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Registry {
    builtin: AHashMap<String, Arc<NodeDefinition>>,
    core: AHashMap<String, Arc<NodeDefinition>>,
    custom: RwLock<AHashMap<String, Arc<NodeDefinition>>>,
}

impl Registry {
    /// A registry holding the builtin tier and the standard core catalog.
    pub fn new() -> Self {
        let mut registry = Self::with_builtins();
        crate::nodes::register_core(&mut registry);
        tracing::debug!(
            builtin = registry.builtin.len(),
            core = registry.core.len(),
            "registry seeded"
        );
        registry
    }

    /// A registry holding only the builtin control structures.
    pub fn with_builtins() -> Self {
        let builtin = BuiltinKind::ALL
            .into_iter()
            .map(|kind| (kind.as_str().to_string(), Arc::new(kind.definition())))
            .collect();
        Self {
            builtin,
            core: AHashMap::new(),
            custom: RwLock::new(AHashMap::new()),
        }
    }

    /// Adds a custom kind. Fails if the name exists in any tier.
    ///
    /// Custom kinds are always linear; control structures are builtin.
    pub fn register(&self, definition: NodeDefinition) -> Result<(), RegistryError> {
        if definition.kind.is_empty() {
            return Err(RegistryError::EmptyKind);
        }
        let mut definition = definition;
        definition.shape = FlowShape::Linear;

        // Hold the write lock across the check so two racing registrations
        // of the same name cannot both succeed.
        let mut custom = self.custom.write();
        if let Some(tier) = self.fixed_tier_of(&definition.kind) {
            return Err(RegistryError::Duplicate {
                kind: definition.kind,
                tier: tier.as_str(),
            });
        }
        if custom.contains_key(&definition.kind) {
            return Err(RegistryError::Duplicate {
                kind: definition.kind,
                tier: RegistryTier::Custom.as_str(),
            });
        }
        tracing::debug!(kind = %definition.kind, emitter = definition.has_emitter(), "registered custom node kind");
        custom.insert(definition.kind.clone(), Arc::new(definition));
        Ok(())
    }

    /// Seeds the core tier. Core names are chosen by this crate and never
    /// collide, so this is infallible.
    pub(crate) fn insert_core(&mut self, definition: NodeDefinition) {
        debug_assert!(
            !self.builtin.contains_key(&definition.kind)
                && !self.core.contains_key(&definition.kind),
            "duplicate core kind {}",
            definition.kind
        );
        self.core
            .insert(definition.kind.clone(), Arc::new(definition));
    }

    pub fn lookup(&self, kind: &str) -> Option<Arc<NodeDefinition>> {
        if let Some(def) = self.builtin.get(kind).or_else(|| self.core.get(kind)) {
            return Some(Arc::clone(def));
        }
        self.custom.read().get(kind).cloned()
    }

    pub fn tier_of(&self, kind: &str) -> Option<RegistryTier> {
        self.fixed_tier_of(kind).or_else(|| {
            self.custom
                .read()
                .contains_key(kind)
                .then_some(RegistryTier::Custom)
        })
    }

    fn fixed_tier_of(&self, kind: &str) -> Option<RegistryTier> {
        if self.builtin.contains_key(kind) {
            Some(RegistryTier::Builtin)
        } else if self.core.contains_key(kind) {
            Some(RegistryTier::Core)
        } else {
            None
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.tier_of(kind).is_some()
    }

    /// Every registered kind, sorted by tier and then by name.
    pub fn kinds(&self) -> Vec<(RegistryTier, String)> {
        let custom = self.custom.read();
        let mut kinds: Vec<(RegistryTier, String)> = self
            .builtin
            .keys()
            .map(|k| (RegistryTier::Builtin, k.clone()))
            .chain(self.core.keys().map(|k| (RegistryTier::Core, k.clone())))
            .chain(custom.keys().map(|k| (RegistryTier::Custom, k.clone())))
            .collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.builtin.len() + self.core.len() + self.custom.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("builtin", &self.builtin.len())
            .field("core", &self.core.len())
            .field("custom", &self.custom.read().len())
            .finish()
    }
}
