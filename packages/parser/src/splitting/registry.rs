//! Registry of provision types that are split deterministically.

use std::collections::HashMap;

use super::types::SplitSpec;

/// Maps provision types to their split rule.
pub struct SplitRegistry {
    specs: HashMap<String, SplitSpec>,
}

impl SplitRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Register a split rule, replacing any previous rule for the type.
    pub fn register(&mut self, spec: SplitSpec) {
        self.specs.insert(spec.provision_type.clone(), spec);
    }

    #[must_use]
    pub fn get_spec(&self, provision_type: &str) -> Option<&SplitSpec> {
        self.specs.get(provision_type)
    }

    /// Whether sections of this type bypass external extraction.
    #[must_use]
    pub fn is_presplit(&self, provision_type: &str) -> bool {
        self.specs.contains_key(provision_type)
    }
}

impl Default for SplitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitting::SplitMethod;

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = SplitRegistry::new();
        registry.register(SplitSpec::new("DEF", SplitMethod::Definitions));

        let spec = registry.get_spec("DEF").unwrap();
        assert_eq!(spec.method, SplitMethod::Definitions);
        assert_eq!(spec.min_markers, 1);
    }

    #[test]
    fn test_registry_is_presplit() {
        let mut registry = SplitRegistry::new();
        registry.register(SplitSpec::new("COB", SplitMethod::LetteredClauses));

        assert!(registry.is_presplit("COB"));
        assert!(!registry.is_presplit("MAE"));
    }
}
