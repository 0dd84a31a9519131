//! Default split rules for merger agreements.

use super::registry::SplitRegistry;
use super::types::{SplitMethod, SplitSpec};
use crate::taxonomy::{COB, COND, DEF, EMP, TERM};

/// Create the registry of deterministically split provision types.
///
/// ```text
/// DEF   quoted defined terms     ("Affiliate" means ...)
/// COB   lettered sub-clauses     (a) ... (b) ...
/// COND  lettered sub-clauses
/// TERM  lettered sub-clauses
/// EMP   lettered sub-clauses
/// ```
#[must_use]
pub fn create_presplit_registry() -> SplitRegistry {
    let mut registry = SplitRegistry::new();

    registry.register(SplitSpec::new(DEF, SplitMethod::Definitions));

    for provision_type in [COB, COND, TERM, EMP] {
        registry.register(SplitSpec::new(provision_type, SplitMethod::LetteredClauses));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_presplit_registry() {
        let registry = create_presplit_registry();

        let def = registry.get_spec(DEF).unwrap();
        assert_eq!(def.method, SplitMethod::Definitions);

        let cob = registry.get_spec(COB).unwrap();
        assert_eq!(cob.method, SplitMethod::LetteredClauses);
        assert_eq!(cob.min_markers, 2);

        assert!(registry.is_presplit(TERM));
        assert!(!registry.is_presplit("GOV"));
    }
}
