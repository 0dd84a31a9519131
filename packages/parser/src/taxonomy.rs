//! Provision type codes shared by splitting, completeness checks and classification.

/// Material adverse effect.
pub const MAE: &str = "MAE";

/// No solicitation of competing proposals.
pub const NOSOL: &str = "NOSOL";

/// Termination fees.
pub const TFEE: &str = "TFEE";

/// Conditions to closing.
pub const COND: &str = "COND";

/// Termination rights.
pub const TERM: &str = "TERM";

/// Interim conduct of business.
pub const COB: &str = "COB";

/// Merger consideration.
pub const CONS: &str = "CONS";

/// Representations and warranties.
pub const REP: &str = "REP";

/// Employee matters.
pub const EMP: &str = "EMP";

/// Indemnification and insurance.
pub const IND: &str = "IND";

/// Efforts and regulatory approvals.
pub const EFF: &str = "EFF";

/// Financing cooperation.
pub const FIN: &str = "FIN";

/// Governing law, jurisdiction and venue.
pub const GOV: &str = "GOV";

/// Definitions.
pub const DEF: &str = "DEF";

/// Notices.
pub const NOTICE: &str = "NOTICE";

/// Remedies and specific performance.
pub const REM: &str = "REM";

/// Miscellaneous boilerplate.
pub const MISC: &str = "MISC";

/// Overflow type for sections that could not be classified.
pub const OTHER: &str = "OTHER";

/// Category label of the overflow type.
pub const OTHER_CATEGORY: &str = "Other Provisions";

/// Types always extracted at high complexity.
pub const HIGH_VALUE_TYPES: &[&str] = &[MAE, NOSOL, TFEE, COND];
