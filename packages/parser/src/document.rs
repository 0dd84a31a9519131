//! Deterministic document parse: normalize, parse structure, recover gaps.

use serde::Serialize;

use crate::config::validate_source;
use crate::error::Result;
use crate::gaps::{detect_gaps, recover_gaps};
use crate::normalize::normalize;
use crate::structure::{compare_toc, StructureParser};
use crate::types::{DelimiterPattern, Gap, Section, TocComparison};

/// A fully parsed agreement, ready for classification.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedDocument {
    /// Normalized text all offsets refer to.
    #[serde(skip)]
    pub normalized: String,

    pub sections: Vec<Section>,
    pub body_start: usize,
    pub pattern: DelimiterPattern,
    pub coverage_pct: f64,
    pub toc: TocComparison,

    /// Gaps before recovery.
    pub gaps_found: Vec<Gap>,

    pub recovered: usize,

    /// Gaps still open after recovery.
    pub remaining_gaps: Vec<Gap>,
}

/// Run the deterministic front half of ingestion on raw agreement text.
///
/// # Examples
/// ```
/// use clausebank_parser::parse_document;
///
/// let raw = "Section 1.1 Definitions. Terms used in this Agreement are defined here.\n\
///            Section 1.2 Interpretation. Headings are for convenience of reference only.\n\
///            Section 1.3 Construction. The parties jointly drafted this Agreement.";
/// let doc = parse_document(raw).unwrap();
/// assert_eq!(doc.sections.len(), 3);
/// assert!(doc.remaining_gaps.is_empty());
/// ```
pub fn parse_document(raw: &str) -> Result<ParsedDocument> {
    validate_source(raw)?;

    let normalized = normalize(raw);
    validate_source(&normalized)?;

    let parsed = StructureParser::new().parse(&normalized);
    let gaps_found = detect_gaps(&parsed.sections);
    let recovery = recover_gaps(&normalized, parsed.body_start, parsed.sections, &gaps_found);
    let toc = compare_toc(&parsed.detection, &recovery.sections);

    Ok(ParsedDocument {
        sections: recovery.sections,
        body_start: parsed.body_start,
        pattern: parsed.pattern,
        coverage_pct: parsed.coverage_pct,
        toc,
        gaps_found,
        recovered: recovery.recovered,
        remaining_gaps: recovery.remaining_gaps,
        normalized,
    })
}
