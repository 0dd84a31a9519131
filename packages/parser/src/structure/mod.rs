//! Structure parsing: table of contents, headings and section spans.

mod engine;
mod headings;
mod toc;

pub use engine::{ParsedStructure, StructureParser};
pub use headings::{
    article_number, find_article_headings, find_section_headings, has_heading_continuation,
    is_heading_position, roman_to_arabic, ArticleHeading, HeadingMatch, HeadingStyle,
};
pub use toc::{compare_toc, detect_toc, TocDetection};
