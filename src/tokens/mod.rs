//! Valuable token extraction.
//!
//! Turns the text of an article (title, body, tags) into a compact set of
//! normalized terms that the clustering engine compares.

mod extractor;
mod language;
mod stopwords;

pub use self::extractor::{decode_entities, extract_valuable_tokens, strip_html, TokenSource, ValuableTokens};
pub use self::language::Language;
