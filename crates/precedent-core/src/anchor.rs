//! Provenance anchors.
//!
//! An anchor binds a piece of evidence to the exact excerpt it came from: a
//! record, a paragraph inside that record's content, an optional character
//! range inside the paragraph, and the SHA-256 of the excerpt text at the
//! moment of anchoring. Records are immutable, so an anchor re-verifies
//! forever unless the stored text itself is corrupted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::document::{DocumentContent, DocumentId};

/// A half-open character range `[start, end)` within one paragraph.
/// Offsets count Unicode scalar values, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharRange {
  pub start: usize,
  pub end:   usize,
}

/// Addresses an excerpt inside a specific record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
  pub record_id: Uuid,
  /// Zero-based paragraph index.
  pub paragraph: usize,
  /// `None` selects the whole paragraph.
  #[serde(default)]
  pub range:     Option<CharRange>,
}

impl Locator {
  pub fn paragraph(record_id: Uuid, paragraph: usize) -> Self {
    Self {
      record_id,
      paragraph,
      range: None,
    }
  }

  pub fn with_range(mut self, start: usize, end: usize) -> Self {
    self.range = Some(CharRange { start, end });
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceAnchor {
  pub document_id:      DocumentId,
  pub locator:          Locator,
  pub excerpt_hash:     String,
  /// The transaction time the anchor was resolved against.
  pub transaction_time: DateTime<Utc>,
}

/// Resolve a locator against content. `None` if the paragraph does not exist
/// or the range is empty or runs past the paragraph end.
pub fn excerpt<'a>(
  content: &'a DocumentContent,
  locator: &Locator,
) -> Option<&'a str> {
  let text = content.paragraph(locator.paragraph)?.text.as_str();
  let Some(CharRange { start, end }) = locator.range else {
    return Some(text);
  };
  if start >= end {
    return None;
  }

  let byte_at = |chars: usize| {
    text
      .char_indices()
      .map(|(i, _)| i)
      .chain(std::iter::once(text.len()))
      .nth(chars)
  };
  let (start, end) = (byte_at(start)?, byte_at(end)?);
  Some(&text[start..end])
}

/// Hex SHA-256 of excerpt text.
pub fn excerpt_hash(excerpt: &str) -> String {
  hex::encode(Sha256::digest(excerpt.as_bytes()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::Paragraph;

  fn content() -> DocumentContent {
    DocumentContent::new(vec![
      Paragraph::new("Consequential damages are recoverable."),
      Paragraph::new("Le préjudice moral est réparable."),
    ])
  }

  #[test]
  fn whole_paragraph() {
    let loc = Locator::paragraph(Uuid::nil(), 0);
    assert_eq!(
      excerpt(&content(), &loc),
      Some("Consequential damages are recoverable.")
    );
  }

  #[test]
  fn ranges_count_characters() {
    let loc = Locator::paragraph(Uuid::nil(), 1).with_range(3, 12);
    assert_eq!(excerpt(&content(), &loc), Some("préjudice"));

    let to_end = Locator::paragraph(Uuid::nil(), 1).with_range(27, 33);
    assert_eq!(excerpt(&content(), &to_end), Some("rable."));
  }

  #[test]
  fn out_of_range_locators() {
    let c = content();
    assert_eq!(excerpt(&c, &Locator::paragraph(Uuid::nil(), 2)), None);
    assert_eq!(
      excerpt(&c, &Locator::paragraph(Uuid::nil(), 0).with_range(5, 5)),
      None
    );
    assert_eq!(
      excerpt(&c, &Locator::paragraph(Uuid::nil(), 1).with_range(30, 34)),
      None
    );
  }

  #[test]
  fn hash_is_sha256_hex() {
    assert_eq!(
      excerpt_hash(""),
      "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(excerpt_hash("abc").len(), 64);
  }
}
