//! Legal documents: immutable content snapshots.
//!
//! A [`LegalDocument`] is the payload carried by every temporal record. Its
//! `content_hash` is a SHA-256 digest over the canonical JSON form of the
//! content, so any stored snapshot can be re-verified independently.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Stable identity of a legal document across all of its versions.
///
/// Ordered lexically; the ranker relies on that ordering as its final
/// tie-break.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for DocumentId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for DocumentId {
  fn from(s: String) -> Self { Self(s) }
}

/// The kind of legal instrument a document is.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentType {
  Case,
  Statute,
  Regulation,
  Treaty,
  Constitution,
  Other,
}

// ─── Content ─────────────────────────────────────────────────────────────────

/// One paragraph of normalised text together with its structural markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
  /// Section or paragraph marker as printed in the source, e.g. `"§ 2-207"`
  /// or `"¶ 14"`.
  #[serde(default)]
  pub marker: Option<String>,
  /// Page of the official reporter on which the paragraph starts.
  #[serde(default)]
  pub page:   Option<u32>,
  pub text:   String,
}

impl Paragraph {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      marker: None,
      page:   None,
      text:   normalize_text(&text.into()),
    }
  }

  pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
    self.marker = Some(marker.into());
    self
  }

  pub fn with_page(mut self, page: u32) -> Self {
    self.page = Some(page);
    self
  }
}

/// Normalised document text, split into addressable paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
  pub paragraphs: Vec<Paragraph>,
}

static MARKUP: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
static WHITESPACE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static PARAGRAPH_BREAK: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static regex"));

/// Strip markup tags and collapse runs of whitespace to a single space.
pub fn normalize_text(raw: &str) -> String {
  let stripped = MARKUP.replace_all(raw, "");
  WHITESPACE.replace_all(&stripped, " ").trim().to_owned()
}

impl DocumentContent {
  pub fn new(paragraphs: Vec<Paragraph>) -> Self { Self { paragraphs } }

  /// Split raw text on blank lines; each non-empty block becomes a paragraph.
  pub fn from_text(raw: &str) -> Self {
    let paragraphs = PARAGRAPH_BREAK
      .split(raw)
      .map(normalize_text)
      .filter(|p| !p.is_empty())
      .map(|text| Paragraph {
        marker: None,
        page: None,
        text,
      })
      .collect();
    Self { paragraphs }
  }

  pub fn paragraph(&self, index: usize) -> Option<&Paragraph> {
    self.paragraphs.get(index)
  }

  /// All paragraph text joined by blank lines.
  pub fn plain_text(&self) -> String {
    self
      .paragraphs
      .iter()
      .map(|p| p.text.as_str())
      .collect::<Vec<_>>()
      .join("\n\n")
  }

  /// SHA-256 hex digest of the canonical JSON serialisation.
  pub fn digest(&self) -> Result<String> {
    let bytes = serde_json::to_vec(self)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
  }
}

// ─── LegalDocument ───────────────────────────────────────────────────────────

/// An immutable content snapshot of a legal document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalDocument {
  pub document_id:        DocumentId,
  pub jurisdiction:       String,
  pub document_type:      DocumentType,
  pub canonical_citation: String,
  #[serde(default)]
  pub title:              String,
  pub content:            DocumentContent,
  pub content_hash:       String,
}

impl LegalDocument {
  /// Build a document and compute its content hash.
  pub fn new(
    document_id: impl Into<DocumentId>,
    jurisdiction: impl Into<String>,
    document_type: DocumentType,
    canonical_citation: impl Into<String>,
    title: impl Into<String>,
    content: DocumentContent,
  ) -> Result<Self> {
    let content_hash = content.digest()?;
    Ok(Self {
      document_id: document_id.into(),
      jurisdiction: jurisdiction.into(),
      document_type,
      canonical_citation: canonical_citation.into(),
      title: title.into(),
      content,
      content_hash,
    })
  }

  /// Check that the declared `content_hash` matches the content.
  pub fn verify_content_hash(&self) -> Result<()> {
    let computed = self.content.digest()?;
    if computed != self.content_hash {
      return Err(Error::ContentHashMismatch {
        document_id: self.document_id.clone(),
        declared: self.content_hash.clone(),
        computed,
      });
    }
    Ok(())
  }

  /// Reject documents that cannot be stored: blank identity fields, no
  /// addressable paragraphs, or a hash that does not match the content.
  pub fn validate(&self) -> Result<()> {
    if self.document_id.as_str().trim().is_empty() {
      return Err(Error::InvalidDocument("document_id is blank".into()));
    }
    if self.jurisdiction.trim().is_empty() {
      return Err(Error::InvalidDocument(format!(
        "{}: jurisdiction is blank",
        self.document_id
      )));
    }
    if self.content.paragraphs.is_empty() {
      return Err(Error::InvalidDocument(format!(
        "{}: content has no paragraphs",
        self.document_id
      )));
    }
    self.verify_content_hash()
  }
}
