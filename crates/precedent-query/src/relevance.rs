//! The semantic-relevance contract.
//!
//! Any model can be plugged in behind [`RelevanceScorer`]; async closures of
//! the shape `Fn(String, LegalDocument) -> impl Future<Output = Result<f32,
//! ScoreError>>` implement it directly. [`LexicalScorer`] is the built-in
//! term-overlap scorer used when no model is configured.

use std::{collections::BTreeSet, future::Future};

use precedent_core::document::LegalDocument;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("relevance scoring failed: {0}")]
pub struct ScoreError(pub String);

pub trait RelevanceScorer: Send + Sync {
  /// Relevance of `document` to `query`, expected in `[0, 1]`.
  fn score<'a>(
    &'a self,
    query: &'a str,
    document: &'a LegalDocument,
  ) -> impl Future<Output = Result<f32, ScoreError>> + Send + 'a;
}

impl<F, Fut> RelevanceScorer for F
where
  F: Fn(String, LegalDocument) -> Fut + Send + Sync,
  Fut: Future<Output = Result<f32, ScoreError>> + Send + 'static,
{
  fn score<'a>(
    &'a self,
    query: &'a str,
    document: &'a LegalDocument,
  ) -> impl Future<Output = Result<f32, ScoreError>> + Send + 'a {
    self(query.to_owned(), document.clone())
  }
}

// ─── Lexical scoring ─────────────────────────────────────────────────────────

const STOPWORDS: &[&str] = &[
  "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is",
  "it", "of", "on", "or", "that", "the", "to", "v", "vs", "was", "were", "with",
];

/// Lowercased alphanumeric terms of `text`, minus stopwords.
pub fn terms(text: &str) -> BTreeSet<String> {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| !t.is_empty())
    .map(str::to_lowercase)
    .filter(|t| !STOPWORDS.contains(&t.as_str()))
    .collect()
}

/// Fraction of `query` terms present in `haystack`.
pub fn overlap(query: &BTreeSet<String>, haystack: &BTreeSet<String>) -> f32 {
  if query.is_empty() {
    return 0.0;
  }
  let hits = query.intersection(haystack).count();
  hits as f32 / query.len() as f32
}

/// Term-overlap relevance over title, citation and text. A query equal to the
/// document's canonical citation scores `1.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalScorer;

impl LexicalScorer {
  pub fn score_now(query: &str, document: &LegalDocument) -> f32 {
    if query.trim().eq_ignore_ascii_case(document.canonical_citation.trim()) {
      return 1.0;
    }
    let haystack = terms(&format!(
      "{} {} {}",
      document.title,
      document.canonical_citation,
      document.content.plain_text()
    ));
    overlap(&terms(query), &haystack)
  }
}

impl RelevanceScorer for LexicalScorer {
  async fn score<'a>(
    &'a self,
    query: &'a str,
    document: &'a LegalDocument,
  ) -> Result<f32, ScoreError> {
    Ok(Self::score_now(query, document))
  }
}
