//! Validity status, derived from the citation graph and never stored.
//!
//! Resolution for a document as of a date considers only edges whose
//! `effective_date` is on or before that date, and applies the first rule
//! that matches:
//!
//! 1. A live `overrules` edge targets the document → `overruled`, or
//!    `overruled_in_part` when every live overruling edge is partial. An
//!    overruling edge stops being live once a later `affirms` or
//!    `distinguishes` edge of equal or higher authority targets the document.
//! 2. An unresolved `questions` edge (no later `affirms`/`distinguishes`) →
//!    `questioned`.
//! 3. A `superseded_by` edge to any successor that is still live →
//!    `superseded`. Successors are tried latest first; one that is dead does
//!    not hide an older one that is live.
//! 4. Otherwise → `good_law`.
//!
//! A document with no edges at all is `unknown`, never good law by default.
//!
//! Known limitation: conflicting edges that share an effective date are
//! ordered by append sequence, so the later-recorded edge wins. Legal
//! precedence rules between courts of equal authority are not modelled.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  citation::{CitationEdge, EdgeScope, RelationKind},
  document::DocumentId,
};

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
pub enum ValidityStatus {
  GoodLaw,
  Questioned,
  OverruledInPart,
  Overruled,
  Superseded,
  Unknown,
}

impl ValidityStatus {
  /// Ranking weight. `unknown` sits neutral-low rather than at zero so that
  /// undetermined law is not silently hidden.
  pub fn weight(self) -> f64 {
    match self {
      Self::GoodLaw => 1.0,
      Self::Questioned => 0.6,
      Self::Unknown => 0.4,
      Self::Superseded => 0.3,
      Self::OverruledInPart => 0.2,
      Self::Overruled => 0.0,
    }
  }

  /// Whether a predecessor pointing here via `superseded_by` counts as
  /// superseded by live law.
  fn is_live(self) -> bool { matches!(self, Self::GoodLaw | Self::Superseded) }
}

// ─── Single-document classification ──────────────────────────────────────────

/// The outcome of applying the rules to one document's own edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
  Settled(ValidityStatus),
  /// Rule 3 applies if any of these successors turns out to be live. Latest
  /// first, without repeats.
  SupersededBy(Vec<DocumentId>),
}

/// Classify `document_id` from the edges touching it. Edges that do not touch
/// the document are ignored, so callers may pass a superset.
pub fn classify(
  document_id: &DocumentId,
  edges: &[CitationEdge],
  as_of: NaiveDate,
) -> Finding {
  let touching: Vec<&CitationEdge> =
    edges.iter().filter(|e| e.touches(document_id)).collect();
  if touching.is_empty() {
    return Finding::Settled(ValidityStatus::Unknown);
  }

  let effective: Vec<&CitationEdge> = touching
    .into_iter()
    .filter(|e| e.effective_date <= as_of)
    .collect();
  let inbound: Vec<&CitationEdge> = effective
    .iter()
    .copied()
    .filter(|e| &e.target == document_id)
    .collect();
  let rehabilitating: Vec<&CitationEdge> = inbound
    .iter()
    .copied()
    .filter(|e| e.relation.is_rehabilitating())
    .collect();

  let live_overrulings: Vec<&CitationEdge> = inbound
    .iter()
    .copied()
    .filter(|o| o.relation == RelationKind::Overrules)
    .filter(|o| {
      !rehabilitating
        .iter()
        .any(|a| a.is_later_than(o) && a.authority >= o.authority)
    })
    .collect();
  if !live_overrulings.is_empty() {
    let any_full = live_overrulings.iter().any(|o| o.scope == EdgeScope::Full);
    return Finding::Settled(if any_full {
      ValidityStatus::Overruled
    } else {
      ValidityStatus::OverruledInPart
    });
  }

  let questioned = inbound
    .iter()
    .filter(|q| q.relation == RelationKind::Questions)
    .any(|q| !rehabilitating.iter().any(|a| a.is_later_than(q)));
  if questioned {
    return Finding::Settled(ValidityStatus::Questioned);
  }

  let mut supersessions: Vec<&CitationEdge> = effective
    .iter()
    .copied()
    .filter(|e| {
      &e.source == document_id
        && e.relation == RelationKind::SupersededBy
        && &e.target != document_id
    })
    .collect();
  supersessions.sort_by(|a, b| b.chronological_cmp(a));
  let mut successors: Vec<DocumentId> = Vec::new();
  for edge in supersessions {
    if !successors.contains(&edge.target) {
      successors.push(edge.target.clone());
    }
  }
  if successors.is_empty() {
    Finding::Settled(ValidityStatus::GoodLaw)
  } else {
    Finding::SupersededBy(successors)
  }
}

// ─── Graph walk ──────────────────────────────────────────────────────────────

/// Final status plus every document the walk visited. The visited set is the
/// document's reachable set for cache invalidation purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
  pub status:  ValidityStatus,
  pub visited: Vec<DocumentId>,
}

/// A predecessor waiting on one of its successors.
#[derive(Debug, Clone)]
struct Frame {
  document:   DocumentId,
  /// Successors not yet tried, latest last so `pop` yields it first.
  successors: Vec<DocumentId>,
}

/// A visited-set bounded, depth-first walk along `superseded_by` successors.
///
/// The walk is driven by the caller, which fetches the edges of
/// [`ValidityWalk::current`] and feeds them to [`ValidityWalk::step`] until a
/// [`Resolution`] comes back. This keeps the rules synchronous while the
/// edge source may be async.
///
/// A successor already on the walk's stack closes a cycle and counts as not
/// live. A successor settled earlier in the walk is not fetched again.
#[derive(Debug, Clone)]
pub struct ValidityWalk {
  as_of:   NaiveDate,
  current: DocumentId,
  /// Predecessors waiting on a successor's status, oldest first.
  pending: Vec<Frame>,
  settled: HashMap<DocumentId, ValidityStatus>,
  visited: Vec<DocumentId>,
}

impl ValidityWalk {
  pub fn new(document_id: DocumentId, as_of: NaiveDate) -> Self {
    Self {
      as_of,
      visited: vec![document_id.clone()],
      current: document_id,
      pending: Vec::new(),
      settled: HashMap::new(),
    }
  }

  pub fn current(&self) -> &DocumentId { &self.current }

  pub fn visited(&self) -> &[DocumentId] { &self.visited }

  /// Classify the current document. Returns `None` when the walk moved on to
  /// a successor whose edges are needed next.
  pub fn step(&mut self, edges: &[CitationEdge]) -> Option<Resolution> {
    match classify(&self.current, edges, self.as_of) {
      Finding::Settled(status) => self.settle(status),
      Finding::SupersededBy(mut successors) => {
        successors.reverse();
        let frame = Frame {
          document: self.current.clone(),
          successors,
        };
        self.advance(frame)
      }
    }
  }

  /// Move on to the frame's next untried successor, or settle the frame's
  /// document once none is left.
  fn advance(&mut self, mut frame: Frame) -> Option<Resolution> {
    while let Some(next) = frame.successors.pop() {
      match self.settled.get(&next) {
        Some(status) if status.is_live() => {
          self.current = frame.document;
          return self.settle(ValidityStatus::Superseded);
        }
        Some(_) => continue,
        // Still on the stack: a cycle.
        None if self.visited.contains(&next) => continue,
        None => {
          self.visited.push(next.clone());
          self.pending.push(frame);
          self.current = next;
          return None;
        }
      }
    }
    self.current = frame.document;
    self.settle(ValidityStatus::GoodLaw)
  }

  /// Record the current document's status and report it to the predecessor
  /// waiting on it.
  fn settle(&mut self, status: ValidityStatus) -> Option<Resolution> {
    self.settled.insert(self.current.clone(), status);
    match self.pending.pop() {
      None => Some(Resolution {
        status,
        visited: std::mem::take(&mut self.visited),
      }),
      Some(frame) if status.is_live() => {
        self.current = frame.document;
        self.settle(ValidityStatus::Superseded)
      }
      Some(frame) => self.advance(frame),
    }
  }
}

/// Resolve against an in-memory edge list. Used by tests and by callers that
/// already hold the whole relevant subgraph.
pub fn resolve_in_memory(
  document_id: &DocumentId,
  edges: &[CitationEdge],
  as_of: NaiveDate,
) -> Resolution {
  let mut walk = ValidityWalk::new(document_id.clone(), as_of);
  loop {
    if let Some(resolution) = walk.step(edges) {
      return resolution;
    }
  }
}
