//! Core domain types for robots.txt ledger annotation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The robots.txt permission outcome attached to one ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// An artifact was found and evaluated; `true` when the fetch was permitted.
    Allowed(bool),
    /// No artifact exists for the row's id.
    NoPolicy,
    /// An artifact exists but is not valid UTF-8.
    DecodeError,
}

impl Decision {
    /// Render this decision as the field inserted into the ledger row.
    pub fn label<'a>(&self, labels: &'a DecisionLabels) -> &'a str {
        match self {
            Decision::Allowed(true) => &labels.allowed,
            Decision::Allowed(false) => &labels.disallowed,
            Decision::NoPolicy => &labels.no_policy,
            Decision::DecodeError => &labels.decode_error,
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionLabels
// ---------------------------------------------------------------------------

/// Literal strings written for each [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLabels {
    /// Written when the matcher permits the URL.
    #[serde(default = "default_allowed")]
    pub allowed: String,

    /// Written when the matcher forbids the URL.
    #[serde(default = "default_disallowed")]
    pub disallowed: String,

    /// Sentinel for rows without a robots.txt artifact.
    #[serde(default = "default_no_policy")]
    pub no_policy: String,

    /// Sentinel for rows whose artifact is not valid UTF-8.
    #[serde(default = "default_decode_error")]
    pub decode_error: String,
}

impl Default for DecisionLabels {
    fn default() -> Self {
        Self {
            allowed: default_allowed(),
            disallowed: default_disallowed(),
            no_policy: default_no_policy(),
            decode_error: default_decode_error(),
        }
    }
}

fn default_allowed() -> String {
    "True".into()
}
fn default_disallowed() -> String {
    "False".into()
}
fn default_no_policy() -> String {
    "None".into()
}
fn default_decode_error() -> String {
    "Error".into()
}

// ---------------------------------------------------------------------------
// LedgerLayout
// ---------------------------------------------------------------------------

/// Fixed field positions of the success ledger.
///
/// Positions are configuration; they are never discovered from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLayout {
    /// Row identifier, also the artifact file stem.
    #[serde(default = "default_id_index")]
    pub id_index: usize,

    /// The fetched (end) URL matched against the policy.
    #[serde(default = "default_url_index")]
    pub url_index: usize,

    /// Fetch status column. Informational only.
    #[serde(default = "default_status_index")]
    pub status_index: usize,

    /// Where the decision field is inserted.
    #[serde(default = "default_insertion_index")]
    pub insertion_index: usize,
}

impl Default for LedgerLayout {
    fn default() -> Self {
        Self {
            id_index: default_id_index(),
            url_index: default_url_index(),
            status_index: default_status_index(),
            insertion_index: default_insertion_index(),
        }
    }
}

fn default_id_index() -> usize {
    0
}
fn default_url_index() -> usize {
    3
}
fn default_status_index() -> usize {
    4
}
fn default_insertion_index() -> usize {
    default_status_index() + 1
}

// ---------------------------------------------------------------------------
// OutputMode
// ---------------------------------------------------------------------------

/// How the output ledger is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Append to existing content, creating the file if missing.
    #[default]
    Append,
    /// Discard existing content first.
    Truncate,
}
