//! Heuristic table-reference resolution for embedded query text.
//!
//! This is deliberately not a SQL parser. The surrounding system assumes
//! best-effort resolution over free-form query text with no grammar
//! guarantee, so the resolver stays a small set of keyword regexes. Known
//! limitations, kept on purpose: comments and string literals containing
//! keywords are matched anyway, CTE names are not recognized, and multi-
//! statement batches get no special handling beyond the global scan.

use regex::Regex;
use std::collections::BTreeSet;

/// Source and target tables referenced by a piece of query text.
///
/// Identifiers are upper-cased for stable deduplication. An identifier
/// appearing on both sides (self-referential statements) is kept in both
/// sets; the resolver does not attempt to disambiguate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRefs {
    pub sources: BTreeSet<String>,
    pub targets: BTreeSet<String>,
}

impl TableRefs {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.targets.is_empty()
    }
}

/// Extracts table references from query text with keyword heuristics
pub struct SqlReferenceResolver {
    source_patterns: Vec<Regex>,
    target_patterns: Vec<Regex>,
}

// identifier, optionally qualified by one dot (schema.table)
const IDENTIFIER: &str = r"(\w+(?:\.\w+)?)";

impl SqlReferenceResolver {
    pub fn new() -> Self {
        let compile = |keyword: &str| {
            let pattern = format!(r"{}\s+{}", keyword, IDENTIFIER);
            Regex::new(&pattern).expect("reference pattern compiles")
        };
        Self {
            source_patterns: vec![compile("FROM"), compile("JOIN")],
            target_patterns: vec![
                compile(r"INSERT\s+INTO"),
                compile("UPDATE"),
                compile(r"DELETE\s+FROM"),
            ],
        }
    }

    /// Resolves query text into source and target table sets.
    ///
    /// Never fails: text with no recognizable references yields empty sets,
    /// which is a valid outcome (absence of lineage), not an error.
    pub fn resolve(&self, text: &str) -> TableRefs {
        let upper = text.to_uppercase();
        let mut refs = TableRefs::default();
        for pattern in &self.source_patterns {
            for captures in pattern.captures_iter(&upper) {
                refs.sources.insert(captures[1].to_string());
            }
        }
        for pattern in &self.target_patterns {
            for captures in pattern.captures_iter(&upper) {
                refs.targets.insert(captures[1].to_string());
            }
        }
        refs
    }
}

impl Default for SqlReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}
