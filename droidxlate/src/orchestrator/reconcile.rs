//! Matching returned ids back to the ids that were requested.
//!
//! Backends drift from the ids they are given: `app_name:`, `"App_Name"`,
//! a stray trailing period. Each returned id is matched exactly first, then by
//! its normalized form. Anything that cannot be attributed to exactly one
//! outstanding request is discarded.

use std::collections::HashMap;

use serde::Serialize;

use super::backend::BatchResponse;

const EDGE_PUNCTUATION: &[char] = &[':', '.', ',', ';', '!', '?'];
const QUOTES: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Normalized form of an id used for tolerant matching.
pub fn normalize_id(id: &str) -> String {
    let trimmed = id.trim_matches(|c: char| {
        c.is_whitespace() || EDGE_PUNCTUATION.contains(&c) || QUOTES.contains(&c)
    });
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Matches no requested id.
    Unknown,
    /// The normalized form matches more than one requested id.
    Ambiguous,
    /// The request was already answered earlier in the response.
    Duplicate,
}

/// A returned item that was not attributed to any request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardedResponse {
    pub id: String,
    pub reason: DiscardReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// `(index into the requested ids, returned text)`, in response order.
    pub matched: Vec<(usize, String)>,
    pub discarded: Vec<DiscardedResponse>,
}

impl Reconciled {
    pub fn text_for(&self, index: usize) -> Option<&str> {
        self.matched
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, t)| t.as_str())
    }
}

/// Attribute each item of `response` to one of `requested`.
pub fn reconcile(requested: &[String], response: &BatchResponse) -> Reconciled {
    let exact: HashMap<&str, usize> = requested
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut normalized: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, id) in requested.iter().enumerate() {
        normalized.entry(normalize_id(id)).or_default().push(i);
    }

    let mut answered = vec![false; requested.len()];
    let mut out = Reconciled::default();

    for item in &response.items {
        let index = match exact.get(item.id.as_str()) {
            Some(i) => Ok(*i),
            None => match normalized.get(&normalize_id(&item.id)).map(Vec::as_slice) {
                Some([only]) => Ok(*only),
                Some([_, _, ..]) => Err(DiscardReason::Ambiguous),
                _ => Err(DiscardReason::Unknown),
            },
        };
        let index = index.and_then(|i| {
            if answered[i] {
                Err(DiscardReason::Duplicate)
            } else {
                Ok(i)
            }
        });
        match index {
            Ok(i) => {
                answered[i] = true;
                out.matched.push((i, item.text.clone()));
            }
            Err(reason) => out.discarded.push(DiscardedResponse {
                id: item.id.clone(),
                reason,
            }),
        }
    }
    out
}
