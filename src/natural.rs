//! Natural ordering for agent, provider, and class names.
//!
//! Digit runs compare by numeric value and everything else compares
//! case-insensitively, so `agent2 < agent10` and `Agent1 < agent2`. Names that
//! only differ in case or leading zeros fall back to plain byte order, which
//! keeps the ordering total and consistent with equality.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = compare_chunk(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Sorts in place with `natural_cmp`.
pub fn natural_sort(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}

fn compare_chunk(left: Chunk<'_>, right: Chunk<'_>) -> Ordering {
    match (left, right) {
        (Chunk::Digits(l), Chunk::Digits(r)) => {
            let l = l.trim_start_matches('0');
            let r = r.trim_start_matches('0');
            l.len().cmp(&r.len()).then_with(|| l.cmp(r))
        }
        (l, r) => fold_case(l.as_str()).cmp(fold_case(r.as_str())),
    }
}

fn fold_case(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().flat_map(char::to_lowercase)
}

#[derive(Clone, Copy)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

impl<'a> Chunk<'a> {
    fn as_str(self) -> &'a str {
        match self {
            Chunk::Digits(s) | Chunk::Text(s) => s,
        }
    }
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(idx, _)| idx)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}

/// A name that orders naturally when used as a map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(pub String);

impl NaturalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NaturalKey {
    fn from(value: &str) -> Self {
        NaturalKey(value.to_string())
    }
}

impl From<String> for NaturalKey {
    fn from(value: String) -> Self {
        NaturalKey(value)
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
