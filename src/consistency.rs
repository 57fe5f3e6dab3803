//! Whole-file consistency passes run before any database write: per-identity
//! subject coverage, and fuzzy near-duplicate name detection within the
//! upload itself.

use crate::identity::normalize_name;
use crate::workbook::SheetRows;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One distinct (name, lin) identity seen in the workbook, with the subject
/// sheets it appeared in.
#[derive(Debug, Clone)]
pub struct SeenIdentity {
    pub name: String,
    pub lin: Option<String>,
    pub subjects: BTreeSet<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingSubjects {
    pub name: String,
    pub lin: Option<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyPair {
    pub name_a: String,
    pub lin_a: Option<String>,
    pub name_b: String,
    pub lin_b: Option<String>,
    pub distance: usize,
}

/// Edit-distance thresholds for duplicate-entry detection. Heuristic policy,
/// tunable by the caller.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyPolicy {
    pub max_distance: usize,
    pub min_len_for_two: usize,
}

impl Default for FuzzyPolicy {
    fn default() -> Self {
        FuzzyPolicy {
            max_distance: 2,
            min_len_for_two: 4,
        }
    }
}

impl FuzzyPolicy {
    fn flags(&self, a: &str, b: &str, distance: usize) -> bool {
        if distance == 0 || distance > self.max_distance {
            return false;
        }
        if distance == 1 {
            return true;
        }
        a.chars().count() >= self.min_len_for_two && b.chars().count() >= self.min_len_for_two
    }
}

/// Collapses sheet rows into distinct (normalized name, lin) identities,
/// ordered deterministically.
pub fn collect_identities(sheets: &[SheetRows]) -> Vec<SeenIdentity> {
    let mut by_key: BTreeMap<(String, Option<String>), SeenIdentity> = BTreeMap::new();
    for sheet in sheets {
        for row in &sheet.rows {
            let name = normalize_name(&row.name);
            let key = (name.clone(), row.lin.clone());
            by_key
                .entry(key)
                .or_insert_with(|| SeenIdentity {
                    name,
                    lin: row.lin.clone(),
                    subjects: BTreeSet::new(),
                })
                .subjects
                .insert(sheet.subject_code);
        }
    }
    by_key.into_values().collect()
}

/// Identities missing one or more of the class's required subjects.
/// Optional subjects never count against coverage.
pub fn missing_subject_coverage(
    identities: &[SeenIdentity],
    required: &[&'static str],
) -> Vec<MissingSubjects> {
    let mut out = Vec::new();
    for identity in identities {
        let missing: Vec<String> = required
            .iter()
            .filter(|code| !identity.subjects.contains(*code))
            .map(|code| code.to_string())
            .collect();
        if !missing.is_empty() {
            out.push(MissingSubjects {
                name: identity.name.clone(),
                lin: identity.lin.clone(),
                missing,
            });
        }
    }
    out
}

/// Pairs of distinct identities whose names are a near match — usually a
/// typo that would mint a phantom student. Identical names are excluded;
/// those resolve through identity matching instead. Each unordered name
/// pair reports once.
pub fn fuzzy_duplicates(identities: &[SeenIdentity], policy: FuzzyPolicy) -> Vec<FuzzyPair> {
    let mut seen_pairs: BTreeSet<(String, String)> = BTreeSet::new();
    let mut out = Vec::new();
    for (i, a) in identities.iter().enumerate() {
        for b in identities.iter().skip(i + 1) {
            if a.name == b.name {
                continue;
            }
            let pair_key = if a.name < b.name {
                (a.name.clone(), b.name.clone())
            } else {
                (b.name.clone(), a.name.clone())
            };
            if seen_pairs.contains(&pair_key) {
                continue;
            }
            let distance = levenshtein(&a.name, &b.name);
            if policy.flags(&a.name, &b.name, distance) {
                seen_pairs.insert(pair_key);
                out.push(FuzzyPair {
                    name_a: a.name.clone(),
                    lin_a: a.lin.clone(),
                    name_b: b.name.clone(),
                    lin_b: b.lin.clone(),
                    distance,
                });
            }
        }
    }
    out
}

/// Classic two-row Levenshtein over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let subst_cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + subst_cost)
                .min(prev[j + 1] + 1)
                .min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
