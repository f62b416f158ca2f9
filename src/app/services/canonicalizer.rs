//! District-name canonicalization
//!
//! Every source spells districts its own way: the boundary file in upper case
//! with current administrative names, the climate tables in mixed case with
//! historical names ("NASIK" vs "NASHIK"). All joins and group-bys use the
//! canonical key produced here and never a raw spelling.
//!
//! Canonicalization applies, in order:
//! 1. trim and collapse internal whitespace runs
//! 2. lower-case
//! 3. the per-state rename table (historical spelling -> boundary spelling)
//!
//! Rename targets may not themselves be rename sources, which keeps the
//! mapping idempotent: `canonicalize(canonicalize(x)) == canonicalize(x)`.

use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Two or more distinct spellings from one source that land on the same key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub canonical: String,
    pub spellings: Vec<String>,
}

/// Maps raw district spellings onto one shared key
#[derive(Debug, Clone, Default)]
pub struct DistrictCanonicalizer {
    /// Normalized source spelling -> normalized target spelling
    renames: HashMap<String, String>,
}

impl DistrictCanonicalizer {
    /// Build a canonicalizer from a rename table
    ///
    /// Keys and values are normalized the same way as district names, so the
    /// table may be written in any case. Fails when a target is also a source
    /// (chained renames) or when an entry is empty.
    pub fn new(rename_table: &BTreeMap<String, String>) -> Result<Self> {
        let mut renames = HashMap::with_capacity(rename_table.len());

        for (from, to) in rename_table {
            let from_key = normalize(from);
            let to_key = normalize(to);

            if from_key.is_empty() || to_key.is_empty() {
                return Err(Error::canonicalization(format!(
                    "Empty district in rename entry '{}' -> '{}'",
                    from, to
                )));
            }
            if from_key == to_key {
                continue;
            }
            if let Some(existing) = renames.insert(from_key.clone(), to_key.clone()) {
                if existing != to_key {
                    return Err(Error::canonicalization(format!(
                        "District '{}' is renamed to both '{}' and '{}'",
                        from, existing, to_key
                    )));
                }
            }
        }

        for (from, to) in &renames {
            if renames.contains_key(to) {
                return Err(Error::canonicalization(format!(
                    "Rename target '{}' (from '{}') is itself renamed; chained renames are not idempotent",
                    to, from
                )));
            }
        }

        debug!("District canonicalizer built with {} renames", renames.len());
        Ok(Self { renames })
    }

    /// Canonical key for a raw district spelling
    pub fn canonicalize(&self, raw: &str) -> String {
        let normalized = normalize(raw);
        match self.renames.get(&normalized) {
            Some(target) => target.clone(),
            None => normalized,
        }
    }

    /// Whether the raw spelling is rewritten by the rename table
    pub fn is_renamed(&self, raw: &str) -> bool {
        self.renames.contains_key(&normalize(raw))
    }

    /// Number of rename entries
    pub fn rename_count(&self) -> usize {
        self.renames.len()
    }

    /// Find canonical keys reached by more than one distinct spelling of the
    /// same source that the rename table does not account for
    ///
    /// Spellings differing only in case or whitespace are the same district,
    /// and a renamed spelling landing on its target is an intended merge.
    pub fn detect_collisions<'a>(
        &self,
        raw_names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<Collision> {
        let mut by_key: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for raw in raw_names {
            let normalized = normalize(raw);
            if normalized.is_empty() || self.is_renamed(raw) {
                continue;
            }
            by_key
                .entry(self.canonicalize(raw))
                .or_default()
                .insert(normalized);
        }

        by_key
            .into_iter()
            .filter(|(_, spellings)| spellings.len() > 1)
            .map(|(canonical, spellings)| Collision {
                canonical,
                spellings: spellings.into_iter().collect(),
            })
            .collect()
    }
}

/// Trim, collapse whitespace runs to a single space, lower-case
fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maharashtra_renames() -> BTreeMap<String, String> {
        [
            ("BEED", "BID"),
            ("BULDHANA", "BULDANA"),
            ("NASIK", "NASHIK"),
            ("AHMEDNAGAR", "AHMADNAGAR"),
            ("RAIGAD", "RAIGARH"),
            ("GARHCHIROLI", "GADCHIROLI"),
        ]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
    }

    #[test]
    fn test_trim_and_case_normalization() {
        let canon = DistrictCanonicalizer::default();
        assert_eq!(canon.canonicalize("  PUNE "), "pune");
        assert_eq!(canon.canonicalize("Greater\t Mumbai"), "greater mumbai");
        assert_eq!(canon.canonicalize(""), "");
    }

    #[test]
    fn test_rename_table_applies_after_normalization() {
        let canon = DistrictCanonicalizer::new(&maharashtra_renames()).unwrap();
        assert_eq!(canon.canonicalize("NASIK"), "nashik");
        assert_eq!(canon.canonicalize(" nasik"), "nashik");
        assert_eq!(canon.canonicalize("NASHIK"), "nashik");
        assert_eq!(canon.canonicalize("Beed"), "bid");
        assert!(canon.is_renamed("garhchiroli"));
        assert!(!canon.is_renamed("pune"));
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        let canon = DistrictCanonicalizer::new(&maharashtra_renames()).unwrap();
        let samples = [
            "NASIK", "Nashik", " BEED ", "bid", "Pune", "Greater  Mumbai", "RAIGAD", "x", "",
        ];
        for raw in samples {
            let once = canon.canonicalize(raw);
            assert_eq!(canon.canonicalize(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_chained_renames_are_rejected() {
        let mut table = maharashtra_renames();
        table.insert("NASHIK".to_string(), "NASIK".to_string());
        assert!(matches!(
            DistrictCanonicalizer::new(&table),
            Err(Error::Canonicalization { .. })
        ));
    }

    #[test]
    fn test_conflicting_renames_are_rejected() {
        let mut table = BTreeMap::new();
        table.insert("Nasik".to_string(), "NASHIK".to_string());
        table.insert("NASIK".to_string(), "NASIKA".to_string());
        assert!(DistrictCanonicalizer::new(&table).is_err());
    }

    #[test]
    fn test_identity_rename_is_ignored() {
        let mut table = BTreeMap::new();
        table.insert("Pune".to_string(), "PUNE".to_string());
        let canon = DistrictCanonicalizer::new(&table).unwrap();
        assert_eq!(canon.rename_count(), 0);
    }

    #[test]
    fn test_distinct_real_districts_do_not_collide() {
        let canon = DistrictCanonicalizer::new(&maharashtra_renames()).unwrap();
        let boundary_names = ["NASHIK", "BID", "PUNE", "THANE", "BULDANA", "Pune "];
        assert!(canon.detect_collisions(boundary_names).is_empty());
    }

    #[test]
    fn test_renamed_spelling_next_to_its_target_is_not_a_collision() {
        let canon = DistrictCanonicalizer::new(&maharashtra_renames()).unwrap();
        assert!(canon.detect_collisions(["NASIK", "NASHIK", "PUNE"]).is_empty());
        assert!(canon.detect_collisions(["Beed", "BID", " beed "]).is_empty());
    }
}
