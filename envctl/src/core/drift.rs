//! Divergence between the declaration file and the installed package set.
//!
//! Divergence is expected between a dependency change and the next `freeze`;
//! this module only describes it.

use std::collections::BTreeMap;

use serde::Serialize;

use super::requirements::{Declaration, Requirement};

/// Declared pin that does not match the installed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionMismatch {
    pub name: String,
    pub declared: String,
    pub installed: String,
}

/// Drift summary. Lists are ordered by normalized name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Declared but not installed.
    pub missing: Vec<String>,
    /// Declared with `==` but installed at another version.
    pub mismatched: Vec<VersionMismatch>,
    /// Installed but not declared (usually transitive dependencies).
    pub undeclared: Vec<String>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty() && self.undeclared.is_empty()
    }
}

/// Compare declared entries against installed pins.
///
/// Entries guarded by an environment marker are never reported missing: whether
/// they apply to this interpreter is the installer's decision. Non-exact
/// constraints are satisfied by presence alone.
pub fn compute_drift(declared: &Declaration, installed: &[Requirement]) -> DriftReport {
    let installed_by_key: BTreeMap<String, &Requirement> =
        installed.iter().map(|req| (req.key(), req)).collect();
    let declared_by_key: BTreeMap<String, &Requirement> = declared
        .entries
        .iter()
        .map(|req| (req.key(), req))
        .collect();

    let mut report = DriftReport::default();
    for (key, want) in &declared_by_key {
        match installed_by_key.get(key) {
            None => {
                if want.marker.is_none() {
                    report.missing.push(want.name.clone());
                }
            }
            Some(have) => {
                if let (Some(wanted), Some(actual)) = (want.pinned_version(), have.pinned_version())
                    && wanted != actual
                {
                    report.mismatched.push(VersionMismatch {
                        name: want.name.clone(),
                        declared: wanted.to_string(),
                        installed: actual.to_string(),
                    });
                }
            }
        }
    }

    for (key, have) in &installed_by_key {
        if !declared_by_key.contains_key(key) {
            report.undeclared.push(have.name.clone());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(listing: &str) -> Vec<Requirement> {
        Declaration::parse(listing).entries
    }

    #[test]
    fn identical_sets_have_no_drift() {
        let declared = Declaration::parse("requests==2.31.0\n");
        let report = compute_drift(&declared, &installed("requests==2.31.0\n"));
        assert!(report.is_clean());
    }

    #[test]
    fn reports_missing_mismatched_and_undeclared() {
        let declared = Declaration::parse("requests==2.31.0\nflask>=2\nrich\n");
        let report = compute_drift(
            &declared,
            &installed("Flask==3.0.0\nrequests==2.28.1\nidna==3.4\n"),
        );
        assert_eq!(report.missing, vec!["rich".to_string()]);
        assert_eq!(
            report.mismatched,
            vec![VersionMismatch {
                name: "requests".to_string(),
                declared: "2.31.0".to_string(),
                installed: "2.28.1".to_string(),
            }]
        );
        assert_eq!(report.undeclared, vec!["idna".to_string()]);
    }

    #[test]
    fn names_match_after_normalization() {
        let declared = Declaration::parse("typing_extensions==4.8.0\n");
        let report = compute_drift(&declared, &installed("typing-extensions==4.8.0\n"));
        assert!(report.is_clean());
    }

    #[test]
    fn marker_guarded_entries_are_not_missing() {
        let declared = Declaration::parse("pywin32==306; sys_platform == 'win32'\n");
        let report = compute_drift(&declared, &[]);
        assert!(report.missing.is_empty());
    }
}
