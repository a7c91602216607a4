use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use tracing::info;

use crate::error::{Result, SyncError};

/// People that must never be members of the space, even if the directory
/// lists them as active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    /// Exact email addresses, matched against a person's first email only
    pub excluded_emails: BTreeSet<String>,
    /// Case-sensitive substrings matched against a person's department
    pub excluded_departments: BTreeSet<String>,
}

impl ExclusionRules {
    pub fn new<E, D>(emails: E, departments: D) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            excluded_emails: emails.into_iter().map(Into::into).collect(),
            excluded_departments: departments.into_iter().map(Into::into).collect(),
        }
    }

    /// Load both exclusion lists. A missing file means an empty list.
    pub fn load(emails_path: &Path, departments_path: &Path) -> Result<Self> {
        let rules = Self {
            excluded_emails: read_list(emails_path)?,
            excluded_departments: read_list(departments_path)?,
        };
        info!(
            emails = rules.excluded_emails.len(),
            departments = rules.excluded_departments.len(),
            "Loaded exclusion rules"
        );
        Ok(rules)
    }

    pub fn is_email_excluded(&self, email: &str) -> bool {
        self.excluded_emails.contains(email)
    }

    /// First excluded substring found in `department`, if any
    pub fn matching_department(&self, department: &str) -> Option<&str> {
        self.excluded_departments
            .iter()
            .find(|excluded| department.contains(excluded.as_str()))
            .map(String::as_str)
    }
}

/// One entry per line; surrounding whitespace stripped, blank lines skipped.
fn read_list(path: &Path) -> Result<BTreeSet<String>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "Exclusion list not found, treating as empty");
            return Ok(BTreeSet::new());
        }
        Err(source) => {
            return Err(SyncError::ExclusionList {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    Ok(parse_list(&contents))
}

fn parse_list(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_skips_blanks() {
        let list = parse_list("a@example.com\n  b@example.com \r\n\n\t\nc@example.com");
        assert_eq!(
            list.into_iter().collect::<Vec<_>>(),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let emails = dir.path().join("emails.txt");
        let departments = dir.path().join("departments.txt");
        std::fs::write(&emails, "bot@example.com\n").unwrap();
        std::fs::write(&departments, "Contractor\nVendor\n").unwrap();

        let rules = ExclusionRules::load(&emails, &departments).unwrap();
        assert!(rules.is_email_excluded("bot@example.com"));
        assert_eq!(rules.excluded_departments.len(), 2);
    }

    #[test]
    fn test_missing_files_mean_no_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let rules = ExclusionRules::load(
            &dir.path().join("missing-emails.txt"),
            &dir.path().join("missing-departments.txt"),
        )
        .unwrap();
        assert_eq!(rules, ExclusionRules::default());
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be read as a list file
        let err = ExclusionRules::load(dir.path(), &dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, SyncError::ExclusionList { .. }));
    }

    #[test]
    fn test_department_substring_is_case_sensitive() {
        let rules = ExclusionRules::new(Vec::<String>::new(), ["Contract"]);
        assert_eq!(rules.matching_department("External Contractors"), Some("Contract"));
        assert_eq!(rules.matching_department("external contractors"), None);
    }
}
