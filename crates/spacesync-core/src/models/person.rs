use serde::{Deserialize, Serialize};

/// A person as listed by the organization directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "loginEnabled", default)]
    pub login_enabled: bool,
    #[serde(rename = "invitePending", default)]
    pub invite_pending: bool,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub department: Option<String>,
}

impl DirectoryEntry {
    /// The address used for exclusion matching: only the first listed email.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_entry_from_api_shape() {
        let json = r#"{
            "id": "p1",
            "emails": ["ann@example.com", "a.n@example.com"],
            "displayName": "Ann Example",
            "loginEnabled": true,
            "invitePending": false,
            "department": "Engineering",
            "orgId": "org-1",
            "created": "2021-03-01T12:00:00.000Z"
        }"#;

        let entry: DirectoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "p1");
        assert_eq!(entry.display_name, "Ann Example");
        assert!(entry.login_enabled);
        assert!(!entry.invite_pending);
        assert_eq!(entry.primary_email(), Some("ann@example.com"));
        assert_eq!(entry.department.as_deref(), Some("Engineering"));
    }

    #[test]
    fn test_directory_entry_missing_optional_fields() {
        let entry: DirectoryEntry = serde_json::from_str(r#"{"id": "p2"}"#).unwrap();
        assert!(!entry.login_enabled);
        assert!(!entry.invite_pending);
        assert!(entry.emails.is_empty());
        assert_eq!(entry.primary_email(), None);
        assert_eq!(entry.department, None);
    }
}
