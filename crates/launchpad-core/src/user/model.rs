//! UserProfile domain model.

use serde::{Deserialize, Serialize};

/// Per-user preferences stored in the `user_profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    /// Whether agent state is persisted automatically after edits.
    #[serde(default = "default_true")]
    pub auto_save_sessions: bool,
}

fn default_true() -> bool {
    true
}

impl UserProfile {
    /// The profile assumed for a user without a stored row.
    pub fn defaults_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email_notifications: true,
            auto_save_sessions: true,
        }
    }

    /// Resolves a display label: profile name, then email local part, then "User".
    pub fn display_name_or(&self, email: Option<&str>) -> String {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                email
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_flags_default_to_true() {
        let profile: UserProfile = serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
        assert!(profile.auto_save_sessions);
        assert!(profile.email_notifications);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut profile = UserProfile::defaults_for("u1");
        assert_eq!(profile.display_name_or(Some("ada@example.com")), "ada");
        assert_eq!(profile.display_name_or(None), "User");

        profile.display_name = Some("Ada L.".into());
        assert_eq!(profile.display_name_or(Some("ada@example.com")), "Ada L.");
    }
}
