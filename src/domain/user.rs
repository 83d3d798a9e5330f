use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A signed-in user as yielded by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Technician,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether `assigned_to` names this user, by full name or email.
    pub fn is_assignee(&self, assigned_to: &str) -> bool {
        let assigned_to = assigned_to.trim();
        if assigned_to.eq_ignore_ascii_case(self.email.trim()) {
            return true;
        }
        self.full_name
            .as_deref()
            .is_some_and(|name| name.trim() == assigned_to)
    }
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Technician => "technician",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "technician" | "tech" | "user" => Ok(Role::Technician),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, User};
    use std::str::FromStr;

    fn technician() -> User {
        User {
            id: "u-1".to_string(),
            email: "ayse@example.com".to_string(),
            role: Role::Technician,
            full_name: Some("Ayşe Yılmaz".to_string()),
        }
    }

    #[test]
    fn matches_assignee_by_email_or_full_name() {
        let user = technician();
        assert!(user.is_assignee("AYSE@example.com"));
        assert!(user.is_assignee(" Ayşe Yılmaz "));
        assert!(!user.is_assignee("mehmet"));
        assert!(!user.is_admin());
    }

    #[test]
    fn parses_roles_from_user_documents() {
        assert_eq!(Role::from_str("Admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("user").unwrap(), Role::Technician);
        assert!(Role::from_str("guest").is_err());

        let user: User =
            serde_json::from_str(r#"{"id":"u-2","email":"a@b.c","role":"admin"}"#).unwrap();
        assert!(user.is_admin());
        assert!(user.full_name.is_none());
    }
}
