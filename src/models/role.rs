use serde::{Deserialize, Serialize};

/// Numeric role carried in tokens and stored in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    Admin = 1,
    Manager = 2,
    Worker = 3,
}

impl Role {
    pub fn to_db(self) -> u8 {
        self as u8
    }

    pub fn from_db(v: u8) -> Option<Self> {
        match v {
            1 => Some(Role::Admin),
            2 => Some(Role::Manager),
            3 => Some(Role::Worker),
            _ => None,
        }
    }

    /// Helper: parse a role name from the CLI (`admin`, `manager`, `worker`).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "worker" | "user" => Some(Role::Worker),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Worker => "worker",
        }
    }

    /// Admins and managers maintain master data and see everyone's records.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Role::from_db(v).ok_or_else(|| format!("invalid role: {v}"))
    }
}

impl From<Role> for u8 {
    fn from(r: Role) -> u8 {
        r.to_db()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_as_numbers() {
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "2");
        let r: Role = serde_json::from_str("1").unwrap();
        assert_eq!(r, Role::Admin);
        assert!(serde_json::from_str::<Role>("9").is_err());
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(Role::from_name("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_name("user"), Some(Role::Worker));
        assert_eq!(Role::from_name("boss"), None);
    }
}
