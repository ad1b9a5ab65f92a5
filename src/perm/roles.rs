use serde::{Deserialize, Serialize};

/// 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    Admin,
    #[default]
    #[serde(rename = "Sales User")]
    SalesUser,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::SalesUser => "Sales User",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_value(Role::SalesUser).unwrap(), json!("Sales User"));
        assert_eq!(serde_json::from_value::<Role>(json!("Admin")).unwrap(), Role::Admin);
        assert!(serde_json::from_value::<Role>(json!("Root")).is_err());
        assert_eq!(Role::default(), Role::SalesUser);
    }

    #[test]
    fn has_role() {
        let actor = Actor::new("u1", Role::SalesUser);
        assert!(actor.has_role(Role::SalesUser));
        assert!(!actor.is_admin());
    }
}
