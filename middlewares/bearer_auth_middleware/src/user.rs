use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Customer => "customer",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staff" => Ok(Role::Staff),
            "customer" => Ok(Role::Customer),
            _ => Err(()),
        }
    }
}

/// The resolved identity a verified bearer credential maps to. Handlers
/// receive this value explicitly; nothing is attached to the request itself.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}
