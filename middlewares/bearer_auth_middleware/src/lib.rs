mod extract;
mod provider;
mod user;

pub use extract::{CustomerIdentity, StaffIdentity};
pub use provider::{AuthError, AuthProvider};
pub use user::{Identity, Role};
