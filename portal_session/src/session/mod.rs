mod errors;
mod manager;
mod record;
mod roles;
mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use errors::SessionError;
pub use manager::SessionManager;
pub use roles::RoleSelection;
pub use types::{AuthState, ExpiryReason, SessionRecord, SessionUser};

pub(crate) use record::stored_token;
