use crate::session::types::SessionUser;

/// Role the portal selects by default for members holding several roles.
const FAMILY_ROLE: &str = "family";

/// The permission context the user is acting in, and the ones they may
/// switch to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleSelection {
    pub active_role: String,
    pub available_roles: Vec<String>,
}

impl RoleSelection {
    /// Resolves the roles of `user`, keeping `preferred` only when the user
    /// actually holds it.
    pub fn for_user(user: &SessionUser, preferred: Option<&str>) -> Self {
        let available_roles = available_roles(user);
        let active_role = preferred
            .filter(|role| available_roles.iter().any(|r| r == role))
            .map(str::to_string)
            .or_else(|| default_role(&available_roles))
            .unwrap_or_default();

        Self {
            active_role,
            available_roles,
        }
    }

    pub fn contains(&self, role: &str) -> bool {
        self.available_roles.iter().any(|r| r == role)
    }
}

fn available_roles(user: &SessionUser) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();
    for role in user.roles.iter().flatten() {
        if !role.is_empty() && !roles.contains(role) {
            roles.push(role.clone());
        }
    }

    if roles.is_empty() && !user.role.is_empty() {
        roles.push(user.role.clone());
    }
    roles
}

fn is_family_role(role: &str) -> bool {
    role.eq_ignore_ascii_case(FAMILY_ROLE)
        || role
            .get(..FAMILY_ROLE.len() + 1)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("family_"))
}

fn default_role(available_roles: &[String]) -> Option<String> {
    available_roles
        .iter()
        .find(|role| is_family_role(role))
        .or_else(|| available_roles.first())
        .cloned()
}
