use crate::db::{AuthenticatedUser, Department};
use crate::error::{AuthError, AuthResult};
use log::debug;
use std::fmt;
use std::str::FromStr;

/// Coarse, department-gated business actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateClient,
    UpdateClient,
    CreateContract,
    UpdateContract,
    CreateEvent,
    UpdateEvent,
    UpdateEventSupportContact,
    ManageUsers,
    FilterContracts,
    FilterEvents,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::CreateClient,
        Action::UpdateClient,
        Action::CreateContract,
        Action::UpdateContract,
        Action::CreateEvent,
        Action::UpdateEvent,
        Action::UpdateEventSupportContact,
        Action::ManageUsers,
        Action::FilterContracts,
        Action::FilterEvents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateClient => "create_client",
            Action::UpdateClient => "update_client",
            Action::CreateContract => "create_contract",
            Action::UpdateContract => "update_contract",
            Action::CreateEvent => "create_event",
            Action::UpdateEvent => "update_event",
            Action::UpdateEventSupportContact => "update_event_support_contact",
            Action::ManageUsers => "manage_users",
            Action::FilterContracts => "filter_contracts",
            Action::FilterEvents => "filter_events",
        }
    }

    /// Look up an action by its wire name
    pub fn parse(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.as_str() == name)
    }

    /// Departments allowed to perform this action. Exhaustive so that a new
    /// action cannot be added without deciding who may perform it.
    pub fn permitted_departments(&self) -> &'static [Department] {
        use Department::*;
        match self {
            Action::CreateClient | Action::UpdateClient => &[Commercial],
            Action::CreateContract => &[Gestion],
            Action::UpdateContract => &[Commercial, Gestion],
            Action::CreateEvent => &[Commercial],
            Action::UpdateEvent => &[Support],
            Action::UpdateEventSupportContact => &[Gestion],
            Action::ManageUsers => &[Gestion],
            Action::FilterContracts => &[Commercial],
            Action::FilterEvents => &[Support, Gestion],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::parse(s).ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// Static department-to-action lookup.
///
/// The engine answers only the coarse question "may this department ever
/// perform this action". Record-level ownership rules live in
/// [`ownership`](crate::permissions::ownership) and are applied by callers
/// after this check passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionEngine;

impl PermissionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Checks whether `user`'s department may perform `action`.
    ///
    /// A pure function of `(user.department, action)`: two users in the same
    /// department always get the same answer.
    ///
    /// # Arguments
    ///
    /// * `action` - The coarse action being attempted
    /// * `user` - Live identity of the caller
    ///
    /// # Returns
    ///
    /// true if the department is granted the action, false otherwise
    #[must_use]
    pub fn authorize(&self, action: Action, user: &AuthenticatedUser) -> bool {
        let allowed = self.authorize_department(action, user.department);
        debug!(
            "Permission check {} for {} ({}): {}",
            action, user.username, user.department, allowed
        );
        allowed
    }

    #[must_use]
    pub fn authorize_department(&self, action: Action, department: Department) -> bool {
        action.permitted_departments().contains(&department)
    }

    /// Like [`authorize`](Self::authorize) but keyed by action name; unknown
    /// names are denied.
    #[must_use]
    pub fn authorize_named(&self, action: &str, user: &AuthenticatedUser) -> bool {
        match Action::parse(action) {
            Some(action) => self.authorize(action, user),
            None => {
                debug!("Denied unknown action '{}' for {}", action, user.username);
                false
            }
        }
    }

    /// [`authorize`](Self::authorize) as a `Result`
    pub fn require(&self, action: Action, user: &AuthenticatedUser) -> AuthResult<()> {
        if self.authorize(action, user) {
            Ok(())
        } else {
            Err(AuthError::AuthorizationDenied {
                action: action.to_string(),
            })
        }
    }

    /// Every action `department` may perform, in declaration order
    pub fn actions_for(&self, department: Department) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|a| self.authorize_department(*a, department))
            .collect()
    }
}
