use super::{fetch, CrmService, Outcome};
use crate::bootstrap::{self, NewUser};
use crate::credentials::SessionContext;
use crate::crypto::password::hash_password;
use crate::db::{directory, AuthenticatedUser, Department, User};
use crate::error::{AuthError, AuthResult};
use crate::permissions::Action;
use crate::validation::{validate_email, validate_not_empty};
use log::info;

/// Fields left `None` are unchanged
#[derive(Clone, Default)]
pub struct CollaboratorChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub department: Option<Department>,
    pub password: Option<String>,
}

impl std::fmt::Debug for CollaboratorChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorChanges")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("department", &self.department)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CrmService {
    /// Create an employee account. Runs on the privileged tier.
    pub fn create_collaborator(
        &self,
        ctx: &SessionContext,
        new: NewUser,
    ) -> AuthResult<Outcome<AuthenticatedUser>> {
        self.run_privileged(ctx, Action::ManageUsers, |user, session| {
            if session
                .find::<User, _>(|u| u.username == new.username || u.email == new.email)?
                .is_some()
            {
                return Err(AuthError::validation("username or email already in use"));
            }
            let created = bootstrap::create_user(session, &new)?;
            info!("{} created collaborator {}", user.username, created.username);
            directory::identity_for(session, &created)
        })
    }

    pub fn update_collaborator(
        &self,
        ctx: &SessionContext,
        user_id: u64,
        changes: CollaboratorChanges,
    ) -> AuthResult<Outcome<AuthenticatedUser>> {
        self.run_privileged(ctx, Action::ManageUsers, |user, session| {
            let mut target: User = fetch(session, user_id)?;

            if let Some(email) = changes.email {
                validate_email(&email)?;
                if session
                    .find::<User, _>(|u| u.email == email && u.id != target.id)?
                    .is_some()
                {
                    return Err(AuthError::validation("email already in use"));
                }
                target.email = email;
            }
            if let Some(name) = changes.name {
                validate_not_empty("name", &name)?;
                target.name = name;
            }
            if let Some(department) = changes.department {
                target.department_id = directory::find_department(session, department)?
                    .ok_or_else(|| {
                        AuthError::persistence(format!("department {} has not been seeded", department))
                    })?
                    .id;
            }
            if let Some(password) = changes.password {
                validate_not_empty("password", &password)?;
                target.password_hash = hash_password(&password)?;
            }

            session.update(&target)?;
            info!("{} updated collaborator {}", user.username, target.username);
            directory::identity_for(session, &target)
        })
    }

    /// Remove an employee account; removing one's own account is refused
    pub fn delete_collaborator(&self, ctx: &SessionContext, user_id: u64) -> AuthResult<Outcome<()>> {
        self.run_privileged(ctx, Action::ManageUsers, |user, session| {
            let target: User = fetch(session, user_id)?;
            if target.id == user.id {
                return Err(AuthError::validation("you cannot delete your own account"));
            }
            session.delete::<User>(target.id)?;
            info!("{} deleted collaborator {}", user.username, target.username);
            Ok(())
        })
    }

    pub fn list_collaborators(&self, ctx: &SessionContext) -> AuthResult<Outcome<Vec<AuthenticatedUser>>> {
        self.run_privileged(ctx, Action::ManageUsers, |_, session| {
            session
                .all::<User>()?
                .iter()
                .map(|u| directory::identity_for(session, u))
                .collect()
        })
    }
}
