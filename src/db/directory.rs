//! User and department lookups shared by login, refresh and authorization

use crate::db::models::{AuthenticatedUser, Department, DepartmentRecord, User};
use crate::db::session::Session;
use crate::error::{AuthError, AuthResult};

pub fn find_user_by_username(session: &Session, username: &str) -> AuthResult<Option<User>> {
    session.find::<User, _>(|u| u.username == username)
}

pub fn find_department(session: &Session, department: Department) -> AuthResult<Option<DepartmentRecord>> {
    session.find::<DepartmentRecord, _>(|d| d.name == department)
}

/// Resolve a department reference; a dangling reference is a store fault
pub fn department_of(session: &Session, department_id: u64) -> AuthResult<Department> {
    session
        .get::<DepartmentRecord>(department_id)?
        .map(|d| d.name)
        .ok_or_else(|| {
            AuthError::persistence(format!("department {} does not exist", department_id))
        })
}

pub fn identity_for(session: &Session, user: &User) -> AuthResult<AuthenticatedUser> {
    let department = department_of(session, user.department_id)?;
    Ok(AuthenticatedUser::from_user(user, department))
}

/// Current user row with its department, or `None` if the user is gone
pub fn load_identity(session: &Session, user_id: u64) -> AuthResult<Option<AuthenticatedUser>> {
    session
        .get::<User>(user_id)?
        .map(|user| identity_for(session, &user))
        .transpose()
}
