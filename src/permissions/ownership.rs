//! Record-level ownership rules, applied after the coarse department check

use crate::db::{AuthenticatedUser, Client, Contract, Department, Event};
use crate::error::{AuthError, AuthResult};
use log::debug;

fn denied(user: &AuthenticatedUser, resource: String) -> AuthError {
    debug!("Ownership check failed for {} on {}", user.username, resource);
    AuthError::ownership_denied(resource)
}

/// Only a client's commercial contact may modify it
pub fn require_client_owner(user: &AuthenticatedUser, client: &Client) -> AuthResult<()> {
    if client.commercial_contact_id == Some(user.id) {
        Ok(())
    } else {
        Err(denied(user, format!("client {}", client.id)))
    }
}

/// Gestion may modify any contract; anyone else must be its commercial contact
pub fn require_contract_owner(user: &AuthenticatedUser, contract: &Contract) -> AuthResult<()> {
    if user.department == Department::Gestion || contract.commercial_contact_id == Some(user.id) {
        Ok(())
    } else {
        Err(denied(user, format!("contract {}", contract.id)))
    }
}

/// Only the assigned support contact may modify an event
pub fn require_event_support(user: &AuthenticatedUser, event: &Event) -> AuthResult<()> {
    if event.support_contact_id == Some(user.id) {
        Ok(())
    } else {
        Err(denied(user, format!("event {}", event.id)))
    }
}
