// permissions module

pub mod engine;
pub mod ownership;

pub use engine::{Action, PermissionEngine};
pub use ownership::{require_client_owner, require_contract_owner, require_event_support};
