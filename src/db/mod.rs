//! Database routing between privilege tiers and environments.
//!
//! A [`ConnectionManager`] owns three lazily-initialized connection profiles
//! (privileged/production, restricted/production and the isolated test
//! database reachable under both tiers) and hands out short-lived
//! [`Session`]s: begin, do one logical operation, commit or roll back.

pub mod directory;
pub mod engine;
pub mod manager;
pub mod models;
pub mod profile;
pub mod session;

pub use engine::Engine;
pub use manager::ConnectionManager;
pub use models::{
    AuthenticatedUser, Client, Contract, Department, DepartmentRecord, Event, Record, Table, User,
};
pub use profile::{ConnectionProfile, Environment, Privilege};
pub use session::Session;
