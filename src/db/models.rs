//! Persistent records and the identity snapshot derived from them

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical tables of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Departments,
    Users,
    Clients,
    Contracts,
    Events,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Departments => "departments",
            Table::Users => "users",
            Table::Clients => "clients",
            Table::Contracts => "contracts",
            Table::Events => "events",
        }
    }

    /// Tables only the privileged tier may modify
    pub fn requires_privilege(&self) -> bool {
        matches!(self, Table::Departments | Table::Users)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A row type that can be staged in a [`Session`](crate::db::Session)
pub trait Record: Serialize + DeserializeOwned + Clone {
    const TABLE: Table;

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);
}

macro_rules! impl_record {
    ($ty:ty, $table:expr) => {
        impl Record for $ty {
            const TABLE: Table = $table;

            fn id(&self) -> u64 {
                self.id
            }

            fn set_id(&mut self, id: u64) {
                self.id = id;
            }
        }
    };
}

/// The three fixed departments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    Commercial,
    Support,
    Gestion,
}

impl Department {
    pub const ALL: [Department; 3] = [
        Department::Commercial,
        Department::Support,
        Department::Gestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Commercial => "Commercial",
            Department::Support => "Support",
            Department::Gestion => "Gestion",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Department::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown department '{}'", s))
    }
}

/// Department reference row, created once at bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRecord {
    pub id: u64,
    pub name: Department,
}

impl_record!(DepartmentRecord, Table::Departments);

/// Employee account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub email: String,
    pub name: String,
    pub department_id: u64,
}

impl_record!(User, Table::Users);

/// Live view of a user with the department resolved, without the password
/// hash. This is what tokens are minted from and what permission checks see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub department: Department,
}

impl AuthenticatedUser {
    pub fn from_user(user: &User, department: Department) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            department,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub company_name: Option<String>,
    pub date_created: NaiveDate,
    pub last_contact_date: Option<NaiveDate>,
    pub commercial_contact_id: Option<u64>,
}

impl_record!(Client, Table::Clients);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: u64,
    pub client_id: u64,
    pub commercial_contact_id: Option<u64>,
    pub total_amount: f64,
    pub amount_due: f64,
    pub date_created: NaiveDate,
    pub signed: bool,
}

impl_record!(Contract, Table::Contracts);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub contract_id: u64,
    pub client_id: u64,
    pub event_name: String,
    pub event_date_start: NaiveDateTime,
    pub event_date_end: NaiveDateTime,
    pub support_contact_id: Option<u64>,
    pub location: Option<String>,
    pub attendees: Option<u32>,
    pub notes: Option<String>,
}

impl_record!(Event, Table::Events);
