use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which database a session is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Database privilege tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    /// Full rights: user and department administration, bootstrap
    Privileged,
    /// Ordinary business data only
    Restricted,
}

impl Privilege {
    pub fn from_flag(privileged: bool) -> Self {
        if privileged {
            Privilege::Privileged
        } else {
            Privilege::Restricted
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Privilege::Privileged)
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::Privileged => f.write_str("privileged"),
            Privilege::Restricted => f.write_str("restricted"),
        }
    }
}

/// The (privilege, environment) pair a session is opened under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionProfile {
    pub privilege: Privilege,
    pub environment: Environment,
}

impl ConnectionProfile {
    pub fn new(privilege: Privilege, environment: Environment) -> Self {
        Self {
            privilege,
            environment,
        }
    }
}

impl fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.privilege, self.environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("test".parse::<Environment>(), Ok(Environment::Test));
        assert_eq!(" Production ".parse::<Environment>(), Ok(Environment::Production));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_privilege_from_flag() {
        assert!(Privilege::from_flag(true).is_privileged());
        assert!(!Privilege::from_flag(false).is_privileged());
        assert_eq!(
            ConnectionProfile::new(Privilege::Restricted, Environment::Test).to_string(),
            "restricted/test"
        );
    }
}
