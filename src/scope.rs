// 🗺️ Request scope - whole country (state rows) or one state (county rows)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel used in routes for the whole-country scope
pub const COUNTRY_SENTINEL: &str = "US";

/// Serialized as its route form: "US" or the state postal code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Scope {
    /// Aggregated to one row per state
    Country,

    /// Aggregated to one row per county of the given state (postal code)
    State(String),
}

/// Granularity of the rows a scope produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    State,
    County,
}

impl Scope {
    pub fn parse(code: &str) -> Self {
        let code = code.trim();
        if code == COUNTRY_SENTINEL {
            Scope::Country
        } else {
            Scope::State(code.to_string())
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Scope::Country => Level::State,
            Scope::State(_) => Level::County,
        }
    }

    pub fn state_code(&self) -> Option<&str> {
        match self {
            Scope::Country => None,
            Scope::State(code) => Some(code),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Country => f.write_str(COUNTRY_SENTINEL),
            Scope::State(code) => f.write_str(code),
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

impl From<String> for Scope {
    fn from(code: String) -> Self {
        Scope::parse(&code)
    }
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::State => "state",
            Level::County => "county",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_country_sentinel() {
        assert_eq!(Scope::parse("US"), Scope::Country);
        assert_eq!(Scope::parse(" US "), Scope::Country);
        assert_eq!(Scope::Country.level(), Level::State);
        assert_eq!(Scope::Country.state_code(), None);
    }

    #[test]
    fn test_parse_state() {
        let scope = Scope::parse("TX");
        assert_eq!(scope, Scope::State("TX".to_string()));
        assert_eq!(scope.level(), Level::County);
        assert_eq!(scope.state_code(), Some("TX"));
        assert_eq!(scope.to_string(), "TX");
    }

    #[test]
    fn test_serializes_as_route_form() {
        assert_eq!(serde_json::to_string(&Scope::Country).unwrap(), "\"US\"");
        let scope: Scope = serde_json::from_str("\"CA\"").unwrap();
        assert_eq!(scope, Scope::State("CA".to_string()));
    }
}
