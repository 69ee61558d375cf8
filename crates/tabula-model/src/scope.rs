use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// The breadth over which a table's primary keys must be unique.
///
/// `Group` keys are unique within their named group; `Global` keys are unique
/// across the entire key space. A `Global` key also blocks the value for
/// every group-scoped table, in any group.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    #[default]
    Group,
    Global,
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyScope::Group => f.write_str("group"),
            KeyScope::Global => f.write_str("global"),
        }
    }
}

impl FromStr for KeyScope {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "group" => Ok(KeyScope::Group),
            "global" => Ok(KeyScope::Global),
            _ => Err(SchemaError::UnknownScope {
                token: s.to_string(),
            }),
        }
    }
}
