//! State isolation namespaces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Isolation scope for stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateNamespace {
    /// Per mod component.
    #[serde(alias = "extension")]
    Private,
    /// Per mod.
    #[serde(alias = "blueprint")]
    Mod,
    /// Shared by every mod on the page.
    #[default]
    #[serde(alias = "shared")]
    Public,
}

impl fmt::Display for StateNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Mod => write!(f, "mod"),
            Self::Public => write!(f, "public"),
        }
    }
}
