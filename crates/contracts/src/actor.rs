//! Scene actor identity and classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle for an actor owned by the host scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

impl From<u32> for ActorId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Descriptive data the scene exposes for an actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorInfo {
    /// Display name, used for default asset names
    pub name: String,

    /// Class hierarchy, most derived first (e.g. `["Zombie", "Character", "Actor"]`)
    pub class_chain: Vec<String>,

    /// Free-form gameplay tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ActorInfo {
    pub fn new(name: impl Into<String>, class_chain: Vec<String>) -> Self {
        Self {
            name: name.into(),
            class_chain,
            tags: Vec::new(),
        }
    }

    /// Subtype check: true when `class` appears anywhere in the chain
    pub fn is_a(&self, class: &str) -> bool {
        self.class_chain.iter().any(|c| c == class)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
