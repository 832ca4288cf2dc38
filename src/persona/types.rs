//! Persona configuration schema.
//!
//! A persona directory holds either `persona.toml` or `attributes.json`, both
//! with the same shape:
//!
//! ```toml
//! name = "Grub"
//!
//! [actions]
//! greet = ["hello", "\\bhi\\b"]
//! ```
//!
//! Action order in the document is preserved; it decides trigger priority.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────

/// Width of the fingerprint sent with every reply.
pub const FINGERPRINT_WIDTH: usize = 32;

/// Preferred persona config file.
pub const TOML_CONFIG_FILE: &str = "persona.toml";

/// Legacy persona config file.
pub const JSON_CONFIG_FILE: &str = "attributes.json";

// ─────────────────────────────────────────────────────────────────
// Persona Config
// ─────────────────────────────────────────────────────────────────

/// Persona configuration as declared on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Unique persona name, also the source of the reply fingerprint.
    pub name: String,

    /// Actions in declaration order, each with its trigger patterns.
    pub actions: ActionTriggers,
}

/// One declared action and the patterns routing to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDecl {
    pub name: String,
    pub triggers: Vec<String>,
}

/// Ordered `action -> [pattern]` mapping.
///
/// Deserialized from a map while keeping document order, which a `HashMap`
/// or `BTreeMap` would lose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTriggers(Vec<ActionDecl>);

impl ActionTriggers {
    pub fn new(actions: Vec<ActionDecl>) -> Self {
        Self(actions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionDecl> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Total number of trigger patterns across all actions.
    pub fn trigger_count(&self) -> usize {
        self.0.iter().map(|a| a.triggers.len()).sum()
    }
}

impl Serialize for ActionTriggers {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for action in &self.0 {
            map.serialize_entry(&action.name, &action.triggers)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ActionTriggers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = ActionTriggers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of action names to lists of trigger patterns")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut actions = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, triggers)) = access.next_entry::<String, Vec<String>>()? {
                    actions.push(ActionDecl { name, triggers });
                }
                Ok(ActionTriggers(actions))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

impl PersonaConfig {
    /// Load the persona config found in `dir`.
    ///
    /// `persona.toml` wins over `attributes.json` when both exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let origin = dir.display().to_string();

        let toml_path = dir.join(TOML_CONFIG_FILE);
        if toml_path.is_file() {
            let content = read_config(&toml_path)?;
            return Self::from_toml_str(&content, &origin);
        }

        let json_path = dir.join(JSON_CONFIG_FILE);
        if json_path.is_file() {
            let content = read_config(&json_path)?;
            return Self::from_json_str(&content, &origin);
        }

        Err(Error::config_malformed(
            origin,
            format!("neither {} nor {} found", TOML_CONFIG_FILE, JSON_CONFIG_FILE),
        ))
    }

    /// Parse and validate a TOML persona config.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self> {
        let cfg: PersonaConfig = toml::from_str(content)
            .map_err(|e| Error::config_malformed(origin, e.message().to_string()))?;
        cfg.validate(origin)?;
        Ok(cfg)
    }

    /// Parse and validate a JSON persona config.
    pub fn from_json_str(content: &str, origin: &str) -> Result<Self> {
        let cfg: PersonaConfig = serde_json::from_str(content)
            .map_err(|e| Error::config_malformed(origin, e.to_string()))?;
        cfg.validate(origin)?;
        Ok(cfg)
    }

    /// Check the constraints serde cannot express.
    pub fn validate(&self, origin: &str) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::config_malformed(origin, "name must not be empty"));
        }
        if name != self.name {
            return Err(Error::config_malformed(
                origin,
                "name must not have leading or trailing whitespace",
            ));
        }
        if self.name.chars().count() > FINGERPRINT_WIDTH {
            return Err(Error::config_malformed(
                origin,
                format!(
                    "name '{}' is longer than {} characters",
                    self.name, FINGERPRINT_WIDTH
                ),
            ));
        }

        let mut seen = HashSet::new();
        for action in self.actions.iter() {
            if !is_valid_action_name(&action.name) {
                return Err(Error::config_malformed(
                    origin,
                    format!("invalid action name '{}'", action.name),
                ));
            }
            if !seen.insert(action.name.as_str()) {
                return Err(Error::config_malformed(
                    origin,
                    format!("action '{}' declared twice", action.name),
                ));
            }
        }

        Ok(())
    }
}

/// Action names become file name prefixes, so they must stay inside the
/// persona directory.
fn is_valid_action_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
