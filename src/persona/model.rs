//! Loaded personas and reply selection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::assets::{ActionAssets, AssetLoader, AssetSource};
use super::types::{PersonaConfig, FINGERPRINT_WIDTH};

// ─────────────────────────────────────────────────────────────────
// Triggers
// ─────────────────────────────────────────────────────────────────

/// A compiled pattern routing matching messages to an action.
#[derive(Debug, Clone)]
pub struct Trigger {
    pattern: Regex,
    action: String,
}

impl Trigger {
    /// Compile `pattern` case-insensitively.
    pub fn compile(persona: &str, action: &str, pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::InvalidPattern {
                persona: persona.to_string(),
                action: action.to_string(),
                pattern: pattern.to_string(),
                source: e,
            })?;

        Ok(Self {
            pattern: regex,
            action: action.to_string(),
        })
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona
// ─────────────────────────────────────────────────────────────────

/// Content picked for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub message: String,
    /// Data URI, or empty when the action has no images
    pub picture: String,
    pub fingerprint: String,
}

/// A fully loaded persona. Immutable once built.
#[derive(Debug, Clone)]
pub struct Persona {
    name: String,
    fingerprint: String,
    actions: HashMap<String, ActionAssets>,
    triggers: Vec<Trigger>,
    source_dir: Option<PathBuf>,
}

impl Persona {
    /// Load a persona from its directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let config = PersonaConfig::load(dir)?;
        let loader = AssetLoader::new(dir);
        let mut persona = Self::from_config(&config, &loader)?;
        persona.source_dir = Some(dir.to_path_buf());

        info!(
            persona = %persona.name,
            dir = %dir.display(),
            actions = persona.actions.len(),
            triggers = persona.triggers.len(),
            "Loaded persona"
        );

        Ok(persona)
    }

    /// Build a persona from a parsed config and an asset source.
    ///
    /// Every declared action gets its assets loaded, and every pattern is
    /// compiled in declaration order.
    pub fn from_config(config: &PersonaConfig, assets: &dyn AssetSource) -> Result<Self> {
        config.validate(&config.name)?;

        let mut actions = HashMap::with_capacity(config.actions.len());
        let mut triggers = Vec::with_capacity(config.actions.trigger_count());

        for decl in config.actions.iter() {
            let loaded = assets.load_action(&config.name, &decl.name)?;
            if loaded.texts.is_empty() {
                return Err(Error::config_malformed(
                    &config.name,
                    format!("action '{}' has no replies", decl.name),
                ));
            }
            actions.insert(decl.name.clone(), loaded);

            for pattern in &decl.triggers {
                triggers.push(Trigger::compile(&config.name, &decl.name, pattern)?);
            }
        }

        debug!(
            persona = %config.name,
            actions = actions.len(),
            triggers = triggers.len(),
            "Built persona"
        );

        Ok(Self {
            name: config.name.clone(),
            fingerprint: fingerprint(&config.name),
            actions,
            triggers,
            source_dir: None,
        })
    }

    /// Pick a reply for `action`.
    ///
    /// Text and picture are drawn independently and uniformly, with
    /// replacement.
    pub fn select<R: Rng + ?Sized>(&self, action: &str, rng: &mut R) -> Result<ActionResponse> {
        let assets = self
            .actions
            .get(action)
            .ok_or_else(|| Error::unknown_action(&self.name, action))?;

        let message = assets
            .texts
            .choose(rng)
            .cloned()
            .ok_or_else(|| Error::AssetEmpty {
                persona: self.name.clone(),
                action: action.to_string(),
                path: PathBuf::from(format!("{}.txt", action)),
            })?;

        let picture = assets
            .images
            .choose(rng)
            .map(|image| image.as_str().to_string())
            .unwrap_or_default();

        Ok(ActionResponse {
            message,
            picture,
            fingerprint: self.fingerprint.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    #[cfg(test)]
    pub fn action(&self, name: &str) -> Option<&ActionAssets> {
        self.actions.get(name)
    }

    /// Action names, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Total images across all actions.
    pub fn image_count(&self) -> usize {
        self.actions.values().map(|a| a.images.len()).sum()
    }

    /// Directory the persona was loaded from, if any.
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }
}

/// Left-pad `name` with `'0'` to the fingerprint width.
pub fn fingerprint(name: &str) -> String {
    let width = name.chars().count();
    let mut out = String::with_capacity(FINGERPRINT_WIDTH.max(name.len()));
    for _ in width..FINGERPRINT_WIDTH {
        out.push('0');
    }
    out.push_str(name);
    out
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
