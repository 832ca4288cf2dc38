//! Persona registry: every persona under a root directory, plus the flattened
//! trigger list used for matching.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::model::Persona;

/// One trigger pattern bound to the persona and action it fires.
#[derive(Debug, Clone)]
pub struct TriggerBinding {
    pub pattern: Regex,
    pub persona: Arc<Persona>,
    pub action: String,
}

impl TriggerBinding {
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// All loaded personas and their bindings in match-priority order.
#[derive(Debug, Clone, Default)]
pub struct PersonaRegistry {
    personas: Vec<Arc<Persona>>,
    bindings: Vec<TriggerBinding>,
}

impl PersonaRegistry {
    /// Load one persona from each subdirectory of `root`.
    ///
    /// Subdirectories are visited in sorted name order, which is also the
    /// match priority across personas. Hidden directories are skipped.
    pub fn load(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::PersonasDirNotFound {
                path: root.to_path_buf(),
            });
        }

        let entries = fs::read_dir(root).map_err(|e| Error::IoRead {
            path: root.to_path_buf(),
            source: e,
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::IoRead {
                path: root.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('.'));
            if hidden {
                debug!(dir = %path.display(), "Skipping hidden directory");
                continue;
            }
            dirs.push(path);
        }
        dirs.sort();

        let personas = dirs
            .iter()
            .map(|dir| Persona::load(dir))
            .collect::<Result<Vec<_>>>()?;

        let registry = Self::from_personas(personas)?;

        info!(
            root = %root.display(),
            personas = registry.personas.len(),
            bindings = registry.bindings.len(),
            "Persona registry loaded"
        );

        Ok(registry)
    }

    /// Build a registry from already constructed personas, keeping their order.
    pub fn from_personas(personas: Vec<Persona>) -> Result<Self> {
        let mut loaded: Vec<Arc<Persona>> = Vec::with_capacity(personas.len());

        for persona in personas {
            if let Some(existing) = loaded.iter().find(|p| p.name() == persona.name()) {
                return Err(Error::DuplicatePersonaName {
                    name: persona.name().to_string(),
                    first: source_of(existing),
                    second: source_of(&persona),
                });
            }
            loaded.push(Arc::new(persona));
        }

        let bindings = loaded
            .iter()
            .flat_map(|persona| {
                persona.triggers().iter().map(move |trigger| TriggerBinding {
                    pattern: trigger.pattern().clone(),
                    persona: Arc::clone(persona),
                    action: trigger.action().to_string(),
                })
            })
            .collect();

        Ok(Self {
            personas: loaded,
            bindings,
        })
    }

    pub fn personas(&self) -> &[Arc<Persona>] {
        &self.personas
    }

    pub fn bindings(&self) -> &[TriggerBinding] {
        &self.bindings
    }

    /// First binding whose pattern matches `text`.
    pub fn find_match(&self, text: &str) -> Option<&TriggerBinding> {
        self.bindings.iter().find(|b| b.is_match(text))
    }

    /// Per-persona summary for listing.
    pub fn summaries(&self) -> Vec<PersonaSummary> {
        self.personas
            .iter()
            .map(|p| PersonaSummary {
                name: p.name().to_string(),
                actions: p.action_names().into_iter().map(str::to_string).collect(),
                triggers: p.triggers().len(),
                images: p.image_count(),
                source: p.source_dir().map(Path::to_path_buf),
            })
            .collect()
    }
}

/// Summary of a loaded persona.
#[derive(Debug, Clone)]
pub struct PersonaSummary {
    pub name: String,
    pub actions: Vec<String>,
    pub triggers: usize,
    pub images: usize,
    pub source: Option<PathBuf>,
}

fn source_of(persona: &Persona) -> PathBuf {
    persona
        .source_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("<memory>"))
}
