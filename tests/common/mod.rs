//! Common test utilities and fixtures
//!
//! Builds throwaway persona directories and config files in a temp dir.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Get a command for the meatmonsters binary
pub fn monsters_cmd() -> Command {
    let mut cmd = Command::cargo_bin("meatmonsters").unwrap();
    // Keep the developer's environment out of the tests
    for var in [
        "MEATMONSTERS_CONFIG",
        "MEATMONSTERS_API_KEY",
        "MEATMONSTERS_ADDRESS",
        "MEATMONSTERS_PERSONAS_DIR",
        "MEATMONSTERS_COOLDOWN_SECS",
        "MEATMONSTERS_WARMUP_EVENTS",
        "MEATMONSTERS_LOG_FILE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// A temp directory holding a `monsters/` persona root and a config file
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("monsters")).unwrap();
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Root directory for personas
    pub fn monsters_dir(&self) -> PathBuf {
        self.path().join("monsters")
    }

    pub fn monsters_arg(&self) -> String {
        self.monsters_dir().to_str().unwrap().to_string()
    }

    /// Write a persona with `persona.toml`, one text file per action and an
    /// optional GIF for the first action.
    pub fn add_persona(&self, dir: &str, name: &str, actions: &[(&str, &[&str], &[&str])]) -> PathBuf {
        let path = self.monsters_dir().join(dir);
        fs::create_dir_all(&path).unwrap();

        let mut toml = format!("name = \"{}\"\n\n[actions]\n", name);
        for (action, triggers, replies) in actions {
            let quoted: Vec<String> = triggers.iter().map(|t| format!("{:?}", t)).collect();
            toml.push_str(&format!("{} = [{}]\n", action, quoted.join(", ")));
            fs::write(path.join(format!("{}.txt", action)), replies.join("\n")).unwrap();
        }
        fs::write(path.join("persona.toml"), toml).unwrap();
        path
    }

    /// Write an image next to a persona's assets
    pub fn add_image(&self, persona_dir: &str, file: &str, bytes: &[u8]) {
        fs::write(self.monsters_dir().join(persona_dir).join(file), bytes).unwrap();
    }

    /// Write `meatmonsters.toml` and return its path
    pub fn write_config(&self, content: &str) -> String {
        let path = self.path().join("meatmonsters.toml");
        fs::write(&path, content).unwrap();
        path.to_str().unwrap().to_string()
    }
}
