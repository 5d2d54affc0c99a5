//! Configuration file parsing for `flowref.toml`.
//!
//! Searches current directory then ancestors, falling back to
//! `~/.config/flowref/flowref.toml` if no project-level file is found.

use flowref_compiler::CheckOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "flowref.toml";

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct FlowrefConfig {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub check: CheckSection,
}

/// How results are printed.
#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored diagnostics with source snippets
    #[default]
    Human,
    /// Diagnostics without ANSI escapes
    Plain,
    /// One JSON document with every unit report
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OutputSection {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            color: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CheckSection {
    #[serde(default = "default_true")]
    pub depends: bool,
    #[serde(default = "default_true")]
    pub globals: bool,
    /// Stop printing diagnostics for a subject after this many
    #[serde(default)]
    pub max_diagnostics: Option<usize>,
}

impl Default for CheckSection {
    fn default() -> Self {
        Self {
            depends: true,
            globals: true,
            max_diagnostics: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl FlowrefConfig {
    /// Load config from `flowref.toml`, searching current dir then parents,
    /// and return the path of the file that was found.
    pub fn load_with_path() -> Option<(PathBuf, Self)> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                let cfg = Self::load_from(&config_path).ok()?;
                return Some((config_path, cfg));
            }
            if !dir.pop() {
                break;
            }
        }
        // Try global config
        let home = std::env::var("HOME").ok().map(PathBuf::from)?;
        let global = home.join(".config").join("flowref").join(CONFIG_FILE);
        if global.exists() {
            let cfg = Self::load_from(&global).ok()?;
            return Some((global, cfg));
        }
        None
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("invalid toml in '{}': {}", path.display(), e))
    }

    /// Parse a TOML string directly.
    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            check_depends: self.check.depends,
            check_globals: self.check.globals,
        }
    }

    /// Generate a default `flowref.toml` template.
    pub fn default_template() -> &'static str {
        r#"# flowref configuration

[output]
# "human", "plain" or "json"
format = "human"
color = true

[check]
# Check Refined_Depends against Depends
depends = true
# Check Refined_Global against Global
globals = true
# max_diagnostics = 20
"#
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
