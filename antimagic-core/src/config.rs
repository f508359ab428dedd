//! Configuration loading from antimagic.toml.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::error::{AntimagicError, AntimagicResult, IoResultExt};

/// File name looked up in the project root when no config file is given.
pub const CONFIG_FILE_NAME: &str = "antimagic.toml";

/// Placeholder the formatting template must contain.
pub const FILEPATHS_PLACEHOLDER: &str = "{filepaths}";

/// How name collisions between distinct values are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Report the offending literals and abort without writing.
    Exception,
    /// Leave every fresh literal of a contested name untouched.
    Ignore,
    /// The most frequent value keeps the name.
    #[default]
    MostCommon,
    /// Ask the naming assistant for new names until no collision remains.
    Ai,
}

/// How literals the naming engine cannot name are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultPolicy {
    /// Report the offending literals and abort without writing.
    Exception,
    /// Leave the literals untouched.
    Ignore,
    /// Ask the naming assistant.
    #[default]
    Ai,
}

impl FromStr for DuplicatePolicy {
    type Err = AntimagicError;

    fn from_str(s: &str) -> AntimagicResult<Self> {
        match s {
            "exception" => Ok(Self::Exception),
            "ignore" => Ok(Self::Ignore),
            "most_common" => Ok(Self::MostCommon),
            "ai" => Ok(Self::Ai),
            other => Err(AntimagicError::config(format!(
                "unknown duplicates solver '{}' (expected exception, ignore, most_common or ai)",
                other
            ))),
        }
    }
}

impl FromStr for DifficultPolicy {
    type Err = AntimagicError;

    fn from_str(s: &str) -> AntimagicResult<Self> {
        match s {
            "exception" => Ok(Self::Exception),
            "ignore" => Ok(Self::Ignore),
            "ai" => Ok(Self::Ai),
            other => Err(AntimagicError::config(format!(
                "unknown difficult string solver '{}' (expected exception, ignore or ai)",
                other
            ))),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exception => "exception",
            Self::Ignore => "ignore",
            Self::MostCommon => "most_common",
            Self::Ai => "ai",
        })
    }
}

impl fmt::Display for DifficultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exception => "exception",
            Self::Ignore => "ignore",
            Self::Ai => "ai",
        })
    }
}

/// Main configuration structure for antimagic.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AntimagicConfig {
    /// Project root; every other path is resolved against it.
    pub root: PathBuf,
    /// Source files or directories to scan.
    pub paths: Vec<PathBuf>,
    /// Output tree holding the generated constants, relative to `root`.
    pub output_dir: String,
    /// Rewrite files (true) or only report findings (false).
    pub modify: bool,
    /// Also extract literals that only appear inside type annotations.
    pub include_annotations: bool,
    /// Suffix appended to every generated symbol.
    pub const_name_suffix: String,
    /// Path prefixes (relative to `root`) that are never scanned.
    pub exclude: Vec<String>,
    pub duplicates_solver: DuplicatePolicy,
    pub difficult_string_solver: DifficultPolicy,
    /// Model identifier passed to the naming assistant.
    pub assistant_model: String,
    /// Chat-completions endpoint of the naming assistant.
    pub assistant_endpoint: String,
    /// Environment variable holding the assistant API key.
    pub assistant_api_key_env: String,
    /// Number of literals sent to the assistant per request.
    pub assistant_batch_size: usize,
    /// Upper bound on assistant rounds while resolving duplicates.
    pub max_resolution_rounds: usize,
    /// Maximum underscore-separated segments of a derived name.
    pub max_name_segments: usize,
    /// Regex a literal value must fully match to be extracted.
    pub allowed_values: Option<String>,
    /// Shell command run on modified files; must contain `{filepaths}`.
    pub formatting: Option<String>,
    /// Exit successfully even when findings are reported.
    pub suppress_fail: bool,
}

impl Default for AntimagicConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            paths: Vec::new(),
            output_dir: "generated_constants".to_string(),
            modify: true,
            include_annotations: false,
            const_name_suffix: String::new(),
            exclude: Vec::new(),
            duplicates_solver: DuplicatePolicy::default(),
            difficult_string_solver: DifficultPolicy::default(),
            assistant_model: "anthropic/claude-3.5-sonnet".to_string(),
            assistant_endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            assistant_api_key_env: "OPENROUTER_API_KEY".to_string(),
            assistant_batch_size: 30,
            max_resolution_rounds: 3,
            max_name_segments: 3,
            allowed_values: None,
            formatting: None,
            suppress_fail: false,
        }
    }
}

impl AntimagicConfig {
    /// Check every setting that would otherwise fail halfway through a run.
    pub fn validate(&self) -> AntimagicResult<()> {
        if let Some(template) = &self.formatting {
            if !template.contains(FILEPATHS_PLACEHOLDER) {
                return Err(AntimagicError::config(format!(
                    "{} placeholder must be included in the formatting command",
                    FILEPATHS_PLACEHOLDER
                )));
            }
        }
        if self.assistant_batch_size == 0 {
            return Err(AntimagicError::config("assistant batch size must be positive"));
        }
        if self.max_resolution_rounds == 0 {
            return Err(AntimagicError::config("max resolution rounds must be positive"));
        }
        if self.max_name_segments == 0 {
            return Err(AntimagicError::config("max name segments must be positive"));
        }
        self.allowed_values_regex()?;

        let output = Path::new(&self.output_dir);
        if self.output_dir.trim().is_empty()
            || output.is_absolute()
            || output
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AntimagicError::config(format!(
                "output directory '{}' must be a plain relative path inside the root",
                self.output_dir
            )));
        }
        Ok(())
    }

    /// Compiled `allowed_values` pattern, anchored to match whole values.
    pub fn allowed_values_regex(&self) -> AntimagicResult<Option<Regex>> {
        self.allowed_values
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!(r"\A(?:{})\z", pattern)).map_err(|e| {
                    AntimagicError::config(format!("invalid allowed_values pattern: {}", e))
                })
            })
            .transpose()
    }

    /// Output tree location relative to the root.
    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    /// Whether a root-relative path falls under one of the exclusion prefixes.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.exclude
            .iter()
            .map(|prefix| prefix.trim())
            .filter(|prefix| !prefix.is_empty())
            .any(|prefix| relative.starts_with(Path::new(prefix)))
    }
}

/// Loads configuration from an explicit file.
pub fn load_config_file(path: &Path) -> AntimagicResult<AntimagicConfig> {
    let content = fs::read_to_string(path).with_path(path)?;
    toml::from_str(&content)
        .map_err(|e| AntimagicError::config(format!("invalid {}: {}", path.display(), e)))
}

/// Loads configuration from antimagic.toml in `root` if it exists.
pub fn load_config(root: &Path) -> AntimagicResult<Option<AntimagicConfig>> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AntimagicConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.duplicates_solver, DuplicatePolicy::MostCommon);
        assert_eq!(config.difficult_string_solver, DifficultPolicy::Ai);
        assert_eq!(config.max_name_segments, 3);
    }

    #[test]
    fn test_formatting_requires_placeholder() {
        let config = AntimagicConfig {
            formatting: Some("black .".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AntimagicError::Config { .. })));

        let config = AntimagicConfig {
            formatting: Some("black {filepaths}".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_dir_must_stay_inside_root() {
        for bad in ["", "../out", "/abs/out", "./out"] {
            let config = AntimagicConfig {
                output_dir: bad.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_allowed_values_is_anchored() {
        let config = AntimagicConfig {
            allowed_values: Some("[a-z]+".to_string()),
            ..Default::default()
        };
        let re = config.allowed_values_regex().unwrap().unwrap();
        assert!(re.is_match("hello"));
        assert!(!re.is_match("hello world"));

        let config = AntimagicConfig {
            allowed_values: Some("(".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_excluded_prefix_match() {
        let config = AntimagicConfig {
            exclude: vec!["tests".to_string(), " vendor/lib ".to_string()],
            ..Default::default()
        };
        assert!(config.is_excluded(Path::new("tests/test_app.py")));
        assert!(config.is_excluded(Path::new("vendor/lib/x.py")));
        assert!(!config.is_excluded(Path::new("vendor/other.py")));
        assert!(!config.is_excluded(Path::new("tests_extra/a.py")));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("ai".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Ai);
        assert_eq!(
            "most_common".parse::<DuplicatePolicy>().unwrap(),
            DuplicatePolicy::MostCommon
        );
        assert!("most_common".parse::<DifficultPolicy>().is_err());
        assert_eq!(DuplicatePolicy::MostCommon.to_string(), "most_common");
    }

    #[test]
    fn test_toml_roundtrip_of_partial_file() {
        let config: AntimagicConfig = toml::from_str(
            r#"
            output_dir = "consts"
            duplicates_solver = "ignore"
            exclude = ["migrations"]
            "#,
        )
        .unwrap();
        assert_eq!(config.output_dir, "consts");
        assert_eq!(config.duplicates_solver, DuplicatePolicy::Ignore);
        assert!(config.modify);
    }
}
