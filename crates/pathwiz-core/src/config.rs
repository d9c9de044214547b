//! Tree generation configuration.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which renderings a tree generation call produces.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// Nested node tree only.
    Dict,
    /// Markdown text only.
    Markdown,
    /// Both renderings.
    #[default]
    Both,
}

impl OutputFormat {
    /// Check if the nested tree is requested.
    pub fn wants_dict(self) -> bool {
        matches!(self, Self::Dict | Self::Both)
    }

    /// Check if the markdown text is requested.
    pub fn wants_markdown(self) -> bool {
        matches!(self, Self::Markdown | Self::Both)
    }
}

/// Configuration for directory tree generation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct TreeConfig {
    /// Directory names that are skipped entirely.
    #[builder(default)]
    #[serde(default)]
    pub excluded_dirs: Vec<String>,

    /// Include hidden entries (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Name patterns to skip (`prefix*`, `*suffix` or exact names).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Maximum depth to descend (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Follow symbolic links into their targets.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub follow_symlinks: bool,

    /// Wrap markdown output in a title and a code fence.
    #[builder(default = "false")]
    #[serde(default)]
    pub markdown_header: bool,
}

fn default_true() -> bool {
    true
}

impl TreeConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref dirs) = self.excluded_dirs {
            if let Some(bad) = dirs.iter().find(|d| d.is_empty() || d.contains('/')) {
                return Err(format!("Excluded directory must be a plain name: {bad:?}"));
            }
        }
        if let Some(ref patterns) = self.ignore_patterns {
            if patterns.iter().any(|p| p.is_empty() || p == "*") {
                return Err("Ignore patterns cannot be empty or match everything".to_string());
            }
        }
        Ok(())
    }
}

impl TreeConfig {
    /// Create a new tree config builder.
    pub fn builder() -> TreeConfigBuilder {
        TreeConfigBuilder::default()
    }

    /// Check if a name matches one of the ignore patterns.
    pub fn should_ignore(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| {
            if let Some(prefix) = pattern.strip_suffix('*') {
                name.starts_with(prefix)
            } else if let Some(suffix) = pattern.strip_prefix('*') {
                name.ends_with(suffix)
            } else {
                name == pattern
            }
        })
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }

    /// Check if a directory name is excluded.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    /// Deepest level (root = 0) whose entries are listed.
    pub fn walk_depth(&self) -> usize {
        self.max_depth.map_or(usize::MAX, |d| d as usize)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: Vec::new(),
            include_hidden: true,
            ignore_patterns: Vec::new(),
            max_depth: None,
            follow_symlinks: true,
            markdown_header: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = TreeConfig::builder()
            .excluded_dirs(vec!["target".to_string()])
            .include_hidden(false)
            .max_depth(Some(2))
            .build()
            .unwrap();

        assert!(config.is_excluded_dir("target"));
        assert!(!config.include_hidden);
        assert_eq!(config.max_depth, Some(2));
        assert!(config.follow_symlinks);
    }

    #[test]
    fn test_builder_rejects_path_like_exclusions() {
        let result = TreeConfig::builder()
            .excluded_dirs(vec!["a/b".to_string()])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_should_ignore() {
        let config = TreeConfig::builder()
            .ignore_patterns(vec!["node_modules".to_string(), "*.log".to_string(), "tmp*".to_string()])
            .build()
            .unwrap();

        assert!(config.should_ignore("node_modules"));
        assert!(config.should_ignore("test.log"));
        assert!(config.should_ignore("tmp_1"));
        assert!(!config.should_ignore("src"));
    }

    #[test]
    fn test_should_skip_hidden() {
        let mut config = TreeConfig::default();
        assert!(!config.should_skip_hidden(".git"));

        config.include_hidden = false;
        assert!(config.should_skip_hidden(".git"));
        assert!(!config.should_skip_hidden("src"));
    }

    #[test]
    fn test_walk_depth() {
        let config = TreeConfig::builder().max_depth(Some(1)).build().unwrap();
        assert_eq!(config.walk_depth(), 1);
        assert_eq!(TreeConfig::default().walk_depth(), usize::MAX);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("dict".parse::<OutputFormat>().unwrap(), OutputFormat::Dict);
        assert_eq!("Markdown".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("both".parse::<OutputFormat>().unwrap(), OutputFormat::Both);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Dict.to_string(), "dict");
        assert!(OutputFormat::Both.wants_dict() && OutputFormat::Both.wants_markdown());
    }
}
