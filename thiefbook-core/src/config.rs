use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::paginator::PageLayout;
use crate::seek_index::DEFAULT_CHECKPOINT_INTERVAL;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// User settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub book_path: Option<PathBuf>,
    /// Passed through to the front end untouched.
    pub font_family: String,
    pub font_size: u16,
    pub lines_per_page: usize,
    pub line_spacing: usize,
    pub checkpoint_interval: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            book_path: None,
            font_family: "monospace".to_string(),
            font_size: 12,
            lines_per_page: 5,
            line_spacing: 0,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

impl ReaderConfig {
    /// Default location of the config file for this platform.
    pub fn default_path(dirs: &ProjectDirs) -> PathBuf {
        dirs.config_dir().join(CONFIG_FILE_NAME)
    }

    /// Reads the config at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config: ReaderConfig =
            toml::from_str(&raw).with_context(|| format!("failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config directory {:?}", parent))?;
        }
        let payload = toml::to_string_pretty(self)?;
        fs::write(path, payload).with_context(|| format!("failed to write config file {:?}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ReaderError> {
        if self.lines_per_page == 0 {
            return Err(ReaderError::InvalidConfig(
                "lines_per_page must be at least 1".into(),
            ));
        }
        if self.checkpoint_interval == 0 {
            return Err(ReaderError::InvalidConfig(
                "checkpoint_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> PageLayout {
        PageLayout::new(self.lines_per_page, self.line_spacing)
    }

    /// The configured book, ignoring an empty path.
    pub fn book(&self) -> Option<&Path> {
        self.book_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ReaderConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ReaderConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "book_path = \"/books/novel.txt\"\nlines_per_page = 40\n").unwrap();

        let config = ReaderConfig::load(&path).unwrap();
        assert_eq!(config.book(), Some(Path::new("/books/novel.txt")));
        assert_eq!(config.lines_per_page, 40);
        assert_eq!(config.line_spacing, 0);
        assert_eq!(config.checkpoint_interval, DEFAULT_CHECKPOINT_INTERVAL);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "lines_per_page = 0\n").unwrap();
        assert!(ReaderConfig::load(&path).is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = ReaderConfig {
            book_path: Some(PathBuf::from("/books/a.txt")),
            font_family: "Noto Serif CJK".into(),
            font_size: 16,
            lines_per_page: 30,
            line_spacing: 1,
            checkpoint_interval: 50,
        };
        config.save(&path).unwrap();
        assert_eq!(ReaderConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn empty_book_path_counts_as_unset() {
        let config = ReaderConfig {
            book_path: Some(PathBuf::new()),
            ..ReaderConfig::default()
        };
        assert!(config.book().is_none());
    }
}
