//! XDG Base Directory support.

use std::path::PathBuf;

const APP_DIR: &str = "rag-setup";

/// XDG directory paths for rag-setup.
pub struct XdgDirs {
    /// Config directory (~/.config/rag-setup or XDG_CONFIG_HOME/rag-setup)
    pub config: PathBuf,
}

impl XdgDirs {
    /// Get XDG directories, respecting environment variables.
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            config: std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join(".config"))
                .join(APP_DIR),
        }
    }

    /// Path of the persisted configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.json")
    }
}

impl Default for XdgDirs {
    fn default() -> Self {
        Self::new()
    }
}
