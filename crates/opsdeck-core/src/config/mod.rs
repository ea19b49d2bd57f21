//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Opsdeck configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; `None` uses the default under the config dir
    pub database_path: Option<PathBuf>,
    /// Root directory the object buckets live under
    pub object_root: Option<PathBuf>,
}

/// Bucket and path conventions the backup engine operates on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Bucket snapshots are written to and restored from
    pub backup_bucket: String,
    /// Bucket holding workflow and hierarchy diagram renders
    pub diagram_bucket: String,
    /// Bucket holding generated business-plan documents
    pub document_bucket: String,
    /// Diagram bucket prefixes swept during export
    pub diagram_prefixes: Vec<String>,
    /// Document bucket prefix; team id is the next path segment
    pub business_plan_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            object_root: None,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_bucket: "database-backups".to_string(),
            diagram_bucket: "workflow-diagrams".to_string(),
            document_bucket: "generated-documents".to_string(),
            diagram_prefixes: vec![
                "growth_workflows".to_string(),
                "fulfillment_workflows".to_string(),
                "team_hierarchy".to_string(),
            ],
            business_plan_prefix: "business-plan".to_string(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("OPSDECK_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("opsdeck")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating file
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backup.backup_bucket.trim().is_empty() {
            return Err(anyhow!("backup.backup_bucket must not be empty"));
        }
        if self.backup.diagram_bucket.trim().is_empty() {
            return Err(anyhow!("backup.diagram_bucket must not be empty"));
        }
        if self.backup.document_bucket.trim().is_empty() {
            return Err(anyhow!("backup.document_bucket must not be empty"));
        }
        if self.backup.business_plan_prefix.trim().is_empty() {
            return Err(anyhow!("backup.business_plan_prefix must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.backup.backup_bucket, "database-backups");
        assert_eq!(config.backup.diagram_prefixes.len(), 3);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.backup.business_plan_prefix, "business-plan");
        assert!(parsed.storage.database_path.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let mut config = Config::default();
        config.backup.backup_bucket = " ".to_string();
        assert!(config.validate().is_err());
    }
}
