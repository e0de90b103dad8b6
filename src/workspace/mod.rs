// src/workspace/mod.rs
//! Vestige Workspace Management
//!
//! This module manages the .vestige workspace folder structure and
//! initialization. The workspace provides project-local storage for all
//! Vestige data including:
//! - SQLite index database (code elements, file summaries, snapshot)
//! - Logs
//! - Configuration

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The main Vestige workspace structure
///
/// Locates the project root, owns the .vestige directory layout, and loads
/// the configuration every component reads its policy from.
#[derive(Debug, Clone)]
pub struct VestigeWorkspace {
    /// Project root directory the agent operates in
    pub root: PathBuf,

    /// The .vestige directory for all workspace data
    pub vestige_dir: PathBuf,

    /// Workspace configuration
    pub config: WorkspaceConfig,
}

/// Configuration for a Vestige workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Version of the workspace format
    pub version: String,

    /// File extensions included in indexing and freshness scans
    pub indexed_extensions: Vec<String>,

    /// Patterns to ignore during workspace scans
    pub ignore_patterns: Vec<String>,

    /// Maximum file size to index (in bytes)
    pub max_file_size: usize,

    /// Content payloads above this size draw a policy warning (in bytes)
    pub max_content_bytes: usize,

    /// Queries allowed per sliding 60-second window
    pub max_queries_per_minute: usize,

    /// Hours before an index is considered stale on age alone
    pub staleness_hours: u64,

    /// Dimensionality of stored embedding vectors
    pub embedding_dimensions: usize,

    /// Seconds to wait for the diagnostic backend before giving up
    pub diagnostic_timeout_secs: u64,

    /// Project manifests copied into shadow workspaces when present
    pub context_files: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            indexed_extensions: vec![
                "py".to_string(),
                "js".to_string(),
                "ts".to_string(),
                "tsx".to_string(),
                "jsx".to_string(),
                "md".to_string(),
            ],
            ignore_patterns: vec![
                "**/.git/**".to_string(),
                "**/__pycache__/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.venv/**".to_string(),
                "**/venv/**".to_string(),
                "**/.vestige/**".to_string(), // Don't index our own data
            ],
            max_file_size: 1024 * 1024, // 1MB default
            max_content_bytes: 1024 * 1024,
            max_queries_per_minute: 20,
            staleness_hours: 24,
            embedding_dimensions: 384,
            diagnostic_timeout_secs: 30,
            context_files: vec![
                "pyproject.toml".to_string(),
                "setup.py".to_string(),
                "requirements.txt".to_string(),
                "package.json".to_string(),
                "tsconfig.json".to_string(),
                ".pylintrc".to_string(),
            ],
        }
    }
}

impl VestigeWorkspace {
    /// Initialize a new Vestige workspace at the given root directory
    ///
    /// This creates the .vestige folder structure and sets up initial
    /// configuration.
    pub fn initialize(root: PathBuf) -> Result<Self> {
        info!("Initializing Vestige workspace at: {}", root.display());

        let vestige_dir = root.join(".vestige");
        Self::create_folder_structure(&vestige_dir)?;

        let config = WorkspaceConfig::default();
        Self::save_config(&vestige_dir, &config)?;

        info!("Vestige workspace initialized successfully");
        Ok(Self {
            root,
            vestige_dir,
            config,
        })
    }

    /// Detect and load an existing Vestige workspace
    ///
    /// Searches up the directory tree from the given path to find a
    /// .vestige folder.
    pub fn detect_and_load(start_path: PathBuf) -> Result<Option<Self>> {
        match Self::find_workspace_root(&start_path) {
            Some(vestige_dir) => {
                let root = vestige_dir
                    .parent()
                    .ok_or_else(|| anyhow!("Invalid workspace structure"))?
                    .to_path_buf();

                info!("Found existing Vestige workspace at: {}", root.display());

                let config = Self::load_config(&vestige_dir)?;
                let workspace = Self {
                    root,
                    vestige_dir,
                    config,
                };
                workspace.validate_structure()?;
                Ok(Some(workspace))
            }
            None => {
                debug!("No existing Vestige workspace found");
                Ok(None)
            }
        }
    }

    /// Load an existing workspace or initialize a fresh one at `root`.
    pub fn load_or_initialize(root: PathBuf) -> Result<Self> {
        match Self::detect_and_load(root.clone())? {
            Some(workspace) => Ok(workspace),
            None => Self::initialize(root),
        }
    }

    /// Create the complete .vestige folder hierarchy
    fn create_folder_structure(vestige_dir: &Path) -> Result<()> {
        debug!(
            "Creating .vestige folder structure at: {}",
            vestige_dir.display()
        );

        let folders = [
            vestige_dir.join("index"), // SQLite database
            vestige_dir.join("logs"),  // Vestige logs
        ];

        for folder in &folders {
            fs::create_dir_all(folder)
                .map_err(|e| anyhow!("Failed to create directory {}: {}", folder.display(), e))?;
            debug!("Created directory: {}", folder.display());
        }

        // Create .gitignore to prevent accidental commits of Vestige's data
        let gitignore_path = vestige_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(
                &gitignore_path,
                "# Vestige trust layer data - do not commit to version control\n\
                *\n\
                !.gitignore\n",
            )?;
            debug!("Created .gitignore in .vestige directory");
        }

        info!("Created .vestige folder structure");
        Ok(())
    }

    /// Save workspace configuration to config.toml
    fn save_config(vestige_dir: &Path, config: &WorkspaceConfig) -> Result<()> {
        let config_path = vestige_dir.join("config.toml");
        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        fs::write(&config_path, toml_content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        debug!("Saved configuration to: {}", config_path.display());
        Ok(())
    }

    /// Load workspace configuration from config.toml
    fn load_config(vestige_dir: &Path) -> Result<WorkspaceConfig> {
        let config_path = vestige_dir.join("config.toml");

        if !config_path.exists() {
            warn!("Configuration file not found, using defaults");
            return Ok(WorkspaceConfig::default());
        }

        let config_content = fs::read_to_string(&config_path)
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: WorkspaceConfig = toml::from_str(&config_content)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        debug!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Find workspace root by searching up the directory tree
    fn find_workspace_root(start_path: &Path) -> Option<PathBuf> {
        let mut current = start_path.to_path_buf();

        loop {
            let vestige_dir = current.join(".vestige");
            if vestige_dir.is_dir() {
                debug!("Found .vestige directory at: {}", vestige_dir.display());
                return Some(vestige_dir);
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        None
    }

    /// Validate that workspace structure is intact, recreating what is
    /// missing.
    pub fn validate_structure(&self) -> Result<()> {
        debug!("Validating workspace structure");

        for dir in &["index", "logs"] {
            let path = self.vestige_dir.join(dir);
            if !path.exists() {
                info!("Creating missing directory: {}", path.display());
                fs::create_dir_all(&path)
                    .context(format!("Failed to create directory: {}", path.display()))?;
            }
        }

        let config_path = self.vestige_dir.join("config.toml");
        if !config_path.exists() {
            info!("Configuration file missing, creating with defaults");
            Self::save_config(&self.vestige_dir, &self.config)?;
        }

        debug!("Workspace structure validation passed");
        Ok(())
    }

    /// Get the path to the SQLite index database file
    pub fn db_path(&self) -> PathBuf {
        self.vestige_dir.join("index").join("vestige.db")
    }

    /// Get the path to the logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.vestige_dir.join("logs")
    }
}
