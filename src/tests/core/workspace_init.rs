// Workspace initialization tests: the .vestige folder structure, config
// persistence, and workspace detection from nested directories.

use std::fs;

use crate::tests::helpers::temp_workspace;
use crate::workspace::{VestigeWorkspace, WorkspaceConfig};

/// Test: initialize creates the complete .vestige structure
#[test]
fn test_initialize_creates_folder_structure() {
    let (_temp, workspace) = temp_workspace();

    assert!(workspace.vestige_dir.is_dir());
    assert!(workspace.vestige_dir.join("index").is_dir());
    assert!(workspace.vestige_dir.join("logs").is_dir());
    assert!(workspace.vestige_dir.join("config.toml").is_file());

    let gitignore = fs::read_to_string(workspace.vestige_dir.join(".gitignore"))
        .expect("Failed to read .gitignore");
    assert!(gitignore.contains("*"), "gitignore should exclude everything");
    assert!(
        gitignore.contains("!.gitignore"),
        "gitignore should keep itself"
    );
}

/// Test: the database and logs paths live inside the .vestige directory
#[test]
fn test_storage_paths_are_workspace_local() {
    let (_temp, workspace) = temp_workspace();

    assert_eq!(
        workspace.db_path(),
        workspace.vestige_dir.join("index").join("vestige.db")
    );
    assert_eq!(workspace.logs_path(), workspace.vestige_dir.join("logs"));
}

/// Test: detection walks up the directory tree to the workspace root
///
/// Components can be invoked from anywhere inside the project; they must
/// find the same .vestige directory the root owns.
#[test]
fn test_detect_and_load_finds_workspace_from_nested_directory() {
    let (_temp, workspace) = temp_workspace();
    let nested = workspace.root.join("src").join("deep").join("nested");
    fs::create_dir_all(&nested).expect("Failed to create nested directories");

    let detected = VestigeWorkspace::detect_and_load(nested)
        .expect("Detection should not fail")
        .expect("Workspace should be found from a nested directory");

    assert_eq!(detected.root, workspace.root);
    assert_eq!(detected.vestige_dir, workspace.vestige_dir);
}

/// Test: detection in a directory without a workspace returns None
#[test]
fn test_detect_and_load_without_workspace_returns_none() {
    let temp = tempfile::TempDir::new().expect("Failed to create temp directory");

    let detected = VestigeWorkspace::detect_and_load(temp.path().to_path_buf())
        .expect("Detection should not fail");

    assert!(detected.is_none());
}

/// Test: load_or_initialize creates on first call and reuses afterwards
#[test]
fn test_load_or_initialize_is_idempotent() {
    let temp = tempfile::TempDir::new().expect("Failed to create temp directory");
    let root = temp
        .path()
        .canonicalize()
        .expect("Failed to canonicalize temp root");

    let first = VestigeWorkspace::load_or_initialize(root.clone())
        .expect("First call should initialize");
    assert!(first.vestige_dir.is_dir());

    let second = VestigeWorkspace::load_or_initialize(root).expect("Second call should load");
    assert_eq!(second.vestige_dir, first.vestige_dir);
    assert_eq!(second.config.version, first.config.version);
}

/// Test: the saved config round-trips through config.toml
#[test]
fn test_config_round_trips_through_toml() {
    let (_temp, workspace) = temp_workspace();

    let raw = fs::read_to_string(workspace.vestige_dir.join("config.toml"))
        .expect("Failed to read config.toml");
    let loaded: WorkspaceConfig = toml::from_str(&raw).expect("Config should parse");

    let defaults = WorkspaceConfig::default();
    assert_eq!(loaded.indexed_extensions, defaults.indexed_extensions);
    assert_eq!(loaded.max_queries_per_minute, defaults.max_queries_per_minute);
    assert_eq!(loaded.staleness_hours, defaults.staleness_hours);
    assert_eq!(loaded.embedding_dimensions, defaults.embedding_dimensions);
    assert_eq!(loaded.diagnostic_timeout_secs, defaults.diagnostic_timeout_secs);
}

/// Test: default policy values the other components depend on
#[test]
fn test_default_config_values() {
    let config = WorkspaceConfig::default();

    assert!(config.indexed_extensions.contains(&"py".to_string()));
    assert!(config.indexed_extensions.contains(&"md".to_string()));
    assert!(
        config
            .ignore_patterns
            .contains(&"**/.vestige/**".to_string()),
        "scans must never index the workspace's own data"
    );
    assert_eq!(config.max_queries_per_minute, 20);
    assert_eq!(config.staleness_hours, 24);
    assert_eq!(config.embedding_dimensions, 384);
    assert!(config.context_files.contains(&"package.json".to_string()));
}

/// Test: validate_structure recreates missing directories and config
#[test]
fn test_validate_structure_repairs_missing_pieces() {
    let (_temp, workspace) = temp_workspace();

    fs::remove_dir_all(workspace.vestige_dir.join("logs")).expect("Failed to remove logs dir");
    fs::remove_file(workspace.vestige_dir.join("config.toml"))
        .expect("Failed to remove config.toml");

    workspace
        .validate_structure()
        .expect("Validation should repair the structure");

    assert!(workspace.vestige_dir.join("logs").is_dir());
    assert!(workspace.vestige_dir.join("config.toml").is_file());
}
