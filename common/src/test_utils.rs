use std::path::PathBuf;
use std::sync::OnceLock;

/// Returns the workspace root directory (parent of this crate's manifest).
fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map(PathBuf::from)
        .unwrap_or(manifest_dir)
}

/// Ensures the test output directory exists. Safe to call multiple times.
pub fn ensure_test_output_dir() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        std::fs::create_dir_all(workspace_root().join("test_output"))
            .expect("Failed to create test_output directory");
    });
}

/// Returns the path to a test output file.
pub fn test_output_path(name: &str) -> PathBuf {
    ensure_test_output_dir();
    workspace_root().join("test_output").join(name)
}

/// Writes `contents` into the test output directory and returns its path.
pub fn write_test_file(name: &str, contents: &str) -> PathBuf {
    let path = test_output_path(name);
    std::fs::write(&path, contents)
        .unwrap_or_else(|e| panic!("Failed to write {}: {}", path.display(), e));
    path
}
