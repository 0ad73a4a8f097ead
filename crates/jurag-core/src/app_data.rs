//! Where JuRAG stores its own data (config, persisted index).
//!
//! The PDF corpus stays wherever the user keeps it. We only store app state here.

use std::path::PathBuf;

/// Returns the directory where JuRAG stores config and the default index.
/// On Linux: `~/.local/share/jurag/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "JuRAG", "JuRAG")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Default location of the persisted index when the config names none.
pub fn default_index_path() -> PathBuf {
    app_data_dir()
        .map(|d| d.join("docs_index"))
        .unwrap_or_else(|| PathBuf::from("docs_index"))
}
