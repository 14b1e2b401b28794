pub mod apply;
pub mod init;
pub mod log;
pub mod render;
pub mod replay;
pub mod watch;

pub use apply::{apply, ApplyArgs};
pub use init::{init, InitArgs};
pub use log::{log, LogArgs};
pub use render::{render, RenderArgs};
pub use replay::{replay, ReplayArgs};
pub use watch::{watch, WatchArgs};

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use twodo_model::CanonicalModel;

/// Resolve a user-supplied path against the working directory
pub(crate) fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub(crate) fn load_model(path: &Path) -> Result<CanonicalModel> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Cannot read model {}", path.display()))?;
    let model: CanonicalModel = serde_json::from_str(&content)
        .with_context(|| format!("Invalid model file {}", path.display()))?;
    model.check_integrity()?;
    Ok(model)
}

pub(crate) fn save_model(path: &Path, model: &CanonicalModel) -> Result<()> {
    let json = serde_json::to_string_pretty(model)?;
    fs::write(path, json).with_context(|| format!("Cannot write model {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use twodo_model::{Document, Group, Item};

    #[test]
    fn test_model_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outline.json");
        let model = CanonicalModel::with_documents(vec![Document::new("page-1")
            .with_group(Group::with_items("g-1", vec![Item::with_text("item-1", "Item 1")]))]);

        save_model(&path, &model).unwrap();
        assert_eq!(load_model(&path).unwrap(), model);
    }

    #[test]
    fn test_resolve_relative_to_cwd() {
        let cwd = Path::new("/work");
        assert_eq!(resolve(cwd, Path::new("a.json")), PathBuf::from("/work/a.json"));
        assert_eq!(resolve(cwd, Path::new("/tmp/a.json")), PathBuf::from("/tmp/a.json"));
    }
}
