// src/fs/paths.rs

use std::path::{Component, Path, PathBuf};

/// `path` relative to `root` as a `/`-separated string, the form glob
/// patterns are matched against.
///
/// `.` components are ignored on both sides. If the plain prefix check
/// fails (symlinked temp dirs on macOS, for instance) both paths are
/// canonicalized and compared again. `None` if `path` is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = without_cur_dir(path).strip_prefix(without_cur_dir(root)) {
        return Some(to_slash(rel));
    }

    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&root).ok().map(to_slash)
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
