//! Sandboxed path resolution for server working directories
//!
//! Every filesystem operation the daemon exposes goes through
//! [`resolve_within`] first. Containment is checked component-wise on
//! canonical paths, never by string prefix, so a sibling directory whose
//! name merely starts with the root (`/srv/s1-evil` vs `/srv/s1`) can not
//! slip through.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve `relative` against the canonical `root`, refusing any path that
/// would land outside the root.
///
/// Leading separators and `.` components are dropped; a `..` that would
/// climb above the root is an access violation, not a silent clamp. If the
/// resolved path already exists it is canonicalized and re-checked, which
/// closes the symlink escape hatch.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf> {
    let root = root.canonicalize()?;

    let mut resolved = root.clone();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::ParentDir => {
                if resolved == root {
                    return Err(Error::AccessDenied(relative.to_string()));
                }
                resolved.pop();
            }
            // Leading separators and drive prefixes are treated as
            // relative to the root, matching the request format.
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if resolved.exists() {
        let canonical = resolved.canonicalize()?;
        if canonical != root && !canonical.starts_with(&root) {
            return Err(Error::AccessDenied(relative.to_string()));
        }
        return Ok(canonical);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn root_with_file() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("server");
        fs::create_dir_all(root.join("saves")).unwrap();
        fs::write(root.join("server.cfg"), "port=2456\n").unwrap();
        fs::write(root.join("saves").join("world.db"), b"data").unwrap();
        (dir, root)
    }

    #[test]
    fn test_resolves_inside_root() {
        let (_dir, root) = root_with_file();
        let resolved = resolve_within(&root, "server.cfg").unwrap();
        assert!(resolved.ends_with("server.cfg"));
        assert!(resolved.starts_with(root.canonicalize().unwrap()));
    }

    #[test]
    fn test_empty_path_is_the_root() {
        let (_dir, root) = root_with_file();
        let resolved = resolve_within(&root, "").unwrap();
        assert_eq!(resolved, root.canonicalize().unwrap());
    }

    #[test]
    fn test_parent_escape_is_denied() {
        let (_dir, root) = root_with_file();
        let result = resolve_within(&root, "../../etc/passwd");
        assert!(matches!(result, Err(Error::AccessDenied(_))));
    }

    #[test]
    fn test_nested_parent_escape_is_denied() {
        let (_dir, root) = root_with_file();
        let result = resolve_within(&root, "saves/../../outside");
        assert!(matches!(result, Err(Error::AccessDenied(_))));
    }

    #[test]
    fn test_interior_parent_is_allowed() {
        let (_dir, root) = root_with_file();
        let resolved = resolve_within(&root, "saves/../server.cfg").unwrap();
        assert!(resolved.ends_with("server.cfg"));
    }

    #[test]
    fn test_leading_separators_are_stripped() {
        let (_dir, root) = root_with_file();
        let resolved = resolve_within(&root, "/server.cfg").unwrap();
        assert!(resolved.ends_with("server.cfg"));
    }

    #[test]
    fn test_sibling_prefix_root_is_denied() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("s1");
        let evil = dir.path().join("s1-evil");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&evil).unwrap();
        fs::write(evil.join("loot.txt"), "nope").unwrap();

        let result = resolve_within(&root, "../s1-evil/loot.txt");
        assert!(matches!(result, Err(Error::AccessDenied(_))));
    }

    #[test]
    fn test_nonexistent_target_stays_contained() {
        let (_dir, root) = root_with_file();
        let resolved = resolve_within(&root, "saves/new-world.db").unwrap();
        assert!(resolved.starts_with(root.canonicalize().unwrap()));
        assert!(!resolved.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_denied() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("server");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "hidden").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let result = resolve_within(&root, "link/secret.txt");
        assert!(matches!(result, Err(Error::AccessDenied(_))));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("does-not-exist");
        assert!(resolve_within(&root, "anything").is_err());
    }
}
