/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/sandbox.rs
 * Responsibility: Working directory root and path containment.
 */

use crate::error::{Action, EntryKind, ToolError};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Mirrors the kernel's SYMLOOP_MAX.
const MAX_SYMLINK_HOPS: usize = 40;

/// The sandbox root. Canonical, and known to have been a directory when the
/// session was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    root: PathBuf,
}

impl WorkingDirectory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ToolError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let root = fs::canonicalize(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ToolError::NotFound { path: display.clone() },
            _ => ToolError::io(format!("Failed to resolve working directory \"{}\"", display), e),
        })?;

        if !root.is_dir() {
            return Err(ToolError::WrongKind {
                path: display,
                expected: EntryKind::Directory,
            });
        }

        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

impl AsRef<Path> for WorkingDirectory {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}

/// Whether the resolved target has to exist already.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Required,
    Optional,
}

/// Resolve `candidate` under `root` and make sure it stays there.
///
/// The candidate is always relative: a leading separator does not escape the
/// root, it is simply dropped. Symlinks are followed and `..` collapsed
/// component by component, so paths that do not exist yet resolve too.
/// Containment is checked before existence, so nothing about the layout
/// outside the root leaks through a `NotFound`. A root that has been removed
/// since the session opened is `NotFound` for every mode, so writes never
/// recreate it.
pub fn resolve(
    root: &WorkingDirectory,
    candidate: &str,
    action: Action,
    existence: Existence,
) -> Result<PathBuf, ToolError> {
    if !root.path().is_dir() {
        return Err(ToolError::NotFound {
            path: root.path().display().to_string(),
        });
    }

    let mut joined = root.path().to_path_buf();
    for component in Path::new(candidate).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {}
            other => joined.push(other.as_os_str()),
        }
    }

    let resolved = resolve_components(&joined, 0)
        .map_err(|e| ToolError::io(format!("Failed to resolve \"{}\"", candidate), e))?;

    if !resolved.starts_with(root.path()) {
        return Err(ToolError::OutsideSandbox {
            action,
            path: candidate.to_string(),
        });
    }

    if existence == Existence::Required && !resolved.exists() {
        return Err(ToolError::NotFound {
            path: candidate.to_string(),
        });
    }

    Ok(resolved)
}

fn resolve_components(path: &Path, hops: usize) -> io::Result<PathBuf> {
    if hops > MAX_SYMLINK_HOPS {
        return Err(io::Error::other("too many levels of symbolic links"));
    }

    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let next = resolved.join(name);
                match fs::symlink_metadata(&next) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        // An absolute link target replaces `resolved` on join.
                        let target = resolved.join(fs::read_link(&next)?);
                        resolved = resolve_components(&target, hops + 1)?;
                    }
                    _ => resolved = next,
                }
            }
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn open(dir: &Path) -> WorkingDirectory {
        WorkingDirectory::open(dir).unwrap()
    }

    #[test]
    fn test_open_rejects_missing_and_file_roots() {
        let dir = tempdir().unwrap();
        let missing = WorkingDirectory::open(dir.path().join("nope")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let wrong = WorkingDirectory::open(&file).unwrap_err();
        assert_eq!(wrong.kind(), ErrorKind::WrongKind);
    }

    #[test]
    fn test_resolve_root_and_descendants() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("a.txt"), "hello").unwrap();
        let wd = open(dir.path());

        let root = resolve(&wd, ".", Action::List, Existence::Required).unwrap();
        assert_eq!(root, wd.path());

        let nested = resolve(&wd, "sub/./a.txt", Action::Read, Existence::Required).unwrap();
        assert_eq!(nested, wd.path().join("sub").join("a.txt"));

        let back_in = resolve(&wd, "sub/../sub/a.txt", Action::Read, Existence::Required).unwrap();
        assert_eq!(back_in, nested);
    }

    #[test]
    fn test_resolve_rejects_parent_escape_with_original_path() {
        let dir = tempdir().unwrap();
        let wd = open(dir.path());

        let err = resolve(&wd, "../etc/passwd", Action::Read, Existence::Required).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutsideSandbox);
        assert!(err.to_string().contains("\"../etc/passwd\""));
        assert!(!err.to_string().contains(&wd.path().display().to_string()));
    }

    #[test]
    fn test_leading_separator_stays_inside_root() {
        let dir = tempdir().unwrap();
        let wd = open(dir.path());

        let resolved = resolve(&wd, "/etc/passwd", Action::Write, Existence::Optional).unwrap();
        assert_eq!(resolved, wd.path().join("etc").join("passwd"));
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_not_contained() {
        let parent = tempdir().unwrap();
        let root = parent.path().join("working-dir");
        let evil = parent.path().join("working-dir-evil");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&evil).unwrap();
        fs::write(evil.join("secret.txt"), "secret").unwrap();
        let wd = open(&root);

        let err = resolve(
            &wd,
            "../working-dir-evil/secret.txt",
            Action::Read,
            Existence::Required,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutsideSandbox);
    }

    #[test]
    fn test_missing_target_is_outside_before_not_found() {
        let dir = tempdir().unwrap();
        let wd = open(dir.path());

        let outside = resolve(&wd, "../does-not-exist", Action::Read, Existence::Required).unwrap_err();
        assert_eq!(outside.kind(), ErrorKind::OutsideSandbox);

        let inside = resolve(&wd, "does-not-exist", Action::Read, Existence::Required).unwrap_err();
        assert_eq!(inside.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_optional_resolves_paths_that_do_not_exist_yet() {
        let dir = tempdir().unwrap();
        let wd = open(dir.path());

        let resolved = resolve(&wd, "new/deeper/../file.txt", Action::Write, Existence::Optional).unwrap();
        assert_eq!(resolved, wd.path().join("new").join("file.txt"));
    }

    #[test]
    fn test_removed_root_is_not_found_in_every_mode() {
        let parent = tempdir().unwrap();
        let root = parent.path().join("root");
        fs::create_dir(&root).unwrap();
        let wd = open(&root);
        fs::remove_dir(&root).unwrap();

        for existence in [Existence::Required, Existence::Optional] {
            let err = resolve(&wd, "a.txt", Action::Write, existence).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("outside.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let wd = open(dir.path());

        let err = resolve(&wd, "link/outside.txt", Action::Read, Existence::Required).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutsideSandbox);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_pointing_outside_is_rejected() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("planted.txt"), dir.path().join("drop.txt"))
            .unwrap();
        let wd = open(dir.path());

        let err = resolve(&wd, "drop.txt", Action::Write, Existence::Optional).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutsideSandbox);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_is_followed() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real").join("a.txt"), "a").unwrap();
        std::os::unix::fs::symlink("real", dir.path().join("alias")).unwrap();
        let wd = open(dir.path());

        let resolved = resolve(&wd, "alias/a.txt", Action::Read, Existence::Required).unwrap();
        assert_eq!(resolved, wd.path().join("real").join("a.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_surfaces_io_failure() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink("b", dir.path().join("a")).unwrap();
        std::os::unix::fs::symlink("a", dir.path().join("b")).unwrap();
        let wd = open(dir.path());

        let err = resolve(&wd, "a", Action::Read, Existence::Required).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
