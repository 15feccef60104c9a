//! Helpers for absolute, `/`-separated VFS paths.
//!
//! VFS paths are plain strings: always absolute, no trailing slash
//! (except the root itself), no empty segments. Everything that touches
//! a VFS path goes through `normalize` first so path identity checks
//! (visited sets, SyncList dedup, export-point prefixes) compare equal
//! strings.

use std::path::Path;

/// Normalize a VFS path: leading `/`, single separators, no trailing
/// slash. `""` and `"/"` both normalize to `"/"`.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Join a child name onto a normalized base path.
pub fn join(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Last path segment, `""` for the root.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Path relative to `prefix`, without a leading slash. Returns `None`
/// when `path` is not inside `prefix`. Matching is segment-aware:
/// `/a/bc` is not inside `/a/b`.
pub fn relative_to<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(path.trim_start_matches('/'));
    }
    let rest = path.strip_prefix(prefix)?;
    match rest.strip_prefix('/') {
        Some(rel) => Some(rel),
        None if rest.is_empty() => Some(""),
        None => None,
    }
}

/// Map a filesystem path below `rfs_root` onto the VFS below `vfs_root`.
/// Returns `None` when `rfs_path` is not below the root or a component
/// is not valid UTF-8.
pub fn rfs_to_vfs(vfs_root: &str, rfs_root: &Path, rfs_path: &Path) -> Option<String> {
    let rel = rfs_path.strip_prefix(rfs_root).ok()?;
    let mut vfs = normalize(vfs_root);
    for component in rel.components() {
        let name = component.as_os_str().to_str()?;
        vfs = join(&vfs, name);
    }
    Some(vfs)
}

/// Map a VFS path below `vfs_root` onto the filesystem below `rfs_root`.
pub fn vfs_to_rfs(rfs_root: &Path, vfs_root: &str, vfs: &str) -> Option<std::path::PathBuf> {
    let rel = relative_to(vfs, vfs_root)?;
    let mut rfs = rfs_root.to_path_buf();
    for segment in rel.split('/').filter(|s| !s.is_empty()) {
        rfs.push(segment);
    }
    Some(rfs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/b/c"), "/a/b/c");
        assert_eq!(normalize("a/b"), "/a/b");
        assert_eq!(normalize("/a//b/"), "/a/b");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/./a"), "/a");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/a/b/c.txt"), "c.txt");
        assert_eq!(file_name("/a"), "a");
        assert_eq!(file_name("/"), "");
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("/a/b/c", "/a/b"), Some("c"));
        assert_eq!(relative_to("/a/b", "/a/b"), Some(""));
        assert_eq!(relative_to("/a/b/c", "/a/b/"), Some("c"));
        assert_eq!(relative_to("/a/bc", "/a/b"), None);
        assert_eq!(relative_to("/x/y", "/a"), None);
        assert_eq!(relative_to("/a/b", "/"), Some("a/b"));
    }

    #[test]
    fn test_rfs_to_vfs() {
        let root = PathBuf::from("/home/dev/module");
        let file = root.join("resources").join("img.png");
        assert_eq!(
            rfs_to_vfs("/system/modules/m", &root, &file),
            Some("/system/modules/m/resources/img.png".to_string())
        );
        assert_eq!(rfs_to_vfs("/system/modules/m", &root, &root), Some("/system/modules/m".to_string()));
        assert_eq!(rfs_to_vfs("/m", &root, Path::new("/elsewhere/f")), None);
    }

    #[test]
    fn test_vfs_to_rfs() {
        let root = PathBuf::from("/home/dev/module");
        assert_eq!(
            vfs_to_rfs(&root, "/system/modules/m", "/system/modules/m/resources/img.png"),
            Some(root.join("resources").join("img.png"))
        );
        assert_eq!(vfs_to_rfs(&root, "/system/modules/m", "/system/modules/m"), Some(root));
        assert_eq!(vfs_to_rfs(Path::new("/r"), "/system/modules/m", "/other"), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_is_idempotent(s in "[a-z/._-]{0,40}") {
                let once = normalize(&s);
                prop_assert_eq!(normalize(&once), once.clone());
                prop_assert!(once.starts_with('/'));
                prop_assert!(once == "/" || !once.ends_with('/'));
            }

            #[test]
            fn join_then_relative_roundtrips(base in "(/[a-z]{1,8}){1,4}", name in "[a-z]{1,8}") {
                let joined = join(&base, &name);
                prop_assert_eq!(relative_to(&joined, &base), Some(name.as_str()));
            }
        }
    }
}
