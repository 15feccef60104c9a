use crate::error::{Result, SyncError};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Per-module authority policy applied when both sides hold a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// The local tree is authoritative; remote-only resources are deleted.
    Push,
    /// Newest copy wins, one-sided resources are transferred.
    Sync,
    /// The VFS is authoritative; local-only resources are deleted.
    Pull,
}

/// Declared mapping that mirrors a VFS subtree onto a static-serving
/// directory below the webapp root.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportPoint {
    pub vfs_source: String,
    pub rfs_target: String,
}

/// One CMS module binding: a local root edited by the developer and the
/// VFS root the CMS serves it from.
#[derive(Debug, Clone, Deserialize)]
pub struct CmsModule {
    pub name: String,
    pub rfs_root: PathBuf,
    pub vfs_root: String,
    #[serde(default = "default_sync_mode")]
    pub sync_mode: SyncMode,
    #[serde(default)]
    pub export_points: Vec<ExportPoint>,
}

fn default_sync_mode() -> SyncMode {
    SyncMode::Sync
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Directory served as the VFS by the filesystem adapter. A
    /// wire-protocol adapter would carry endpoint and credentials here
    /// instead.
    pub vfs_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    /// Root the export points are mirrored under. Export mirroring is
    /// disabled when unset.
    pub webapp_root: Option<PathBuf>,
    #[serde(default)]
    pub modules: Vec<CmsModule>,
}

impl Config {
    const CONFIG_FILENAME: &'static str = "ocsync.toml";

    /// Load configuration from an explicit path, else `./ocsync.toml`,
    /// else the user config directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => Self::default_path().ok_or_else(|| {
                SyncError::Config(format!(
                    "No {} found in the current directory or the user config directory",
                    Self::CONFIG_FILENAME
                ))
            })?,
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            SyncError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            SyncError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        tracing::debug!("Loaded config from {} ({} modules)", path.display(), config.modules.len());
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        let cwd = PathBuf::from(Self::CONFIG_FILENAME);
        if cwd.exists() {
            return Some(cwd);
        }
        let user = dirs::config_dir()?.join("ocsync").join(Self::CONFIG_FILENAME);
        user.exists().then_some(user)
    }

    pub fn module(&self, name: &str) -> Option<&CmsModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Module owning a VFS path, matched by the longest vfs_root prefix.
    pub fn module_for_vfs_path(&self, vfs_path: &str) -> Option<&CmsModule> {
        self.modules
            .iter()
            .filter(|m| crate::path::relative_to(vfs_path, &m.vfs_root).is_some())
            .max_by_key(|m| m.vfs_root.len())
    }

    fn validate(&self) -> Result<()> {
        for module in &self.modules {
            if !module.vfs_root.starts_with('/') {
                return Err(SyncError::Config(format!(
                    "Module '{}': vfs_root must be an absolute VFS path, got '{}'",
                    module.name, module.vfs_root
                )));
            }
            for ep in &module.export_points {
                if !ep.vfs_source.starts_with('/') {
                    return Err(SyncError::Config(format!(
                        "Module '{}': export point source must be an absolute VFS path, got '{}'",
                        module.name, ep.vfs_source
                    )));
                }
            }
        }
        let mut names: Vec<&str> = self.modules.iter().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.modules.len() {
            return Err(SyncError::Config("Duplicate module names in config".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
webapp_root = "/srv/webapp"

[server]
vfs_root = "/srv/vfs"

[[modules]]
name = "com.example.site"
rfs_root = "modules/com.example.site"
vfs_root = "/system/modules/com.example.site"
sync_mode = "sync"
export_points = [
    { vfs_source = "/system/modules/com.example.site/resources", rfs_target = "resources/site" },
]

[[modules]]
name = "com.example.blog"
rfs_root = "modules/com.example.blog"
vfs_root = "/system/modules/com.example.blog"
sync_mode = "push"
"#;

    fn parse(content: &str) -> Config {
        let config: Config = toml::from_str(content).unwrap();
        config.validate().unwrap();
        config
    }

    #[test]
    fn test_parse_sample() {
        let config = parse(SAMPLE);
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.webapp_root, Some(PathBuf::from("/srv/webapp")));

        let site = config.module("com.example.site").unwrap();
        assert_eq!(site.sync_mode, SyncMode::Sync);
        assert_eq!(site.export_points.len(), 1);

        let blog = config.module("com.example.blog").unwrap();
        assert_eq!(blog.sync_mode, SyncMode::Push);
        assert!(blog.export_points.is_empty());
    }

    #[test]
    fn test_sync_mode_defaults_to_sync() {
        let config = parse(
            r#"
[server]
vfs_root = "/srv/vfs"

[[modules]]
name = "m"
rfs_root = "m"
vfs_root = "/system/modules/m"
"#,
        );
        assert_eq!(config.modules[0].sync_mode, SyncMode::Sync);
    }

    #[test]
    fn test_module_for_vfs_path_longest_prefix() {
        let config = parse(SAMPLE);
        let m = config
            .module_for_vfs_path("/system/modules/com.example.site/resources/img.png")
            .unwrap();
        assert_eq!(m.name, "com.example.site");
        assert!(config.module_for_vfs_path("/shared/other").is_none());
    }

    #[test]
    fn test_rejects_relative_vfs_root() {
        let config: Config = toml::from_str(
            r#"
[server]
vfs_root = "/srv/vfs"

[[modules]]
name = "m"
rfs_root = "m"
vfs_root = "system/modules/m"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_module_names() {
        let config: Config = toml::from_str(
            r#"
[server]
vfs_root = "/srv/vfs"

[[modules]]
name = "m"
rfs_root = "a"
vfs_root = "/a"

[[modules]]
name = "m"
rfs_root = "b"
vfs_root = "/b"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
