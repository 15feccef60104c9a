use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn ocsync_bin() -> String {
    env!("CARGO_BIN_EXE_ocsync").to_string()
}

struct Setup {
    _root: TempDir,
    config_path: std::path::PathBuf,
    local: std::path::PathBuf,
    vfs: std::path::PathBuf,
    webapp: std::path::PathBuf,
}

fn setup(sync_mode: &str) -> Setup {
    let root = TempDir::new().unwrap();
    let local = root.path().join("local");
    let vfs = root.path().join("vfs");
    let webapp = root.path().join("webapp");
    fs::create_dir_all(local.join("module")).unwrap();
    fs::create_dir_all(vfs.join("system/modules/com.example.site")).unwrap();
    fs::create_dir_all(&webapp).unwrap();

    let config = format!(
        r#"
webapp_root = "{webapp}"

[server]
vfs_root = "{vfs}"

[[modules]]
name = "com.example.site"
rfs_root = "{module}"
vfs_root = "/system/modules/com.example.site"
sync_mode = "{sync_mode}"
export_points = [
    {{ vfs_source = "/system/modules/com.example.site/resources", rfs_target = "resources/site" }},
]
"#,
        webapp = webapp.display(),
        vfs = vfs.display(),
        module = local.join("module").display(),
    );
    let config_path = root.path().join("ocsync.toml");
    fs::write(&config_path, config).unwrap();

    Setup {
        config_path,
        local: local.join("module"),
        vfs,
        webapp,
        _root: root,
    }
}

fn run(setup: &Setup, extra_args: &[&str]) -> std::process::Output {
    Command::new(ocsync_bin())
        .arg("--config")
        .arg(&setup.config_path)
        .args(extra_args)
        .output()
        .unwrap()
}

fn remote(setup: &Setup, rel: &str) -> std::path::PathBuf {
    setup.vfs.join("system/modules/com.example.site").join(rel)
}

#[test]
fn test_basic_push() {
    let s = setup("sync");
    fs::write(s.local.join("index.html"), "<html/>").unwrap();
    fs::create_dir(s.local.join("pages")).unwrap();
    fs::write(s.local.join("pages/about.html"), "about").unwrap();

    let output = run(&s, &[]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(fs::read_to_string(remote(&s, "index.html")).unwrap(), "<html/>");
    assert_eq!(fs::read_to_string(remote(&s, "pages/about.html")).unwrap(), "about");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PUSH /system/modules/com.example.site/index.html (new)"));
    assert!(stdout.contains("---- Sync finished ----"));
}

#[test]
fn test_second_run_is_idempotent() {
    let s = setup("sync");
    fs::write(s.local.join("index.html"), "<html/>").unwrap();

    let first = run(&s, &[]);
    assert!(first.status.success());

    let second = run(&s, &[]);
    assert!(second.status.success());
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(!stdout.contains("PUSH"), "second run re-pushed: {}", stdout);
}

#[test]
fn test_dry_run_makes_no_changes() {
    let s = setup("sync");
    fs::write(s.local.join("index.html"), "<html/>").unwrap();

    let output = run(&s, &["--dry-run"]);
    assert!(output.status.success());
    assert!(!remote(&s, "index.html").exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Dry-run"));
}

#[test]
fn test_pull_mode_deletes_local_only_files() {
    let s = setup("pull");
    fs::write(s.local.join("mine.txt"), "local only").unwrap();
    fs::write(remote_parent(&s).join("theirs.txt"), "remote only").unwrap();

    let output = run(&s, &[]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert!(!s.local.join("mine.txt").exists());
    assert_eq!(fs::read_to_string(s.local.join("theirs.txt")).unwrap(), "remote only");
}

fn remote_parent(setup: &Setup) -> std::path::PathBuf {
    setup.vfs.join("system/modules/com.example.site")
}

#[test]
fn test_push_mode_deletes_remote_only_resources() {
    let s = setup("push");
    fs::create_dir(remote_parent(&s).join("stale")).unwrap();
    fs::write(remote_parent(&s).join("stale/old.txt"), "x").unwrap();

    let output = run(&s, &[]);
    assert!(output.status.success());
    assert!(!remote_parent(&s).join("stale").exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DELETE_VFS /system/modules/com.example.site/stale (obsolete)"));
}

#[test]
fn test_export_point_mirrored_on_push() {
    let s = setup("sync");
    fs::create_dir(s.local.join("resources")).unwrap();
    fs::write(s.local.join("resources/img.png"), "png bytes").unwrap();

    let output = run(&s, &[]);
    assert!(output.status.success());

    let mirrored = s.webapp.join("resources/site/img.png");
    assert_eq!(fs::read_to_string(mirrored).unwrap(), "png bytes");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("---- Copying of ExportPoints finished ----"));
}

#[test]
fn test_vcs_directories_are_ignored() {
    let s = setup("sync");
    fs::create_dir(s.local.join(".git")).unwrap();
    fs::write(s.local.join(".git/HEAD"), "ref").unwrap();
    fs::write(s.local.join("real.txt"), "x").unwrap();

    let output = run(&s, &[]);
    assert!(output.status.success());
    assert!(remote(&s, "real.txt").exists());
    assert!(!remote(&s, ".git").exists());
}

#[test]
fn test_json_mode_emits_ndjson() {
    let s = setup("sync");
    fs::write(s.local.join("index.html"), "<html/>").unwrap();

    let output = run(&s, &["--json"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut saw_push = false;
    let mut saw_summary = false;
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        match value["type"].as_str() {
            Some("push") => saw_push = true,
            Some("summary") => saw_summary = true,
            _ => {}
        }
    }
    assert!(saw_push && saw_summary, "events: {}", stdout);
}

#[test]
fn test_list_modules() {
    let s = setup("sync");
    let output = run(&s, &["--list-modules"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("com.example.site"));
}

#[test]
fn test_unknown_module_is_an_error() {
    let s = setup("sync");
    let output = run(&s, &["does.not.exist"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does.not.exist"));
}

#[test]
fn test_pull_flag_fetches_remote_only_subtree() {
    let s = setup("sync");
    fs::create_dir(remote_parent(&s).join("fresh")).unwrap();
    fs::write(remote_parent(&s).join("fresh/f.txt"), "new content").unwrap();
    // Restrict the run to the --pull start point by leaving the local
    // tree empty; the module root sync pulls nothing else.
    let output = run(&s, &["--pull", "/system/modules/com.example.site/fresh"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(
        fs::read_to_string(s.local.join("fresh/f.txt")).unwrap(),
        "new content"
    );
}

#[test]
fn test_type_mismatch_is_warned_and_skipped() {
    let s = setup("sync");
    // A local file colliding with a remote folder of the same name is
    // skipped with a warning instead of failing the run.
    fs::write(s.local.join("thing.txt"), "x").unwrap();
    fs::create_dir(remote_parent(&s).join("thing.txt")).unwrap();

    let output = run(&s, &[]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("thing.txt"));
    assert!(remote_parent(&s).join("thing.txt").is_dir());
}
