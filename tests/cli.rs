use assert_cmd::Command;
use std::fs;
use std::path::Path;

use slug_migrate::escape::escape_legacy;
use slug_migrate::migrate::OLD_HOME;
use slug_migrate::slug::SlugRules;

fn bin() -> Command {
    Command::cargo_bin("slug-migrate").unwrap()
}

fn stdout_of(cmd: &mut Command) -> String {
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).unwrap()
}

// {base}/biology-filestore/biology/prod with one legacy, one current and one shared entry
fn layout(base: &Path) -> std::path::PathBuf {
    let prod = base.join("biology-filestore/biology/prod");
    fs::create_dir_all(prod.join(escape_legacy("John Doe"))).unwrap();
    fs::create_dir_all(prod.join("j-o-h-n")).unwrap();
    fs::create_dir_all(prod.join("_shared")).unwrap();
    prod
}

#[test]
fn dry_run_reports_without_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let prod = layout(tmp.path());
    let legacy = escape_legacy("John Doe");

    let out = stdout_of(bin().arg("--base_dir").arg(tmp.path()));
    assert!(out.contains("Found 'prod' directories:"), "{out}");
    assert!(out.contains("Dry run. No change is made."), "{out}");
    assert!(out.contains("username is 'John Doe'"), "{out}");
    assert!(out.contains("is using the new naming scheme"), "{out}");
    assert!(!out.contains("_shared"), "{out}");
    assert!(prod.join(&legacy).is_dir());
}

#[test]
fn force_renames_legacy_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let prod = layout(tmp.path());
    let slug = SlugRules::default().derive("John Doe");

    let out = stdout_of(bin().arg("--base_dir").arg(tmp.path()).arg("--force").arg("--yes"));
    assert!(out.contains("Successfully renamed"), "{out}");
    assert!(prod.join(&slug).is_dir());
    assert!(!prod.join(escape_legacy("John Doe")).exists());
    assert!(prod.join("j-o-h-n").is_dir());
    assert!(prod.join("_shared").is_dir());
}

#[test]
fn force_merges_into_existing_target() {
    let tmp = tempfile::tempdir().unwrap();
    let prod = layout(tmp.path());
    let slug = SlugRules::default().derive("John Doe");
    fs::create_dir(prod.join(&slug)).unwrap();
    fs::write(prod.join(escape_legacy("John Doe")).join("keep.txt"), "keep").unwrap();

    let out = stdout_of(bin().arg("--prod_dir").arg(&prod).arg("--force").arg("--yes"));
    assert!(out.contains("already exists"), "{out}");
    assert_eq!(fs::read_to_string(prod.join(&slug).join(OLD_HOME).join("keep.txt")).unwrap(), "keep");
}

#[test]
fn missing_base_dir_is_not_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let out = stdout_of(bin().arg("--base_dir").arg(tmp.path().join("nowhere")));
    assert!(out.contains("No 'prod' directories found."), "{out}");
}

#[test]
fn too_small_max_length_fails_before_touching_anything() {
    let tmp = tempfile::tempdir().unwrap();
    let prod = layout(tmp.path());
    bin()
        .arg("--base_dir").arg(tmp.path())
        .arg("--force")
        .arg("--max_length").arg("8")
        .assert()
        .failure();
    assert!(prod.join(escape_legacy("John Doe")).is_dir());
}

#[test]
fn config_file_supplies_settings() {
    let tmp = tempfile::tempdir().unwrap();
    let prod = layout(tmp.path());
    let cfg = tmp.path().join("migrate.json");
    fs::write(&cfg, format!(r#"{{ "prod_dirs": [{:?}], "exclude_dir_lists": ["j-o-h-n"] }}"#, prod.to_string_lossy())).unwrap();

    let out = stdout_of(bin().arg("--config").arg(&cfg));
    assert!(out.contains("_shared"), "{out}");
    assert!(!out.contains("'j-o-h-n'"), "{out}");
}

#[test]
fn config_file_cannot_turn_on_force() {
    let tmp = tempfile::tempdir().unwrap();
    let prod = layout(tmp.path());
    let cfg = tmp.path().join("migrate.json");
    fs::write(&cfg, format!(r#"{{ "prod_dirs": [{:?}], "force": true }}"#, prod.to_string_lossy())).unwrap();

    bin().arg("--config").arg(&cfg).assert().failure();
    assert!(prod.join(escape_legacy("John Doe")).is_dir());
    assert!(!prod.join(SlugRules::default().derive("John Doe")).exists());
}

#[test]
fn base_dir_that_is_a_file_is_not_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("export");
    fs::write(&file, "not a directory").unwrap();
    let out = stdout_of(bin().arg("--base_dir").arg(&file));
    assert!(out.contains("No 'prod' directories found."), "{out}");
}
