//! Tests for polling, filtering and path resolution

use ext_reload::extension::{
    ChangeSet, ExtensionId, ExtensionResolver, PathFilter, Poller, Snapshot, SnapshotBuilder,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn touch(path: &Path, secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

fn relative(root: &Path, paths: &BTreeSet<PathBuf>) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect()
}

fn poller(dir: &TempDir) -> Poller {
    Poller::new(vec![dir.path().to_path_buf()], Duration::from_millis(10))
}

#[test]
fn test_forbidden_entries_never_reach_the_snapshot() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("greet.ext"), "");
    write(&root.join("greet.pyc"), "");
    write(&root.join("debug.log"), "");
    write(&root.join("greet.ext.swp"), "");
    write(&root.join("greet.ext~"), "");
    write(&root.join("__pycache__/greet.ext"), "");
    write(&root.join(".git/HEAD"), "");
    write(&root.join("pkg/__boot.ext"), "");
    write(&root.join("pkg/.cache/blob.ext"), "");
    write(&root.join("pkg/build-0a1b2c3d4e/out.ext"), "");

    let snapshot = SnapshotBuilder::default().build(&[root.to_path_buf()]);
    let mut paths: Vec<String> = snapshot
        .paths()
        .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    paths.sort();

    assert_eq!(paths, vec!["greet.ext", "pkg/__boot.ext"]);
}

#[test]
fn test_custom_filter_rules() {
    let filter = PathFilter::new()
        .with_forbidden_suffix(".orig")
        .with_forbidden_name("node_modules")
        .without_hash_check();

    assert!(!filter.accept(Path::new("greet.ext.orig")));
    assert!(!filter.accept(Path::new("pkg/node_modules/x.ext")));
    assert!(filter.accept(Path::new("pkg/deadbeef01/x.ext")));
    assert!(filter.accept(Path::new("pkg/__boot.ext")));
}

#[test]
fn test_first_tick_without_changes_is_empty() {
    let dir = TempDir::new().unwrap();
    write(&dir.path().join("greet.ext"), "");

    let mut poller = poller(&dir);
    assert_eq!(poller.snapshot().len(), 1);
    assert!(poller.tick().is_none());
    assert!(poller.tick().is_none());
}

#[test]
fn test_change_set_partitions_changes() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("keep.ext"), "");
    write(&root.join("edit.ext"), "");
    write(&root.join("drop.ext"), "");

    let mut poller = poller(&dir);

    write(&root.join("new.ext"), "");
    touch(&root.join("edit.ext"), 1_000_000);
    fs::remove_file(root.join("drop.ext")).unwrap();

    let changes = poller.tick().unwrap();
    assert_eq!(relative(root, &changes.created), vec!["new.ext"]);
    assert_eq!(relative(root, &changes.updated), vec!["edit.ext"]);
    assert_eq!(relative(root, &changes.deleted), vec!["drop.ext"]);
    assert!(changes.created.is_disjoint(&changes.updated));
    assert!(changes.created.is_disjoint(&changes.deleted));
    assert!(changes.updated.is_disjoint(&changes.deleted));

    // state advanced: the same changes are not reported twice
    assert!(poller.tick().is_none());
}

#[test]
fn test_backdated_mtime_counts_as_update() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("greet.ext");
    write(&path, "");
    touch(&path, 2_000_000);

    let mut poller = poller(&dir);
    touch(&path, 1_000_000);

    let changes = poller.tick().unwrap();
    assert_eq!(changes.updated.len(), 1);
    assert_eq!(changes.len(), 1);
}

#[test]
fn test_missing_root_then_created() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("exts");
    let mut poller = Poller::new(vec![root.clone()], Duration::from_millis(10));
    assert!(poller.snapshot().is_empty());
    assert!(poller.tick().is_none());

    write(&root.join("greet.ext"), "");
    let changes = poller.tick().unwrap();
    assert_eq!(relative(&root, &changes.created), vec!["greet.ext"]);

    fs::remove_dir_all(&root).unwrap();
    let changes = poller.tick().unwrap();
    assert_eq!(relative(&root, &changes.deleted), vec!["greet.ext"]);
}

#[test]
fn test_change_set_between_snapshots() {
    let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
    let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(20);
    let old: Snapshot = [
        (PathBuf::from("exts/a.ext"), t0),
        (PathBuf::from("exts/b.ext"), t0),
    ]
    .into_iter()
    .collect();
    let new: Snapshot = [
        (PathBuf::from("exts/b.ext"), t1),
        (PathBuf::from("exts/c.ext"), t0),
    ]
    .into_iter()
    .collect();

    let changes = ChangeSet::between(&old, &new).unwrap();
    assert_eq!(changes.created, BTreeSet::from([PathBuf::from("exts/c.ext")]));
    assert_eq!(changes.deleted, BTreeSet::from([PathBuf::from("exts/a.ext")]));
    assert_eq!(changes.updated, BTreeSet::from([PathBuf::from("exts/b.ext")]));
    assert!(ChangeSet::between(&new, &new).is_none());
}

#[test]
fn test_boundary_and_subfile_resolve_to_same_id() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("greet.ext"), "");
    write(&root.join("pkg/__boot.ext"), "");
    write(&root.join("pkg/helper.ext"), "");
    write(&root.join("pkg/db/models/user.ext"), "");

    let resolver = ExtensionResolver::new(vec![root.to_path_buf()]);
    let snapshot = SnapshotBuilder::default().build(&[root.to_path_buf()]);

    let mut owners = BTreeSet::new();
    for path in snapshot.paths() {
        let resolved = resolver.resolve_extension(path, true).unwrap();
        assert_eq!(
            resolver.resolve(&resolved.boundary, false),
            Some(resolved.id.clone()),
            "{path:?}"
        );
        owners.insert(resolved.id);
    }

    assert_eq!(
        owners,
        BTreeSet::from([ExtensionId::from("greet"), ExtensionId::from("pkg")])
    );
}

#[test]
fn test_subfiles_stay_inside_their_boundary() {
    let resolver = ExtensionResolver::new(vec![PathBuf::from("exts")]);

    assert_eq!(resolver.resolve(Path::new("exts/pkg/helper.ext"), false), None);
    assert_eq!(resolver.resolve(Path::new("exts/pkg/a/b/c.ext"), false), None);
    assert!(resolver.is_boundary(Path::new("exts/pkg")));
    assert!(!resolver.is_boundary(Path::new("exts/pkg/helper.ext")));
}
