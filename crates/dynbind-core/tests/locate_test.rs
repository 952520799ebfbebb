//! Integration test: library location against real directory trees.
//!
//! Validates that:
//! 1. Explicit-path matches precede system-resolved ones and keep
//!    (name, directory, pattern) order.
//! 2. Versioned shared objects follow exact matches, newest first (Unix only).
//! 3. Empty / non-matching directories yield nothing.
//! 4. Listing failures are fatal only where listing happens.
//!
//! Run: cargo test -p dynbind-core --test locate_test

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dynbind_core::locate::{
    Candidate, CandidateSource, LocateError, Locator, NoSystemResolver, StaticResolver,
    find_dylib, find_on_windows_path, find_shared_object,
};
use dynbind_core::{Platform, SearchDirs};

fn unique_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn touch(dir: &Path, relative: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, b"not really a library").unwrap();
    path
}

fn offline(platform: Platform) -> Locator {
    Locator::new(platform).with_resolver(Arc::new(NoSystemResolver))
}

fn paths(found: &[Candidate]) -> Vec<PathBuf> {
    found.iter().map(|c| c.path.clone()).collect()
}

// ---------------------------------------------------------------------------
// 1. Ordering of explicit and system candidates
// ---------------------------------------------------------------------------

#[test]
fn explicit_before_system_in_name_dir_pattern_order() {
    let a = unique_dir("dynbind-order-a");
    let b = unique_dir("dynbind-order-b");
    let a_foo = touch(&a, "libfoo.so");
    let b_foo = touch(&b, "libfoo.so");
    let a_bar = touch(&a, "libbar.so");

    let resolver = StaticResolver::new()
        .with("foo", "libfoo.so.1")
        .with("bar", "libbar.so.2");
    let locator = Locator::new(Platform::Unix).with_resolver(Arc::new(resolver));
    let dirs = SearchDirs::from_dirs(vec![a.clone(), b.clone()]);

    let found = locator.locate(&["foo", "bar"], Some(&dirs)).unwrap();
    assert_eq!(
        paths(&found),
        [
            a_foo,
            b_foo,
            a_bar,
            PathBuf::from("libfoo.so.1"),
            PathBuf::from("libbar.so.2"),
        ]
    );
    assert!(found[..3].iter().all(|c| c.source == CandidateSource::ExplicitPath));
    assert!(found[3..].iter().all(Candidate::is_system_resolved));

    let _ = fs::remove_dir_all(&a);
    let _ = fs::remove_dir_all(&b);
}

#[test]
fn macos_patterns_in_declared_order() {
    let dir = unique_dir("dynbind-macos");
    let framework_versioned = touch(&dir, "foo.framework/Versions/A/foo");
    let framework = touch(&dir, "foo.framework/foo");
    let dylib = touch(&dir, "libfoo.dylib");
    // Never scanned on macOS.
    touch(&dir, "libfoo.so.1");

    let dirs = SearchDirs::from_dirs(vec![dir.clone()]);
    let found = offline(Platform::MacOs).locate(&["foo"], Some(&dirs)).unwrap();
    assert_eq!(paths(&found), [dylib, framework, framework_versioned]);

    let _ = fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// 2. Versioned shared objects
// ---------------------------------------------------------------------------

#[test]
fn versioned_after_exact_newest_first() {
    let dir = unique_dir("dynbind-versioned");
    let exact = touch(&dir, "libfoo.so");
    let old = touch(&dir, "libfoo.so.1.9.0");
    let new = touch(&dir, "libfoo.so.2.0.1");
    touch(&dir, ".libfoo.so.3");
    touch(&dir, "libfoo.so.1.debug");
    touch(&dir, "libunrelated.so.9");

    let dirs = SearchDirs::from_dirs(vec![dir.clone()]);
    let found = offline(Platform::Unix).locate(&["foo"], Some(&dirs)).unwrap();
    assert_eq!(paths(&found), [exact, new, old]);
    assert_eq!(
        found[1].source,
        CandidateSource::Versioned {
            version: vec![2, 0, 1]
        }
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn versioned_numeric_not_lexicographic() {
    let dir = unique_dir("dynbind-numeric");
    let v9 = touch(&dir, "libfoo.so.1.9");
    let v10 = touch(&dir, "libfoo.so.1.10");

    let dirs = SearchDirs::from_dirs(vec![dir.clone()]);
    let found = offline(Platform::Unix).locate(&["foo"], Some(&dirs)).unwrap();
    assert_eq!(paths(&found), [v10, v9]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn versioned_file_matching_two_names_listed_once() {
    let dir = unique_dir("dynbind-dedupe");
    let shared = touch(&dir, "libfoo.so.libfoo.so.4");

    let dirs = SearchDirs::from_dirs(vec![dir.clone()]);
    let found = offline(Platform::Unix)
        .locate(&["foo", "foo"], Some(&dirs))
        .unwrap();
    // The suffix after the first ".so." is not numeric, so nothing at all.
    assert!(!paths(&found).contains(&shared));

    let single = touch(&dir, "libfoo.so.7");
    let found = offline(Platform::Unix)
        .locate(&["foo", "foo"], Some(&dirs))
        .unwrap();
    assert_eq!(paths(&found), [single]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn windows_never_scans_for_versions() {
    let dir = unique_dir("dynbind-windows");
    let dll = touch(&dir, "foo.dll");
    touch(&dir, "libfoo.so.1");

    let dirs = SearchDirs::from_dirs(vec![dir.clone()]);
    let found = offline(Platform::Windows).locate(&["foo"], Some(&dirs)).unwrap();
    assert_eq!(paths(&found), [dll]);

    let _ = fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// 3. Empty results
// ---------------------------------------------------------------------------

#[test]
fn empty_directory_and_no_system_library_is_empty() {
    let dir = unique_dir("dynbind-empty");
    let dirs = SearchDirs::from_dirs(vec![dir.clone()]);
    for platform in [Platform::Unix, Platform::MacOs, Platform::Windows] {
        let found = offline(platform).locate(&["foo"], Some(&dirs)).unwrap();
        assert!(found.is_empty(), "{platform}: {found:?}");
    }
    let found = offline(Platform::Unix).locate(&["foo"], None).unwrap();
    assert!(found.is_empty());

    let _ = fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// 4. Listing failures
// ---------------------------------------------------------------------------

#[test]
fn missing_directory_is_fatal_only_on_unix() {
    let missing = std::env::temp_dir().join("dynbind-definitely-missing-dir");
    let dirs = SearchDirs::from_dirs(vec![missing.clone()]);

    let err = offline(Platform::Unix)
        .locate(&["foo"], Some(&dirs))
        .unwrap_err();
    match err {
        LocateError::UnreadableDirectory { dir, .. } => assert_eq!(dir, missing),
        other => panic!("unexpected error: {other}"),
    }

    assert!(
        offline(Platform::MacOs)
            .locate(&["foo"], Some(&dirs))
            .unwrap()
            .is_empty()
    );
    assert!(
        offline(Platform::Windows)
            .locate(&["foo"], Some(&dirs))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn location_is_deterministic() {
    let dir = unique_dir("dynbind-deterministic");
    for file in ["libfoo.so.1.0", "libfoo.so.1.0.0", "libfoo.so.3", "libfoo.so"] {
        touch(&dir, file);
    }
    let dirs = SearchDirs::from_dirs(vec![dir.clone()]);
    let locator = offline(Platform::Unix);
    let first = locator.locate(&["foo"], Some(&dirs)).unwrap();
    let second = locator.locate(&["foo"], Some(&dirs)).unwrap();
    assert_eq!(first, second);

    let _ = fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// 5. Resolver probing helpers
// ---------------------------------------------------------------------------

#[test]
fn shared_object_scan_prefers_highest_version() {
    let dir = unique_dir("dynbind-scan");
    touch(&dir, "libfoo.so");
    touch(&dir, "libfoo.so.1");
    let best = touch(&dir, "libfoo.so.1.2");

    assert_eq!(find_shared_object(&[dir.clone()], "foo"), Some(best));
    assert_eq!(find_shared_object(&[dir.clone()], "bar"), None);

    let bare_only = unique_dir("dynbind-scan-bare");
    let bare = touch(&bare_only, "libbar.so");
    assert_eq!(
        find_shared_object(&[dir.clone(), bare_only.clone()], "bar"),
        Some(bare)
    );

    let _ = fs::remove_dir_all(&dir);
    let _ = fs::remove_dir_all(&bare_only);
}

#[test]
fn windows_path_walk_adds_dll_suffix() {
    let first = unique_dir("dynbind-path-1");
    let second = unique_dir("dynbind-path-2");
    let dll = touch(&second, "foo.dll");
    let path_var = format!("{};{}", first.display(), second.display());

    assert_eq!(find_on_windows_path(&path_var, "foo"), Some(dll.clone()));
    assert_eq!(find_on_windows_path(&path_var, "foo.dll"), Some(dll));
    assert_eq!(find_on_windows_path(&path_var, "bar"), None);

    let _ = fs::remove_dir_all(&first);
    let _ = fs::remove_dir_all(&second);
}

#[test]
fn dylib_probe_checks_libraries_before_frameworks() {
    let libs = unique_dir("dynbind-dyld-libs");
    let frameworks = unique_dir("dynbind-dyld-frameworks");
    let framework = touch(&frameworks, "foo.framework/foo");

    assert_eq!(
        find_dylib(&[libs.clone()], &[frameworks.clone()], "foo"),
        Some(framework)
    );
    let dylib = touch(&libs, "libfoo.dylib");
    assert_eq!(
        find_dylib(&[libs.clone()], &[frameworks.clone()], "foo"),
        Some(dylib)
    );

    let _ = fs::remove_dir_all(&libs);
    let _ = fs::remove_dir_all(&frameworks);
}
