//! Sole writer of the process library search path.
//!
//! On Windows a DLL that links against siblings in its own directory only
//! finds them if that directory is on `PATH`. After loading from a search
//! directory the binder prepends it here. Every write in this crate goes
//! through [`prepend_to_var`], which holds one process-wide lock across the
//! read, the membership check, and the write.

use std::path::Path;

use dynbind_core::Platform;
use parking_lot::Mutex;

static SEARCH_PATH_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Variable the Windows loader consults for dependent DLLs.
pub const LIBRARY_SEARCH_VAR: &str = "PATH";

/// Prepend `dir` to the list in `var` unless it is already listed, using
/// `platform`'s separator and comparison rules. Returns `true` when the
/// variable changed.
pub fn prepend_to_var(var: &str, dir: &Path, platform: Platform) -> bool {
    let _guard = SEARCH_PATH_LOCK.lock();

    let entry = dir.to_string_lossy();
    let current = std::env::var_os(var)
        .map(|v| v.to_string_lossy().into_owned())
        .unwrap_or_default();
    if is_listed(&current, &entry, platform) {
        return false;
    }

    let separator = platform.path_separator();
    let updated = if current.is_empty() {
        entry.into_owned()
    } else {
        format!("{entry}{separator}{current}")
    };
    // SAFETY: every environment write made by this crate holds
    // SEARCH_PATH_LOCK. Readers in other threads see either value.
    unsafe { std::env::set_var(var, updated) };
    true
}

/// Whether `dir` already appears in the separator-joined `list`.
/// Windows compares case-insensitively and ignores trailing slashes.
fn is_listed(list: &str, dir: &str, platform: Platform) -> bool {
    let trim = |s: &str| s.trim_end_matches(['/', '\\']).to_string();
    let wanted = trim(dir);
    list.split(platform.path_separator())
        .filter(|entry| !entry.is_empty())
        .any(|entry| {
            let entry = trim(entry);
            match platform {
                Platform::Windows => entry.eq_ignore_ascii_case(&wanted),
                _ => entry == wanted,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_var(tag: &str) -> String {
        format!("DYNBIND_TEST_SEARCH_{tag}_{}", std::process::id())
    }

    #[test]
    fn test_is_listed_rules() {
        assert!(is_listed("C:\\SDL;C:\\Windows", "c:\\sdl\\", Platform::Windows));
        assert!(!is_listed("/opt/sdl:/usr/lib", "/opt/SDL", Platform::Unix));
        assert!(is_listed("/opt/sdl:/usr/lib", "/opt/sdl/", Platform::Unix));
        assert!(!is_listed("", "/opt/sdl", Platform::Unix));
    }

    #[test]
    fn test_prepend_is_idempotent() {
        let var = unique_var("IDEMPOTENT");
        let dir = Path::new("/opt/dynbind/lib");

        assert!(prepend_to_var(&var, dir, Platform::Unix));
        assert_eq!(std::env::var(&var).unwrap(), "/opt/dynbind/lib");
        assert!(!prepend_to_var(&var, dir, Platform::Unix));
        assert_eq!(std::env::var(&var).unwrap(), "/opt/dynbind/lib");
    }

    #[test]
    fn test_prepend_goes_first() {
        let var = unique_var("ORDER");
        assert!(prepend_to_var(&var, Path::new("C:\\second"), Platform::Windows));
        assert!(prepend_to_var(&var, Path::new("C:\\first"), Platform::Windows));
        assert!(!prepend_to_var(&var, Path::new("c:\\SECOND"), Platform::Windows));
        assert_eq!(std::env::var(&var).unwrap(), "C:\\first;C:\\second");
    }

    #[test]
    fn test_concurrent_prepends_list_each_dir_once() {
        let var = unique_var("CONCURRENT");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let var = var.clone();
                std::thread::spawn(move || {
                    let dir = format!("/opt/lib{}", i % 2);
                    prepend_to_var(&var, Path::new(&dir), Platform::Unix)
                })
            })
            .collect();
        let changed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|c| *c)
            .count();
        assert_eq!(changed, 2);

        let value = std::env::var(&var).unwrap();
        let mut entries: Vec<&str> = value.split(':').collect();
        entries.sort_unstable();
        assert_eq!(entries, ["/opt/lib0", "/opt/lib1"]);
    }
}
