//! Platform naming conventions for shared libraries.
//!
//! Every rule that differs between Windows, macOS and the other Unix-likes
//! is answered here, keyed on a [`Platform`] value rather than on `cfg!`, so
//! the locator can be exercised for any platform from any host.

use serde::{Deserialize, Serialize};

/// Host family as far as library naming is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// `{name}.dll`, `;`-separated search lists, DLL search path quirk.
    Windows,
    /// `.dylib` files and `.framework` bundles.
    MacOs,
    /// Linux, the BSDs and everything else with `lib{name}.so`.
    Unix,
}

impl Platform {
    /// The platform this crate was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Unix
        }
    }

    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win32" | "win" | "nt" => Some(Self::Windows),
            "macos" | "darwin" | "osx" | "mac" => Some(Self::MacOs),
            "unix" | "linux" | "bsd" | "posix" => Some(Self::Unix),
            _ => None,
        }
    }

    /// Separator used when several directories share one configuration value.
    #[must_use]
    pub const fn path_separator(self) -> char {
        match self {
            Self::Windows => ';',
            Self::MacOs | Self::Unix => ':',
        }
    }

    /// Candidate filenames for `name`, relative to a search directory, in
    /// preference order.
    #[must_use]
    pub fn filename_patterns(self, name: &str) -> Vec<String> {
        match self {
            Self::Windows => vec![format!("{name}.dll")],
            Self::MacOs => vec![
                format!("lib{name}.dylib"),
                format!("{name}.framework/{name}"),
                format!("{name}.framework/Versions/A/{name}"),
            ],
            Self::Unix => vec![format!("lib{name}.so")],
        }
    }

    /// The unversioned shared-object name whose versioned siblings
    /// (`lib{name}.so.2.0.10`) are picked up by the directory scan.
    ///
    /// `None` on platforms that never scan for versioned files.
    #[must_use]
    pub fn unversioned_filename(self, name: &str) -> Option<String> {
        self.scans_versioned().then(|| format!("lib{name}.so"))
    }

    /// Whether search directories are listed for versioned shared objects.
    #[must_use]
    pub const fn scans_versioned(self) -> bool {
        matches!(self, Self::Unix)
    }

    /// Whether a directory that supplied the loaded library must be added to
    /// the process library search path so its dependencies resolve too.
    #[must_use]
    pub const fn mutates_dll_search_path(self) -> bool {
        matches!(self, Self::Windows)
    }

    /// Whether a system-resolved token must be prefixed with `./` before it is
    /// handed to the loader.
    ///
    /// A bare `SDL2.dll` would otherwise be looked up through the loader's own
    /// search order instead of the location the resolver found.
    #[must_use]
    pub fn needs_relative_marker(self, token: &str) -> bool {
        matches!(self, Self::Windows) && !token.contains(['/', '\\'])
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Unix => "unix",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_patterns() {
        assert_eq!(Platform::Windows.filename_patterns("SDL2"), ["SDL2.dll"]);
        assert_eq!(
            Platform::MacOs.filename_patterns("SDL2"),
            [
                "libSDL2.dylib",
                "SDL2.framework/SDL2",
                "SDL2.framework/Versions/A/SDL2"
            ]
        );
        assert_eq!(Platform::Unix.filename_patterns("SDL2"), ["libSDL2.so"]);
    }

    #[test]
    fn test_versioned_scan_is_unix_only() {
        assert_eq!(
            Platform::Unix.unversioned_filename("foo").as_deref(),
            Some("libfoo.so")
        );
        assert_eq!(Platform::MacOs.unversioned_filename("foo"), None);
        assert_eq!(Platform::Windows.unversioned_filename("foo"), None);
    }

    #[test]
    fn test_relative_marker() {
        assert!(Platform::Windows.needs_relative_marker("SDL2.dll"));
        assert!(!Platform::Windows.needs_relative_marker(r"C:\libs\SDL2.dll"));
        assert!(!Platform::Windows.needs_relative_marker("libs/SDL2.dll"));
        assert!(!Platform::Unix.needs_relative_marker("libSDL2-2.0.so.0"));
    }

    #[test]
    fn test_from_str_loose() {
        assert_eq!(Platform::from_str_loose("Win32"), Some(Platform::Windows));
        assert_eq!(Platform::from_str_loose("darwin"), Some(Platform::MacOs));
        assert_eq!(Platform::from_str_loose("LINUX"), Some(Platform::Unix));
        assert_eq!(Platform::from_str_loose("plan9"), None);
    }

    #[test]
    fn test_current_matches_target() {
        let current = Platform::current();
        #[cfg(windows)]
        assert_eq!(current, Platform::Windows);
        #[cfg(target_os = "macos")]
        assert_eq!(current, Platform::MacOs);
        #[cfg(all(unix, not(target_os = "macos")))]
        assert_eq!(current, Platform::Unix);
        let _ = current;
    }
}
