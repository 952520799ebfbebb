//! System library resolvers.
//!
//! The last step of location asks the host for a library the way the OS
//! itself would find it. [`HostResolver`] does that per platform:
//!
//! - Linux: the `ldconfig -p` cache, filtered by the host ABI tag, yielding a
//!   bare soname (`libSDL2-2.0.so.0`) the dynamic linker resolves itself;
//!   otherwise a scan of `LD_LIBRARY_PATH` and the default library dirs.
//! - Other Unix: the directory scan only.
//! - macOS: the dyld fallback paths for dylibs and frameworks.
//! - Windows: `PATH`, the same way `LoadLibrary` users expect.
//!
//! The parsing and probing helpers take their inputs as arguments so they
//! can be tested on any host; only [`HostResolver::resolve`] reads the real
//! environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::so_version;

/// Host-side library lookup by logical name.
pub trait SystemResolver: Send + Sync {
    /// A path or loader token for `name`, or `None` if the host has no such
    /// library.
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Never finds anything. Useful to test the directory steps in isolation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSystemResolver;

impl SystemResolver for NoSystemResolver {
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Fixed name -> token table.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    entries: HashMap<String, String>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, token: &str) -> Self {
        self.entries.insert(name.to_string(), token.to_string());
        self
    }
}

impl SystemResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        self.entries.get(name).cloned()
    }
}

/// The running host's own search mechanism.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostResolver;

impl SystemResolver for HostResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        resolve_on_host(name)
    }
}

#[cfg(target_os = "linux")]
fn resolve_on_host(name: &str) -> Option<String> {
    if let Some(output) = ldconfig_cache() {
        if let Some(soname) = find_in_ldconfig_cache(&output, name, host_abi_tag()) {
            return Some(soname);
        }
    }
    let mut dirs = env_dirs("LD_LIBRARY_PATH", ':');
    dirs.extend(default_unix_dirs());
    find_shared_object(&dirs, name).map(|p| p.to_string_lossy().into_owned())
}

#[cfg(all(unix, not(target_os = "linux"), not(target_os = "macos")))]
fn resolve_on_host(name: &str) -> Option<String> {
    let mut dirs = env_dirs("LD_LIBRARY_PATH", ':');
    dirs.extend(default_unix_dirs());
    find_shared_object(&dirs, name).map(|p| p.to_string_lossy().into_owned())
}

#[cfg(target_os = "macos")]
fn resolve_on_host(name: &str) -> Option<String> {
    let home = std::env::var("HOME").ok();
    let mut lib_dirs = env_dirs("DYLD_LIBRARY_PATH", ':');
    lib_dirs.extend(env_dirs_or(
        "DYLD_FALLBACK_LIBRARY_PATH",
        &dyld_fallback_library_dirs(home.as_deref()),
    ));
    let mut framework_dirs = env_dirs("DYLD_FRAMEWORK_PATH", ':');
    framework_dirs.extend(env_dirs_or(
        "DYLD_FALLBACK_FRAMEWORK_PATH",
        &dyld_fallback_framework_dirs(home.as_deref()),
    ));
    find_dylib(&lib_dirs, &framework_dirs, name).map(|p| p.to_string_lossy().into_owned())
}

#[cfg(windows)]
fn resolve_on_host(name: &str) -> Option<String> {
    let path = std::env::var("PATH").unwrap_or_default();
    find_on_windows_path(&path, name).map(|p| p.to_string_lossy().into_owned())
}

#[cfg(not(any(unix, windows)))]
fn resolve_on_host(_name: &str) -> Option<String> {
    None
}

// ---------------------------------------------------------------------------
// Environment helpers
// ---------------------------------------------------------------------------

#[cfg_attr(windows, allow(dead_code))]
fn env_dirs(var: &str, separator: char) -> Vec<PathBuf> {
    std::env::var(var)
        .map(|raw| split_dirs(&raw, separator))
        .unwrap_or_default()
}

#[cfg(target_os = "macos")]
fn env_dirs_or(var: &str, fallback: &[PathBuf]) -> Vec<PathBuf> {
    match std::env::var(var) {
        Ok(raw) if !raw.is_empty() => split_dirs(&raw, ':'),
        _ => fallback.to_vec(),
    }
}

fn split_dirs(raw: &str, separator: char) -> Vec<PathBuf> {
    raw.split(separator)
        .filter(|segment| !segment.is_empty())
        .map(PathBuf::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Linux: ldconfig cache
// ---------------------------------------------------------------------------

#[cfg(target_os = "linux")]
fn ldconfig_cache() -> Option<String> {
    use std::process::Command;

    ["/sbin/ldconfig", "/usr/sbin/ldconfig", "ldconfig"]
        .iter()
        .find_map(|program| {
            let output = Command::new(program)
                .arg("-p")
                .env("LC_ALL", "C")
                .env("LANG", "C")
                .output()
                .ok()?;
            output
                .status
                .success()
                .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
        })
}

/// The `ldconfig -p` ABI tag prefix for the host architecture.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn host_abi_tag() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "libc6,x86-64",
        "aarch64" => "libc6,AArch64",
        "powerpc64" | "sparc64" | "s390x" => "libc6,64bit",
        _ => "libc6",
    }
}

/// First soname in `ldconfig -p` output named `lib{name}.<something>` whose
/// ABI tag is exactly `abi_tag`.
///
/// Lines look like
/// `\tlibm.so.6 (libc6,x86-64, OS ABI: Linux 3.2.0) => /lib/x86_64-linux-gnu/libm.so.6`.
#[must_use]
pub fn find_in_ldconfig_cache(output: &str, name: &str, abi_tag: &str) -> Option<String> {
    let prefix = format!("lib{name}.");
    output.lines().find_map(|line| {
        let (entry, _target) = line.split_once(" => ")?;
        let entry = entry.trim();
        let (soname, tag) = entry.split_once(" (")?;
        let soname = soname.trim();
        // "libc6,x86-64, OS ABI: ..." -> "libc6,x86-64"
        let arch = tag.trim_end_matches(')').split(", ").next()?;
        (soname.starts_with(&prefix) && arch == abi_tag).then(|| soname.to_string())
    })
}

// ---------------------------------------------------------------------------
// Unix: directory scan
// ---------------------------------------------------------------------------

#[cfg_attr(any(not(unix), target_os = "macos"), allow(dead_code))]
fn default_unix_dirs() -> Vec<PathBuf> {
    let triplet = format!("{}-linux-gnu", std::env::consts::ARCH);
    [
        format!("/lib/{triplet}"),
        format!("/usr/lib/{triplet}"),
        "/lib64".to_string(),
        "/usr/lib64".to_string(),
        "/lib".to_string(),
        "/usr/lib".to_string(),
        "/usr/local/lib".to_string(),
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

/// Best `lib{name}.so*` in the first directory that has one.
///
/// Within a directory the highest versioned `lib{name}.so.N` wins over the
/// bare `lib{name}.so`, which on many distributions is a linker script or a
/// development symlink rather than something `dlopen` accepts.
#[must_use]
pub fn find_shared_object(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    let bare = format!("lib{name}.so");
    let versioned_prefix = format!("{bare}.");
    dirs.iter().find_map(|dir| {
        let entries = std::fs::read_dir(dir).ok()?;
        let mut best: Option<(Vec<u32>, String)> = None;
        let mut has_bare = false;
        for entry in entries.filter_map(Result::ok) {
            let Ok(file) = entry.file_name().into_string() else {
                continue;
            };
            if file == bare {
                has_bare = true;
            } else if file.starts_with(&versioned_prefix) {
                if let Some(version) = so_version(&file) {
                    let better = best.as_ref().is_none_or(|(v, _)| version > *v);
                    if better {
                        best = Some((version, file));
                    }
                }
            }
        }
        match best {
            Some((_, file)) => Some(dir.join(file)),
            None if has_bare => Some(dir.join(&bare)),
            None => None,
        }
    })
}

// ---------------------------------------------------------------------------
// macOS: dyld fallback paths
// ---------------------------------------------------------------------------

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn dyld_fallback_library_dirs(home: Option<&str>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = home {
        dirs.push(Path::new(home).join("lib"));
    }
    dirs.extend(["/usr/local/lib", "/lib", "/usr/lib"].map(PathBuf::from));
    dirs
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn dyld_fallback_framework_dirs(home: Option<&str>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = home {
        dirs.push(Path::new(home).join("Library/Frameworks"));
    }
    dirs.extend(
        [
            "/Library/Frameworks",
            "/Network/Library/Frameworks",
            "/System/Library/Frameworks",
        ]
        .map(PathBuf::from),
    );
    dirs
}

/// First existing `lib{name}.dylib` / `{name}.dylib` in `lib_dirs`, then
/// `{name}.framework/{name}` in `framework_dirs`.
#[must_use]
pub fn find_dylib(lib_dirs: &[PathBuf], framework_dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    let dylibs = [format!("lib{name}.dylib"), format!("{name}.dylib")];
    let framework = format!("{name}.framework/{name}");
    lib_dirs
        .iter()
        .flat_map(|dir| dylibs.iter().map(move |file| dir.join(file)))
        .chain(framework_dirs.iter().map(|dir| dir.join(&framework)))
        .find(|path| path.is_file())
}

// ---------------------------------------------------------------------------
// Windows: PATH walk
// ---------------------------------------------------------------------------

/// First `dir\{name}` or `dir\{name}.dll` on a `;`-separated `path_var`.
#[must_use]
pub fn find_on_windows_path(path_var: &str, name: &str) -> Option<PathBuf> {
    let has_dll_suffix = name.to_ascii_lowercase().ends_with(".dll");
    split_dirs(path_var, ';').into_iter().find_map(|dir| {
        let exact = dir.join(name);
        if exact.is_file() {
            return Some(exact);
        }
        if has_dll_suffix {
            return None;
        }
        let with_suffix = dir.join(format!("{name}.dll"));
        with_suffix.is_file().then_some(with_suffix)
    })
}
