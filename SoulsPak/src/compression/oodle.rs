//! Oodle engine seam and library discovery

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::native::NativeOodle;
use crate::error::{Error, Result};

/// File name of the Oodle runtime on this platform.
#[cfg(windows)]
pub const LIBRARY_NAME: &str = "oo2core_6_win64.dll";
/// File name of the Oodle runtime on this platform.
#[cfg(not(windows))]
pub const LIBRARY_NAME: &str = "liboo2corelinux64.so.9";

/// Environment variable naming the Oodle library (or its directory).
pub const OODLE_ENV: &str = "SOULSPAK_OODLE";

const STEAM_GAMES: [&str; 2] = ["ELDEN RING", "Sekiro"];

/// Kraken compressor used by `DCX_KRAK` payloads.
pub trait OodleEngine: Send + Sync {
    fn decompress(&self, compressed: &[u8], decompressed_size: usize) -> Result<Vec<u8>>;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Engine for environments without Oodle; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableOodle;

impl OodleEngine for UnavailableOodle {
    fn decompress(&self, _compressed: &[u8], _decompressed_size: usize) -> Result<Vec<u8>> {
        Err(Error::EngineUnavailable {
            library: LIBRARY_NAME,
            searched: Vec::new(),
        })
    }

    fn compress(&self, _data: &[u8]) -> Result<Vec<u8>> {
        self.decompress(&[], 0)
    }
}

/// Loads the native library on first use from a list of candidate paths.
///
/// Discovery happens once; a failed search is remembered so a batch of
/// KRAK files reports the same error without rescanning the disk.
pub struct LazyOodle {
    candidates: Vec<PathBuf>,
    loaded: OnceLock<Option<NativeOodle>>,
}

impl LazyOodle {
    #[must_use]
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            loaded: OnceLock::new(),
        }
    }

    /// Standard search order, with `explicit` (from settings or a flag) first.
    #[must_use]
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self::new(default_candidates(explicit))
    }

    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    fn engine(&self) -> Result<&NativeOodle> {
        self.loaded
            .get_or_init(|| {
                for path in self.candidates.iter().filter(|p| p.is_file()) {
                    match NativeOodle::load(path) {
                        Ok(engine) => {
                            tracing::info!("Loaded Oodle from {}", path.display());
                            return Some(engine);
                        }
                        Err(e) => tracing::warn!("Failed to load {}: {e}", path.display()),
                    }
                }
                None
            })
            .as_ref()
            .ok_or_else(|| Error::EngineUnavailable {
                library: LIBRARY_NAME,
                searched: self.candidates.clone(),
            })
    }
}

impl OodleEngine for LazyOodle {
    fn decompress(&self, compressed: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
        self.engine()?.decompress(compressed, decompressed_size)
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.engine()?.compress(data)
    }
}

fn library_in(path: PathBuf) -> PathBuf {
    if path.is_dir() { path.join(LIBRARY_NAME) } else { path }
}

/// Candidate library paths in search order.
#[must_use]
pub fn default_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(library_in(path.to_path_buf()));
    }
    if let Some(path) = std::env::var_os(OODLE_ENV).filter(|v| !v.is_empty()) {
        candidates.push(library_in(PathBuf::from(path)));
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join(LIBRARY_NAME));
        candidates.push(dir.join("lib").join(LIBRARY_NAME));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(LIBRARY_NAME));
    }
    for library in steam_libraries() {
        for game in STEAM_GAMES {
            candidates.push(
                library
                    .join("steamapps")
                    .join("common")
                    .join(game)
                    .join("Game")
                    .join(LIBRARY_NAME),
            );
        }
    }
    candidates.dedup();
    candidates
}

fn steam_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if cfg!(windows) {
        roots.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
    }
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".steam").join("steam"));
        roots.push(home.join(".local").join("share").join("Steam"));
    }
    roots.retain(|r| r.is_dir());
    roots
}

/// Steam roots plus any extra libraries listed in `libraryfolders.vdf`.
fn steam_libraries() -> Vec<PathBuf> {
    let mut libraries = Vec::new();
    for root in steam_roots() {
        let vdf = root.join("steamapps").join("libraryfolders.vdf");
        if let Ok(content) = std::fs::read_to_string(&vdf) {
            libraries.extend(parse_library_folders(&content));
        }
        libraries.push(root);
    }
    libraries.sort();
    libraries.dedup();
    libraries
}

/// Pull `"path"  "..."` values out of a Steam VDF document.
fn parse_library_folders(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix("\"path\"")?;
            let value = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
            Some(PathBuf::from(value.replace("\\\\", "\\")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_reports_library() {
        let err = UnavailableOodle.decompress(b"x", 4).unwrap_err();
        assert!(matches!(err, Error::EngineUnavailable { library: LIBRARY_NAME, .. }));
        assert!(UnavailableOodle.compress(b"x").is_err());
    }

    #[test]
    fn test_lazy_with_no_candidates_is_unavailable() {
        let engine = LazyOodle::new(vec![PathBuf::from("/nonexistent/oodle.so")]);
        match engine.decompress(b"x", 4) {
            Err(Error::EngineUnavailable { searched, .. }) => {
                assert_eq!(searched, vec![PathBuf::from("/nonexistent/oodle.so")]);
            }
            other => panic!("expected EngineUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_path_is_searched_first() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = default_candidates(Some(dir.path()));
        assert_eq!(candidates[0], dir.path().join(LIBRARY_NAME));
    }

    #[test]
    fn test_parse_library_folders() {
        let vdf = r#"
"libraryfolders"
{
	"0"
	{
		"path"		"C:\\Program Files (x86)\\Steam"
		"label"		""
	}
	"1"
	{
		"path"		"D:\\SteamLibrary"
	}
}"#;
        assert_eq!(
            parse_library_folders(vdf),
            vec![
                PathBuf::from(r"C:\Program Files (x86)\Steam"),
                PathBuf::from(r"D:\SteamLibrary"),
            ]
        );
    }
}
