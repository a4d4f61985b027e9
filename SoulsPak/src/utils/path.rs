//! Entry path sanitizing
//!
//! Binder entry names are taken verbatim from the container and are not
//! trusted. Old archives embed absolute paths from the developer's build
//! network (`N:\FDP\data\...`), which are folded into a `root` so the rest of
//! the name can be written relative to the unpack directory. Anything that
//! would still climb out of that directory afterwards is rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Build-network roots found in shipped archives, per title.
const NETWORK_ROOTS: &[&str] = &[
    // Demon's Souls
    r"N:\DemonsSoul\data\DVDROOT\",
    r"N:\DemonsSoul\data\",
    r"N:\DemonsSoul\",
    r"Z:\data\",
    // Ninja Blade
    r"I:\NinjaBlade\",
    // Dark Souls
    r"N:\FRPG\data\INTERROOT_win32\",
    r"N:\FRPG\data\INTERROOT_win64\",
    r"N:\FRPG\data\INTERROOT_x64\",
    r"N:\FRPG\data\INTERROOT\",
    r"N:\FRPG\data\",
    r"N:\FRPG\",
    // Dark Souls II
    r"N:\FRPG2\data\",
    r"N:\FRPG2\",
    r"N:\FRPG2_64\data\",
    r"N:\FRPG2_64\",
    // Dark Souls III
    r"N:\FDP\data\INTERROOT_ps4\",
    r"N:\FDP\data\INTERROOT_win64\",
    r"N:\FDP\data\INTERROOT_xboxone\",
    r"N:\FDP\data\",
    r"N:\FDP\",
    // Bloodborne
    r"N:\SPRJ\data\DVDROOT_win64\",
    r"N:\SPRJ\data\INTERROOT_ps4\",
    r"N:\SPRJ\data\INTERROOT_ps4_havok\",
    r"N:\SPRJ\data\INTERROOT_win64\",
    r"N:\SPRJ\data\",
    r"N:\SPRJ\",
    // Sekiro
    r"N:\NTC\data\Target\INTERROOT_win64_havok\",
    r"N:\NTC\data\Target\INTERROOT_win64\",
    r"N:\NTC\data\Target\",
    r"N:\NTC\data\",
    r"N:\NTC\",
];

/// How leading `..` segments are treated once absolute roots are stripped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalPolicy {
    /// Fold a leading run of `..\` into the root, like older tooling did.
    #[default]
    FoldLeading,
    /// Reject any `..` segment outright.
    Strict,
}

/// An entry name split into the prefix that was stripped and the part that
/// is safe to write under the unpack directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedPath {
    /// Stripped prefix, kept only so repack can restore the original name.
    pub root: String,
    /// Relative remainder with the original separators.
    pub relative: String,
}

impl SanitizedPath {
    /// The relative part as a platform path.
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        segments(&self.relative).collect()
    }

    /// Destination of this entry under `dir`.
    #[must_use]
    pub fn under(&self, dir: &Path) -> PathBuf {
        dir.join(self.to_path_buf())
    }

    /// The original internal name.
    #[must_use]
    pub fn original(&self) -> String {
        format!("{}{}", self.root, self.relative)
    }
}

fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(is_separator).filter(|s| !s.is_empty())
}

/// Length of a matching network root, comparing case- and separator-insensitively.
fn network_root_len(path: &str) -> Option<usize> {
    let mut best: Option<usize> = None;
    for root in NETWORK_ROOTS {
        if root.len() > path.len() || !path.is_char_boundary(root.len()) {
            continue;
        }
        let matches = path[..root.len()]
            .chars()
            .zip(root.chars())
            .all(|(a, b)| {
                (is_separator(a) && is_separator(b)) || a.eq_ignore_ascii_case(&b)
            });
        if matches && best.is_none_or(|len| root.len() > len) {
            best = Some(root.len());
        }
    }
    best
}

/// Length of a drive (`C:`), UNC (`\\server\share\`) or device (`\\?\C:\`) prefix.
fn volume_prefix_len(path: &str) -> usize {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return if bytes.get(2).is_some_and(|&b| is_separator(b as char)) { 3 } else { 2 };
    }
    let sep_at = |i: usize| bytes.get(i).is_some_and(|&b| is_separator(b as char));
    // exactly two separators; longer runs are plain leading separators
    if !(sep_at(0) && sep_at(1)) || sep_at(2) {
        return 0;
    }

    // `\\?\` and `\\.\` device prefixes, optionally followed by a drive
    if bytes.len() >= 4 && (bytes[2] == b'?' || bytes[2] == b'.') && sep_at(3) {
        return 4 + volume_prefix_len(&path[4..]);
    }

    // `\\server\share\` consumes two components
    let mut consumed = 2;
    for _ in 0..2 {
        let rest = &path[consumed..];
        let component = rest.find(is_separator).unwrap_or(rest.len());
        consumed += component;
        if consumed < path.len() {
            consumed += 1;
        }
    }
    consumed
}

/// Length of a leading run of `.`/`..` segments and separators.
fn leading_dots_len(path: &str) -> (usize, bool) {
    let mut consumed = 0;
    let mut saw_parent = false;
    loop {
        let rest = &path[consumed..];
        let segment_len = rest.find(is_separator).unwrap_or(rest.len());
        let segment = &rest[..segment_len];
        if segment != "." && segment != ".." {
            break;
        }
        // a trailing `..` with nothing after it is left for the final scan
        if segment_len == rest.len() {
            break;
        }
        saw_parent |= segment == "..";
        consumed += segment_len + 1;
    }
    (consumed, saw_parent)
}

fn leading_separators_len(path: &str) -> usize {
    path.len() - path.trim_start_matches(is_separator).len()
}

fn reject(path: &str, reason: &'static str) -> Error {
    Error::PathTraversal {
        path: path.to_string(),
        reason,
    }
}

/// Split an untrusted entry name into a root and a relative path that cannot
/// escape the unpack directory.
///
/// # Errors
/// Returns [`Error::PathTraversal`] if a parent-directory segment survives
/// prefix stripping (or any is present under [`TraversalPolicy::Strict`]),
/// or if nothing writable remains.
pub fn sanitize(internal_path: &str, policy: TraversalPolicy) -> Result<SanitizedPath> {
    let mut split = network_root_len(internal_path).unwrap_or(0);
    split += volume_prefix_len(&internal_path[split..]);

    let (dots, saw_parent) = leading_dots_len(&internal_path[split..]);
    if saw_parent && policy == TraversalPolicy::Strict {
        return Err(reject(internal_path, "parent-directory segment"));
    }
    split += dots;
    split += leading_separators_len(&internal_path[split..]);

    let relative = &internal_path[split..];
    for segment in segments(relative) {
        if segment == ".." {
            return Err(reject(internal_path, "parent-directory segment after prefix"));
        }
        if segment.contains(':') {
            return Err(reject(internal_path, "drive or stream specifier inside path"));
        }
    }
    if relative.starts_with(is_separator) {
        return Err(reject(internal_path, "rooted path after prefix"));
    }
    if segments(relative).all(|s| s == ".") {
        return Err(reject(internal_path, "no file name after prefix"));
    }

    Ok(SanitizedPath {
        root: internal_path[..split].to_string(),
        relative: relative.to_string(),
    })
}
