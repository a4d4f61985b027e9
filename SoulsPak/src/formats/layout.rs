//! On-disk placement of container entries
//!
//! Entry names are cleaned independently, so two of them can land on the same
//! file (`N:\FDP\data\a.param` and `a.param`), or one entry can need another
//! entry's file as a directory. Every entry is given a distinct location
//! before anything is written. A clashing entry moves to a numbered sibling
//! and the manifest records where it went.

use std::collections::HashSet;

fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// Case-insensitive, separator-agnostic key of a relative path.
fn key(relative: &str) -> String {
    relative
        .split(is_separator)
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("/")
}

/// Every proper ancestor of a key, shortest first.
fn ancestors(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/').map(move |(i, _)| &key[..i])
}

/// `path` with `~n` inserted before the file extension.
fn numbered(path: &str, n: usize) -> String {
    let name_start = path.rfind(is_separator).map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let at = name_start + dot;
            format!("{}~{n}{}", &path[..at], &path[at..])
        }
        _ => format!("{path}~{n}"),
    }
}

/// Files and directories already claimed under one unpack directory.
#[derive(Debug, Default)]
pub struct DiskLayout {
    files: HashSet<String>,
    dirs: HashSet<String>,
}

impl DiskLayout {
    /// Layout with `reserved` file names (the manifest) already taken.
    #[must_use]
    pub fn with_reserved(reserved: &[&str]) -> Self {
        let mut layout = Self::default();
        for name in reserved {
            layout.insert(key(name));
        }
        layout
    }

    fn is_free(&self, key: &str) -> bool {
        !self.files.contains(key)
            && !self.dirs.contains(key)
            && ancestors(key).all(|dir| !self.files.contains(dir))
    }

    fn insert(&mut self, key: String) {
        for dir in ancestors(&key) {
            self.dirs.insert(dir.to_string());
        }
        self.files.insert(key);
    }

    /// Claim `relative` for one entry.
    ///
    /// Returns `None` when `relative` was free, otherwise the numbered path
    /// the entry was moved to. If an ancestor of `relative` is already a file
    /// the entry moves to the top level of the unpack directory.
    pub fn claim(&mut self, relative: &str) -> Option<String> {
        let wanted = key(relative);
        if self.is_free(&wanted) {
            self.insert(wanted);
            return None;
        }
        let base = if ancestors(&wanted).any(|dir| self.files.contains(dir)) {
            relative
                .rsplit(is_separator)
                .find(|s| !s.is_empty())
                .unwrap_or(relative)
        } else {
            relative
        };
        let mut n = 1;
        loop {
            let candidate = numbered(base, n);
            let candidate_key = key(&candidate);
            if self.is_free(&candidate_key) {
                self.insert(candidate_key);
                return Some(candidate);
            }
            n += 1;
        }
    }
}
