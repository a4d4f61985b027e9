//! Binder manifest sidecar
//!
//! Written at the root of the unpack directory; repack reads everything it
//! needs to rebuild the header from here. Users may edit `path` values and
//! add or remove `<file>` elements.
//!
//! Entry names are attributes: element text is whitespace-trimmed on read,
//! attribute values are not.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Manifest for one binder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "binder")]
pub struct BinderManifest {
    /// Output file name (the header file for BXF).
    pub filename: String,
    /// BXF data file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datafilename: Option<String>,
    /// DCX scheme to re-apply.
    pub compression: String,
    pub version: String,
    /// Format byte exactly as stored.
    pub format: u8,
    pub bigendian: bool,
    pub bitbigendian: bool,
    #[serde(default)]
    pub unicode: bool,
    #[serde(default)]
    pub extended: u8,
    #[serde(default)]
    pub unk04: bool,
    #[serde(default)]
    pub unk05: bool,
    #[serde(default)]
    pub unk18: i32,
    #[serde(default)]
    pub files: ManifestFiles,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFiles {
    #[serde(rename = "file", default)]
    pub file: Vec<ManifestFile>,
}

/// One entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Entry name with `root` removed; also its path under the unpack
    /// directory unless `disk` says otherwise.
    #[serde(rename = "@path")]
    pub path: String,
    /// Prefix stripped from the entry name before writing it to disk.
    #[serde(rename = "@root", default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Where the entry was written when `path` clashed with another entry.
    #[serde(rename = "@disk", default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
    pub flags: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    /// Entry has no name in the binder; `path` is only the on-disk name.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unnamed: bool,
    /// Stored size before per-entry compression, when it differs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncompressedsize: Option<u64>,
}

impl ManifestFile {
    /// Path of the entry's data under the unpack directory.
    #[must_use]
    pub fn disk_path(&self) -> &str {
        self.disk.as_deref().unwrap_or(&self.path)
    }
}

impl BinderManifest {
    /// Serialize to indented XML.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        let mut serializer = quick_xml::se::Serializer::new(&mut xml);
        serializer.indent(' ', 2);
        self.serialize(serializer)?;
        xml.push('\n');
        Ok(xml)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        quick_xml::de::from_str(&xml).map_err(|e| Error::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
