//! Regulation sidecar: the crypto header needed to re-encrypt identically

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::RegulationVariant;
use crate::error::{Error, Result};

/// File name of the sidecar in a regulation unpack directory.
pub const SIDECAR_NAME: &str = "_soulspak-regulation.xml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "regulation")]
pub struct RegulationSidecar {
    pub variant: String,
    pub filename: String,
    /// Unencrypted header bytes, base64.
    pub header: String,
}

impl RegulationSidecar {
    #[must_use]
    pub fn new(variant: RegulationVariant, filename: &str, header: &[u8]) -> Self {
        Self {
            variant: variant.as_str().to_string(),
            filename: filename.to_string(),
            header: STANDARD.encode(header),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        let mut serializer = quick_xml::se::Serializer::new(&mut xml);
        serializer.indent(' ', 2);
        self.serialize(serializer)?;
        xml.push('\n');
        std::fs::write(path, xml)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        quick_xml::de::from_str(&xml).map_err(|e| Error::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Decoded header bytes.
    pub fn header_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.header.trim())
            .map_err(|e| Error::InvalidManifest {
                path: path.to_path_buf(),
                message: format!("header is not valid base64: {e}"),
            })
    }

    /// The title recorded in the sidecar.
    pub fn variant(&self, path: &Path) -> Result<RegulationVariant> {
        self.variant.parse().map_err(|message| Error::InvalidManifest {
            path: path.to_path_buf(),
            message,
        })
    }
}
