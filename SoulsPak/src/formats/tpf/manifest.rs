//! TPF manifest sidecar
//!
//! Same shape as the binder manifest: one `<texture>` per entry with its
//! name as an attribute and the header fields as elements. Console-only
//! fields live in an optional `<header>`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the sidecar in a TPF unpack directory.
pub const SIDECAR_NAME: &str = "_soulspak-tpf.xml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "tpf")]
pub struct TpfManifest {
    pub filename: String,
    /// DCX scheme to re-apply.
    pub compression: String,
    pub platform: u8,
    pub flag2: u8,
    pub encoding: u8,
    #[serde(default)]
    pub textures: ManifestTextures,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestTextures {
    #[serde(rename = "texture", default)]
    pub texture: Vec<ManifestTexture>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTexture {
    #[serde(rename = "@name")]
    pub name: String,
    /// Where the texture was written when `<name>.dds` clashed.
    #[serde(rename = "@disk", default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
    pub format: u8,
    #[serde(rename = "type")]
    pub texture_type: u8,
    pub mipmaps: u8,
    pub flags1: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<ManifestTextureHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floats: Option<ManifestFloats>,
}

impl ManifestTexture {
    /// Path of the texture data under the unpack directory.
    #[must_use]
    pub fn disk_path(&self) -> String {
        self.disk.clone().unwrap_or_else(|| format!("{}.dds", self.name))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTextureHeader {
    pub width: i16,
    pub height: i16,
    #[serde(default)]
    pub unk1: i32,
    #[serde(default)]
    pub unk2: i32,
    #[serde(default)]
    pub texturecount: i32,
    #[serde(default)]
    pub dxgiformat: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestFloats {
    pub unk00: i32,
    #[serde(rename = "value", default)]
    pub value: Vec<f32>,
}

impl TpfManifest {
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_manifest_xml_reads_back() {
        let manifest = TpfManifest {
            filename: "menu.tpf.dcx".to_string(),
            compression: "DCX_DFLT_10000_24_9".to_string(),
            platform: 4,
            flag2: 3,
            encoding: 1,
            textures: ManifestTextures {
                texture: vec![ManifestTexture {
                    name: " title_logo".to_string(),
                    disk: None,
                    format: 102,
                    texture_type: 0,
                    mipmaps: 9,
                    flags1: 0,
                    header: Some(ManifestTextureHeader {
                        width: 512,
                        height: 256,
                        texturecount: 1,
                        unk2: 0xD,
                        dxgiformat: 98,
                        ..ManifestTextureHeader::default()
                    }),
                    floats: Some(ManifestFloats {
                        unk00: 7,
                        value: vec![0.25, -1.0],
                    }),
                }],
            },
        };
        let xml = manifest.to_xml().unwrap();
        assert!(xml.contains("<type>0</type>"));
        let parsed: TpfManifest = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.textures.texture[0].disk_path(), " title_logo.dds");
    }
}
