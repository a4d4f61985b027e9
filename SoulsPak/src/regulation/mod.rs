//! Encrypted regulation containers
//!
//! Three titles ship their gameplay parameters as an encrypted BND4. Each
//! has its own cipher and its own level of support: Elden Ring and Dark
//! Souls III round-trip, Dark Souls II can only be decrypted.
//!
//! Routing is by name. A name that looks like a regulation file but matches
//! no title is a defect ([`Error::UnreachableState`]), not a user error.

pub mod cipher;
pub mod pipeline;
pub mod sidecar;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use cipher::{CipherScheme, Decrypted};
pub use pipeline::{RegulationPipeline, RegulationRepack};
pub use sidecar::{RegulationSidecar, SIDECAR_NAME};

use crate::error::{Error, Result};

const ER_KEY: [u8; 32] = [
    0x99, 0xBF, 0xFC, 0x36, 0x6A, 0x6B, 0xC8, 0xC6, 0xF5, 0x82, 0x7D, 0x09, 0x36, 0x02, 0xD6, 0x76,
    0xC4, 0x28, 0x92, 0xA0, 0x1C, 0x20, 0x7F, 0xB0, 0x24, 0xD3, 0xAF, 0x4E, 0x49, 0x3F, 0xEF, 0x99,
];

const DS3_KEY: [u8; 32] = *b"ds3#jn/8_7(rsY9pg55GFN7VFL#+3n/)";

const DS2_KEY: [u8; 16] = [
    0x40, 0x17, 0x81, 0x30, 0xDF, 0x0A, 0x94, 0x54, 0x33, 0x09, 0xE1, 0x71, 0xEC, 0xBF, 0x25, 0x4C,
];

/// File names routed to the regulation pipeline (substring match).
const FILE_ROUTES: [&str; 4] = ["regulation.bnd.dcx", "Data0", "regulation.bin", "regulation.bnd"];

/// Unpack directory names routed to the regulation pipeline (substring match).
const DIR_ROUTES: [&str; 3] = ["regulation-bnd-dcx", "Data0", "regulation-bin"];

/// Title a regulation file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegulationVariant {
    EldenRing,
    DarkSouls3,
    DarkSouls2,
}

impl RegulationVariant {
    pub const ALL: [RegulationVariant; 3] = [Self::EldenRing, Self::DarkSouls3, Self::DarkSouls2];

    /// Identifier used in the sidecar.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EldenRing => "elden_ring",
            Self::DarkSouls3 => "dark_souls_3",
            Self::DarkSouls2 => "dark_souls_2",
        }
    }

    #[must_use]
    pub fn descriptor(self) -> &'static RegulationDescriptor {
        match self {
            Self::EldenRing => &DESCRIPTORS[0],
            Self::DarkSouls3 => &DESCRIPTORS[1],
            Self::DarkSouls2 => &DESCRIPTORS[2],
        }
    }
}

impl fmt::Display for RegulationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EldenRing => "Elden Ring",
            Self::DarkSouls3 => "Dark Souls III",
            Self::DarkSouls2 => "Dark Souls II",
        })
    }
}

impl FromStr for RegulationVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| format!("unknown regulation variant {s:?}"))
    }
}

/// Everything that differs between titles.
#[derive(Debug, Clone, Copy)]
pub struct RegulationDescriptor {
    pub variant: RegulationVariant,
    pub cipher: CipherScheme,
    pub supports_reencrypt: bool,
    /// Substring of the file name that selects this title.
    pub file_rule: &'static str,
    /// Substring of the unpack directory name that selects this title.
    pub dir_rule: &'static str,
    /// The file that holds the regulation when the rule matches a family
    /// of names (`Data0.bhd` routes to `Data0.bdt`).
    pub source_file: Option<&'static str>,
}

impl RegulationDescriptor {
    /// The file to decrypt for a routed `path`.
    #[must_use]
    pub fn source_for(&self, path: &Path) -> PathBuf {
        match self.source_file {
            Some(name) if path.file_name().is_some_and(|n| n != name) => path.with_file_name(name),
            _ => path.to_path_buf(),
        }
    }
}

/// One descriptor per title, in match order.
pub static DESCRIPTORS: [RegulationDescriptor; 3] = [
    RegulationDescriptor {
        variant: RegulationVariant::EldenRing,
        cipher: CipherScheme::Aes256Cbc { key: &ER_KEY },
        supports_reencrypt: true,
        file_rule: "regulation.bin",
        dir_rule: "regulation-bin",
        source_file: None,
    },
    RegulationDescriptor {
        variant: RegulationVariant::DarkSouls3,
        cipher: CipherScheme::Aes256Cbc { key: &DS3_KEY },
        supports_reencrypt: true,
        file_rule: "Data0",
        dir_rule: "Data0",
        source_file: Some("Data0.bdt"),
    },
    RegulationDescriptor {
        variant: RegulationVariant::DarkSouls2,
        cipher: CipherScheme::Aes128Ctr { key: &DS2_KEY },
        supports_reencrypt: false,
        file_rule: "enc_regulation.bnd.dcx",
        dir_rule: "enc_regulation-bnd-dcx",
        source_file: None,
    },
];

/// Whether a file name is routed to the regulation pipeline.
#[must_use]
pub fn routes_file(name: &str) -> bool {
    FILE_ROUTES.iter().any(|rule| name.contains(rule))
}

/// Whether an unpack directory name is routed to the regulation pipeline.
#[must_use]
pub fn routes_dir(name: &str) -> bool {
    DIR_ROUTES.iter().any(|rule| name.contains(rule))
}

fn resolve(
    name: &str,
    routed: bool,
    rule: fn(&RegulationDescriptor) -> &'static str,
) -> Result<Option<&'static RegulationDescriptor>> {
    if !routed {
        return Ok(None);
    }
    DESCRIPTORS
        .iter()
        .find(|&d| name.contains(rule(d)))
        .map(Some)
        .ok_or_else(|| Error::UnreachableState {
            name: name.to_string(),
        })
}

/// Descriptor for a regulation file name.
///
/// `Ok(None)` if the name is not routed at all.
///
/// # Errors
/// [`Error::UnreachableState`] if the name is routed but no title claims it.
pub fn descriptor_for_file(name: &str) -> Result<Option<&'static RegulationDescriptor>> {
    resolve(name, routes_file(name), |d| d.file_rule)
}

/// Descriptor for an unpack directory name; see [`descriptor_for_file`].
pub fn descriptor_for_dir(name: &str) -> Result<Option<&'static RegulationDescriptor>> {
    resolve(name, routes_dir(name), |d| d.dir_rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_routing() {
        let er = descriptor_for_file("regulation.bin").unwrap().unwrap();
        assert_eq!(er.variant, RegulationVariant::EldenRing);
        assert!(er.supports_reencrypt);

        let ds3 = descriptor_for_file("Data0.bdt").unwrap().unwrap();
        assert_eq!(ds3.variant, RegulationVariant::DarkSouls3);

        let ds2 = descriptor_for_file("enc_regulation.bnd.dcx").unwrap().unwrap();
        assert_eq!(ds2.variant, RegulationVariant::DarkSouls2);
        assert!(!ds2.supports_reencrypt);

        assert!(descriptor_for_file("gameparam.parambnd.dcx").unwrap().is_none());
    }

    #[test]
    fn test_data0_names_resolve_to_bdt() {
        let ds3 = RegulationVariant::DarkSouls3.descriptor();
        let dir = Path::new("Game");
        for name in ["Data0.bhd", "Data0.bdt", "Data0"] {
            assert_eq!(ds3.source_for(&dir.join(name)), dir.join("Data0.bdt"), "{name}");
        }
        let er = RegulationVariant::EldenRing.descriptor();
        assert_eq!(er.source_for(Path::new("old_regulation.bin")), Path::new("old_regulation.bin"));
    }

    #[test]
    fn test_routed_but_unclaimed_is_unreachable() {
        for name in ["regulation.bnd.dcx", "regulation.bnd"] {
            assert!(routes_file(name));
            assert!(matches!(
                descriptor_for_file(name),
                Err(Error::UnreachableState { .. })
            ));
        }
        assert!(matches!(
            descriptor_for_dir("regulation-bnd-dcx"),
            Err(Error::UnreachableState { .. })
        ));
    }

    #[test]
    fn test_dir_routing() {
        assert_eq!(
            descriptor_for_dir("regulation-bin").unwrap().unwrap().variant,
            RegulationVariant::EldenRing
        );
        assert_eq!(
            descriptor_for_dir("Data0-bdt").unwrap().unwrap().variant,
            RegulationVariant::DarkSouls3
        );
        assert_eq!(
            descriptor_for_dir("enc_regulation-bnd-dcx").unwrap().unwrap().variant,
            RegulationVariant::DarkSouls2
        );
        assert!(descriptor_for_dir("gameparam-parambnd-dcx").unwrap().is_none());
    }

    #[test]
    fn test_variant_names_parse_back() {
        for variant in RegulationVariant::ALL {
            assert_eq!(variant.as_str().parse::<RegulationVariant>().unwrap(), variant);
            assert_eq!(variant.descriptor().variant, variant);
        }
    }
}
