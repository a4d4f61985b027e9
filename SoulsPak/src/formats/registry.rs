//! Format identification
//!
//! One ordered rule table, first match wins: the regulation file name rule,
//! then magic bytes, then file name suffixes. Magic is checked on the payload
//! after any DCX wrapper has been peeled.

use super::FormatKind;
use crate::error::Result;
use crate::regulation;
use crate::source::ArchiveSource;

/// Bytes read for magic checks.
pub const PROBE_LEN: usize = 0x10;

/// What each rule gets to look at.
struct Probe<'a> {
    head: &'a [u8],
    /// Lowercased file name, empty when unknown.
    name: String,
    /// Exact file name, for the regulation rule.
    raw_name: &'a str,
}

type Rule = (fn(&Probe<'_>) -> bool, FormatKind);

const RULES: &[Rule] = &[
    (|p| regulation::routes_file(p.raw_name), FormatKind::Regulation),
    (|p| p.head.starts_with(b"BND3"), FormatKind::Bnd3),
    (|p| p.head.starts_with(b"BND4"), FormatKind::Bnd4),
    (|p| p.head.starts_with(b"BHF3"), FormatKind::Bxf3),
    (|p| p.head.starts_with(b"BHF4"), FormatKind::Bxf4),
    (is_ffx, FormatKind::Ffx),
    (|p| p.head.starts_with(b"filt") || p.head.starts_with(b"f\0i\0l\0t\0"), FormatKind::Gparam),
    (|p| p.head.starts_with(b"LUAI"), FormatKind::LuaInfo),
    (|p| p.head.starts_with(b"TPF\0"), FormatKind::Tpf),
    (|p| p.name.ends_with(".fmg"), FormatKind::Fmg),
    (|p| p.name.ends_with(".luagnl"), FormatKind::LuaGnl),
    (|p| xml_of(&p.name, ".fmg"), FormatKind::FmgXml),
    (|p| xml_of(&p.name, ".ffx"), FormatKind::FfxXml),
    (|p| xml_of(&p.name, ".gparam"), FormatKind::GparamXml),
    (|p| xml_of(&p.name, ".fltparam"), FormatKind::FltparamXml),
    (|p| xml_of(&p.name, ".luagnl"), FormatKind::LuaGnlXml),
    (|p| xml_of(&p.name, ".luainfo"), FormatKind::LuaInfoXml),
];

/// `FXR\0` followed by the version-1 marker used by the supported titles.
fn is_ffx(probe: &Probe<'_>) -> bool {
    probe.head.starts_with(b"FXR\0")
        && probe.head.get(6..8).is_some_and(|v| i16::from_le_bytes([v[0], v[1]]) == 1)
}

/// `name.<ext>.xml` or `name.<ext>.dcx.xml`.
fn xml_of(name: &str, ext: &str) -> bool {
    name.strip_suffix(".xml")
        .map(|n| n.strip_suffix(".dcx").unwrap_or(n))
        .is_some_and(|n| n.ends_with(ext))
}

/// Identify a container from its leading bytes and optional file name.
///
/// Total and deterministic: the same inputs always give the same answer and
/// unrecognized input is `None`.
#[must_use]
pub fn identify_head(head: &[u8], file_name: Option<&str>) -> Option<FormatKind> {
    let raw_name = file_name.unwrap_or_default();
    let probe = Probe {
        head,
        name: raw_name.to_lowercase(),
        raw_name,
    };
    RULES.iter().find(|(rule, _)| rule(&probe)).map(|&(_, kind)| kind)
}

/// Identify the container in `source`.
///
/// # Errors
/// Only fails if the source cannot be read.
pub fn identify(source: &ArchiveSource<'_>, file_name: Option<&str>) -> Result<Option<FormatKind>> {
    let head = source.head(PROBE_LEN)?;
    let kind = identify_head(&head, file_name);
    tracing::debug!("Identified {:?} as {kind:?}", file_name.unwrap_or("<bytes>"));
    Ok(kind)
}
