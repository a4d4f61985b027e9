//! End-to-end tests driving a `Session` over real files in temp directories.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use soulspak::formats::binder::bnd4;
use soulspak::formats::tpf::{Texture, TextureHeader, Tpf, TpfPlatform, write_tpf};
use soulspak::prelude::*;
use soulspak::regulation::RegulationSidecar;

/// Reversible stand-in for Kraken so KRAK containers can be exercised.
struct XorOodle;

impl OodleEngine for XorOodle {
    fn decompress(&self, compressed: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
        let out: Vec<u8> = compressed.iter().map(|b| b ^ 0x5A).collect();
        assert_eq!(out.len(), decompressed_size);
        Ok(out)
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.iter().map(|b| b ^ 0x5A).collect())
    }
}

fn session() -> Session {
    Session::with_engine(SessionOptions::new(), Arc::new(XorOodle))
}

fn binder(names: &[&str]) -> Vec<u8> {
    let binder = Binder {
        version: "07D7R6".to_string(),
        files: names
            .iter()
            .enumerate()
            .map(|(i, name)| BinderFile {
                flags: 0x40,
                id: i as i32,
                name: Some((*name).to_string()),
                uncompressed_size: None,
                data: format!("contents of {name}").into_bytes(),
            })
            .collect(),
        ..Binder::default()
    };
    bnd4::write_bnd4(&binder).unwrap()
}

fn wrapped(scheme: DcxType, payload: &[u8]) -> Vec<u8> {
    CompressionShim::new(Arc::new(XorOodle)).apply(scheme, payload).unwrap()
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_bnd4_dcx_unpack_and_repack() {
    let dir = tempfile::tempdir().unwrap();
    let original = wrapped(
        DcxType::DcxDflt11000_44_9,
        &binder(&[
            r"N:\GR\data\INTERROOT_win64\chr\c0000\c0000.hkx",
            r"N:\GR\data\INTERROOT_win64\chr\c0000\c0000.tae",
        ]),
    );
    let path = write(dir.path(), "c0000.anibnd.dcx", &original);
    let session = session();

    let outcome = session.process(&path, &silent);
    let target = dir.path().join("c0000-anibnd-dcx");
    match &outcome {
        Outcome::Unpacked {
            kind,
            target: written,
            entries,
        } => {
            assert_eq!(*kind, FormatKind::Bnd4);
            assert_eq!(written, &target);
            assert_eq!(*entries, 2);
        }
        other => panic!("unexpected outcome: {other}"),
    }
    assert!(target.join("_soulspak-bnd4.xml").is_file());

    let outcome = session.process(&target, &silent);
    assert!(matches!(outcome, Outcome::Repacked { kind: FormatKind::Bnd4, .. }), "{outcome}");
    assert_eq!(fs::read(&path).unwrap(), original);
    assert_eq!(fs::read(dir.path().join("c0000.anibnd.dcx.bak")).unwrap(), original);
}

#[test]
fn test_edited_entry_is_repacked() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "menu.bnd", &binder(&["font.ccm", "font_0000.tpf"]));
    let session = session();
    assert!(!session.process(&path, &silent).needs_attention());

    let target = dir.path().join("menu-bnd");
    fs::write(target.join("font.ccm"), b"edited").unwrap();
    assert!(!session.process(&target, &silent).needs_attention());

    let rebuilt = bnd4::read_bnd4(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(rebuilt.files[0].data, b"edited");
    assert_eq!(rebuilt.files[1].data, b"contents of font_0000.tpf");
}

#[test]
fn test_kraken_without_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m10_00.mapbnd.dcx", &wrapped(DcxType::DcxKrak, &binder(&["a.msb"])));

    let session = Session::with_engine(SessionOptions::new(), Arc::new(soulspak::compression::UnavailableOodle));
    let outcome = session.process(&path, &silent);
    assert_eq!(outcome.error_kind(), Some(ErrorKind::EngineUnavailable));
    assert!(!dir.path().join("m10_00-mapbnd-dcx").exists());

    // With an engine the same file unpacks.
    assert!(!self::session().process(&path, &silent).needs_attention());
}

#[test]
fn test_leading_traversal_stays_inside_destination() {
    let dir = tempfile::tempdir().unwrap();
    let outer = dir.path().join("mods");
    fs::create_dir(&outer).unwrap();
    let path = write(&outer, "evil.bnd", &binder(&[r"..\..\windows\evil.dll"]));

    let outcome = session().process(&path, &silent);
    assert!(!outcome.needs_attention(), "{outcome}");
    let target = outer.join("evil-bnd");
    assert_eq!(fs::read(target.join("windows").join("evil.dll")).unwrap(), br"contents of ..\..\windows\evil.dll");
    assert!(!dir.path().join("windows").exists());
    assert!(!outer.join("windows").exists());
}

#[test]
fn test_strict_policy_rejects_traversal_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "evil.bnd", &binder(&["ok.txt", r"..\..\windows\evil.dll"]));

    let session = Session::with_engine(
        SessionOptions::new().with_traversal(TraversalPolicy::Strict),
        Arc::new(XorOodle),
    );
    let outcome = session.process(&path, &silent);
    assert_eq!(outcome.error_kind(), Some(ErrorKind::PathTraversal));
    assert!(!dir.path().join("evil-bnd").exists());
}

#[test]
fn test_target_name_taken_by_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "a.bnd", &binder(&["x.txt"]));
    write(dir.path(), "a-bnd", b"not a directory");

    let outcome = session().process(&path, &silent);
    assert!(matches!(&outcome, Outcome::Unpacked { target, .. } if target == &dir.path().join("a-bnd-spk")));
}

fn ds3_regulation() -> Vec<u8> {
    let compressed = wrapped(DcxType::DcxDflt10000_44_9, &binder(&[r"N:\FDP\data\Param\gameparam\ActionButtonParam.param"]));
    RegulationVariant::DarkSouls3
        .descriptor()
        .cipher
        .encrypt(RegulationVariant::DarkSouls3, &[0xA5; 16], &compressed)
        .unwrap()
}

#[test]
fn test_ds3_regulation_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let original = ds3_regulation();
    let path = write(dir.path(), "Data0.bdt", &original);
    let session = session();

    let outcome = session.process(&path, &silent);
    assert!(
        matches!(outcome, Outcome::Regulation { variant: RegulationVariant::DarkSouls3, reversible: true, .. }),
        "{outcome}"
    );
    let target = dir.path().join("Data0-bdt");
    let sidecar = RegulationSidecar::read(&target.join(soulspak::regulation::SIDECAR_NAME)).unwrap();
    assert_eq!(sidecar.filename, "Data0.bdt");

    let outcome = session.process(&target, &silent);
    assert!(matches!(outcome, Outcome::Regulation { reversible: true, .. }), "{outcome}");
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn test_data0_header_reads_the_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let original = ds3_regulation();
    write(dir.path(), "Data0.bdt", &original);
    let bhd = write(dir.path(), "Data0.bhd", b"BHD5 header that is never decrypted");

    let outcome = session().process(&bhd, &silent);
    match &outcome {
        Outcome::Regulation { variant, output, .. } => {
            assert_eq!(*variant, RegulationVariant::DarkSouls3);
            assert_eq!(output, &dir.path().join("Data0-bdt"));
        }
        other => panic!("unexpected outcome: {other}"),
    }
    assert!(!dir.path().join("Data0-bhd").exists());
}

#[test]
fn test_data0_header_without_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let bhd = write(dir.path(), "Data0.bhd", &ds3_regulation());

    let outcome = session().process(&bhd, &silent);
    match outcome {
        Outcome::Failed(Error::MissingBdt { bhd, bdt }) => {
            assert_eq!(bhd, "Data0.bhd");
            assert_eq!(bdt, dir.path().join("Data0.bdt"));
        }
        other => panic!("unexpected outcome: {other}"),
    }
}

#[test]
fn test_clashing_entries_survive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let original = binder(&[r"N:\FDP\data.param", "a.param", "A.PARAM"]);
    let path = write(dir.path(), "gameparam.parambnd", &original);
    let session = session();

    assert!(!session.process(&path, &silent).needs_attention());
    let target = dir.path().join("gameparam-parambnd");
    assert_eq!(fs::read(target.join("a~1.param")).unwrap(), b"contents of a.param");
    assert_eq!(fs::read(target.join("A~2.PARAM")).unwrap(), b"contents of A.PARAM");

    assert!(!session.process(&target, &silent).needs_attention());
    assert_eq!(fs::read(&path).unwrap(), original);
}

fn texture(name: &str, data: &[u8]) -> Texture {
    Texture {
        name: name.to_string(),
        format: 1,
        texture_type: 0,
        mipmaps: 1,
        flags1: 0,
        header: None,
        float_struct: None,
        data: data.to_vec(),
    }
}

#[test]
fn test_tpf_dcx_unpack_and_repack() {
    let dir = tempfile::tempdir().unwrap();
    let tpf = Tpf {
        platform: TpfPlatform::Pc,
        flag2: 3,
        encoding: 1,
        textures: vec![texture("MENU_Title", b"not really a dds"), texture("MENU_Empty", b"")],
    };
    let original = wrapped(DcxType::DcxDflt10000_24_9, &write_tpf(&tpf).unwrap());
    let path = write(dir.path(), "menu.tpf.dcx", &original);
    let session = session();

    let outcome = session.process(&path, &silent);
    assert!(matches!(outcome, Outcome::Unpacked { kind: FormatKind::Tpf, entries: 2, .. }), "{outcome}");
    let target = dir.path().join("menu-tpf-dcx");
    assert_eq!(fs::read(target.join("MENU_Title.dds")).unwrap(), b"not really a dds");
    assert!(target.join("_soulspak-tpf.xml").is_file());

    let outcome = session.process(&target, &silent);
    assert!(matches!(outcome, Outcome::Repacked { kind: FormatKind::Tpf, .. }), "{outcome}");
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn test_console_tpf_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut icon = texture("icon", &[0xEE; 0x30]);
    icon.header = Some(TextureHeader {
        width: 64,
        height: 32,
        unk2: 0xD,
        texture_count: 1,
        dxgi_format: 71,
        ..TextureHeader::default()
    });
    let tpf = Tpf {
        platform: TpfPlatform::Ps4,
        flag2: 3,
        encoding: 1,
        textures: vec![icon],
    };
    let original = write_tpf(&tpf).unwrap();
    let path = write(dir.path(), "icons.tpf", &original);
    let session = session();

    assert!(!session.process(&path, &silent).needs_attention());
    assert!(!session.process(&dir.path().join("icons-tpf"), &silent).needs_attention());
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn test_same_bytes_route_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = wrapped(DcxType::DcxDflt10000_44_9, &binder(&["a.param"]));
    let regulation = write(dir.path(), "regulation.bin", &bytes);
    let plain = write(dir.path(), "gameparam.parambnd.dcx", &bytes);

    let report = session().run_batch(&[regulation, plain], &silent);
    // The regulation name sends the file through decryption, which rejects plain data.
    assert!(matches!(
        report.items[0].outcome,
        Outcome::Failed(Error::Decryption { variant: RegulationVariant::EldenRing, .. })
    ));
    assert!(matches!(report.items[1].outcome, Outcome::Unpacked { kind: FormatKind::Bnd4, .. }));
}

#[test]
fn test_corrupt_regulation_does_not_stop_batch() {
    let dir = tempfile::tempdir().unwrap();
    let corrupt = write(dir.path(), "regulation.bin", &[0x33; 64]);
    let good = write(dir.path(), "item.bnd", &binder(&["x.txt"]));

    let report = session().run_batch(&[&corrupt, &good], &silent);
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.items[0].outcome.error_kind(), Some(ErrorKind::Codec));
    assert!(matches!(
        report.items[0].outcome,
        Outcome::Failed(Error::Decryption { variant: RegulationVariant::EldenRing, .. })
    ));
    assert!(report.items[1].outcome.is_success());
    assert!(report.needs_attention());
    assert_eq!(report.fail_count(), 1);
}

/// Encrypted Dark Souls II regulation built by running the keystream over a plain DCX.
fn ds2_regulation() -> Vec<u8> {
    let plain = wrapped(DcxType::DcxDflt10000_24_9, &binder(&["ItemParam.param"]));
    let header: Vec<u8> = (0..32).collect();
    let mut blob = header.clone();
    blob.extend_from_slice(&plain);
    let keystreamed = RegulationVariant::DarkSouls2
        .descriptor()
        .cipher
        .decrypt(RegulationVariant::DarkSouls2, &blob)
        .unwrap()
        .plaintext;
    let mut encrypted = header;
    encrypted.extend_from_slice(&keystreamed);
    encrypted
}

#[test]
fn test_ds2_repack_requires_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let original = ds2_regulation();
    let path = write(dir.path(), "enc_regulation.bnd.dcx", &original);
    let target = dir.path().join("enc_regulation-bnd-dcx");

    let refusing = session();
    let outcome = refusing.process(&path, &silent);
    assert!(
        matches!(outcome, Outcome::Regulation { variant: RegulationVariant::DarkSouls2, reversible: false, .. }),
        "{outcome}"
    );
    assert!(target.join("ItemParam.param").is_file());

    let outcome = refusing.process(&target, &silent);
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ReencryptUnsupported));
    assert_eq!(fs::read(&path).unwrap(), original);
    assert!(!dir.path().join("enc_regulation.bnd.dcx.bak").exists());

    let confirming = session().with_confirm(|_| true);
    let outcome = confirming.process(&target, &silent);
    assert!(matches!(outcome, Outcome::Regulation { reversible: false, .. }), "{outcome}");
    let written = fs::read(&path).unwrap();
    assert!(written.starts_with(b"DCX\0"));
    assert_eq!(fs::read(dir.path().join("enc_regulation.bnd.dcx.bak")).unwrap(), original);
}

#[test]
fn test_unrecognized_inputs_need_attention() {
    let dir = tempfile::tempdir().unwrap();
    let text = write(dir.path(), "notes.txt", b"hello");
    let empty_dir = dir.path().join("loose");
    fs::create_dir(&empty_dir).unwrap();

    let report = session().run_batch(&[text, empty_dir], &silent);
    assert!(report.items.iter().all(|i| matches!(i.outcome, Outcome::Unrecognized { .. })));
    assert!(report.needs_attention());
}
