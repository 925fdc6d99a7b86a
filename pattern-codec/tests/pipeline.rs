//! End-to-end pipeline: capture → encode → write-back → store → decode

use pattern_codec::{
    CAPTURE_LINE_SAMPLES, Capture, CodecError, Component, DecodeSession, EncodeOptions,
    EncodeSession, LUMA_BLANK, LevelProfile, MemoryStore, OutputLine, PatchLibrary, RomManifest,
    RomPartRef, RomSet, SamplePlanes, Standard, map_luma, write_back,
};

const PATCHES: &str = r#"
[[patch]]
name = "clock-cutout"
stage = "post-synthesis"
component = "luma"
profile = "digital"
lines = [40, 42]
samples = [600, 604]
fill = 164
"#;

fn manifest(standard: &str, slot: usize) -> RomManifest {
    manifest_with_plane(standard, 1 << 16, slot)
}

fn manifest_with_plane(standard: &str, plane: usize, slot: usize) -> RomManifest {
    let mut text = format!("standard = \"{}\"\nrevision = \"pipeline\"\n", standard);
    for role in RomPartRef::ALL {
        let length = if role == RomPartRef::Cpu { 16384 } else { plane };
        text.push_str(&format!(
            "\n[[part]]\nrole = \"{}\"\nfile = \"{}.bin\"\nlength = {}\n",
            role, role, length
        ));
    }
    text.push_str(&format!("\n[vector_table]\nstart = 0x1000\nlength = {}\n", slot));
    RomManifest::from_toml(&text).expect("manifest should parse")
}

/// Luma of [`colour_bars`] at one captured sample
fn bars_luma(line: usize, x: usize) -> u16 {
    if (200..210).contains(&line) {
        452
    } else {
        940 - (x / 128) as u16 * 100
    }
}

/// Colour bars: eight vertical bars, identical on every line, with a
/// grey band on captured lines 200..210
fn colour_bars(standard: Standard) -> Capture {
    let lines = standard.geometry().capture_lines();
    let bars_y: Vec<u16> = (0..CAPTURE_LINE_SAMPLES).map(|x| bars_luma(0, x)).collect();
    let bars_ry: Vec<u16> = (0..CAPTURE_LINE_SAMPLES)
        .map(|x| 512 + ((x / 128) as u16 % 3) * 100)
        .collect();
    let bars_by: Vec<u16> = (0..CAPTURE_LINE_SAMPLES)
        .map(|x| 512 - ((x / 128) as u16 % 2) * 100)
        .collect();

    let mut y = Vec::with_capacity(lines * CAPTURE_LINE_SAMPLES);
    let mut ry = Vec::with_capacity(lines * CAPTURE_LINE_SAMPLES);
    let mut by = Vec::with_capacity(lines * CAPTURE_LINE_SAMPLES);
    for line in 0..lines {
        if (200..210).contains(&line) {
            y.extend(std::iter::repeat_n(452, CAPTURE_LINE_SAMPLES));
            ry.extend(std::iter::repeat_n(512, CAPTURE_LINE_SAMPLES));
            by.extend(std::iter::repeat_n(512, CAPTURE_LINE_SAMPLES));
        } else {
            y.extend_from_slice(&bars_y);
            ry.extend_from_slice(&bars_ry);
            by.extend_from_slice(&bars_by);
        }
    }
    Capture::from_samples(standard, &y, &ry, &by).expect("capture shape")
}

fn digital() -> EncodeOptions {
    EncodeOptions {
        profile: LevelProfile {
            use_digital_factors: true,
            invert: false,
        },
        decimate_422: true,
        anti_pal: false,
    }
}

#[test]
fn test_pal_round_trip_through_store() {
    let manifest = manifest("pal", 1734);
    let mut store = MemoryStore::new();
    RomSet::blank(&manifest)
        .expect("blank set")
        .save(&mut store, &manifest)
        .expect("save blank");

    let roms = RomSet::load(&store, &manifest).expect("load");
    let library = PatchLibrary::from_toml(PATCHES).expect("patches");
    let patches = library.select(&["clock-cutout"]).expect("select");

    let mut session = EncodeSession::after(&manifest, 0x100, 0).expect("session");
    let fields = session
        .encode(&colour_bars(Standard::Pal), &digital(), &patches, None)
        .expect("encode");
    assert_eq!(fields.len(), 1);
    // bars, grey band, two patched lines
    assert_eq!(fields[0].slot_count(), 4);

    let out = write_back(&roms, &manifest, &fields).expect("write back");
    out.save(&mut store, &manifest).expect("save");

    let reloaded = RomSet::load(&store, &manifest).expect("reload");
    assert_eq!(reloaded, out);

    let planes = SamplePlanes::from_rom_set(&reloaded).expect("planes");
    let mut decode = DecodeSession::open(&planes, &reloaded, &manifest, 0).expect("decode");
    let luma = decode.assemble(Component::Luma, None).expect("luma");
    assert_eq!(luma.width, 1024);
    assert_eq!(luma.height, 578);

    // output line 2 holds field A entry 1: captured line 0, the bars
    let row = luma.row(2);
    assert_eq!(row[0], 724);
    // last bar: round(176 * 560 / 876) + 164
    assert_eq!(row[1023], 277);

    // captured line 40 is field A line 20 → entry 21 → output line 42
    let patched = luma.row(42);
    assert_eq!(&patched[600..604], &[164, 164, 164, 164]);
    assert_ne!(patched[599], 164);

    // captured line 200 (grey) → entry 101 → output line 202
    assert!(luma.row(202).iter().all(|&s| s == 412));

    let ry = decode.assemble(Component::RY, None).expect("ry");
    assert_eq!(ry.width, 512);
    assert_eq!(ry.row(2)[0], 128);
}

#[test]
fn test_decode_is_deterministic() {
    let manifest = manifest("ntsc", 1461);
    let roms = RomSet::blank(&manifest).expect("blank");
    let mut session = EncodeSession::after(&manifest, 0, 0).expect("session");
    let fields = session
        .encode(
            &colour_bars(Standard::Ntsc),
            &digital(),
            &Default::default(),
            None,
        )
        .expect("encode");
    let out = write_back(&roms, &manifest, &fields).expect("write back");

    let planes = SamplePlanes::from_rom_set(&out).expect("planes");
    let first = DecodeSession::open(&planes, &out, &manifest, 0)
        .and_then(|mut s| s.frame_raster())
        .expect("first decode");
    let second = DecodeSession::open(&planes, &out, &manifest, 0)
        .and_then(|mut s| s.frame_raster())
        .expect("second decode");
    assert_eq!(first, second);

    // synthesized blank line on top
    let luma = DecodeSession::open(&planes, &out, &manifest, 0)
        .and_then(|mut s| s.assemble(Component::Luma, None))
        .expect("luma");
    assert!(luma.row(0).iter().all(|&s| s == LUMA_BLANK));
}

#[test]
fn test_chained_fields_and_donor() {
    let manifest = manifest("pal", 1734);
    let roms = RomSet::blank(&manifest).expect("blank");
    let mut session = EncodeSession::after(&manifest, 0, 0).expect("session");

    let first = session
        .encode(&colour_bars(Standard::Pal), &digital(), &Default::default(), None)
        .expect("first pattern");
    let staged = write_back(&roms, &manifest, &first).expect("stage");

    // take the back porch of field 0's bars line as donor for the next pattern
    let planes = SamplePlanes::from_rom_set(&staged).expect("planes");
    let donor = DecodeSession::open(&planes, &staged, &manifest, 0)
        .and_then(|mut s| s.back_porch_donor(1))
        .expect("donor");

    let anti_pal = EncodeOptions {
        anti_pal: true,
        ..digital()
    };
    let second = session
        .encode(&colour_bars(Standard::Pal), &anti_pal, &Default::default(), Some(&donor))
        .expect("second pattern");
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].field_index, 1);
    assert_eq!(second[1].field_index, 2);
    assert_eq!(second[0].start_offset, first[0].next_offset);

    let mut fields = first;
    fields.extend(second);
    let out = write_back(&roms, &manifest, &fields).expect("write back");

    let planes = SamplePlanes::from_rom_set(&out).expect("planes");
    for field in 0..3 {
        let mut decode = DecodeSession::open(&planes, &out, &manifest, field).expect("decode");
        let luma = decode.assemble(Component::Luma, None).expect("luma");
        assert_eq!(luma.row(2)[1023], 277, "field {}", field);
    }

    // R-Y flips around 128 between the anti-PAL fields
    let ry_a = DecodeSession::open(&planes, &out, &manifest, 1)
        .and_then(|mut s| s.assemble(Component::RY, None))
        .expect("ry a");
    let ry_b = DecodeSession::open(&planes, &out, &manifest, 2)
        .and_then(|mut s| s.assemble(Component::RY, None))
        .expect("ry b");
    let x = 128 + 2 * 64 + 8;
    assert_eq!(ry_a.row(2)[x] as i32 - 128, 128 - ry_b.row(2)[x] as i32);
}

/// Encode colour bars into field 0, write them back, decode the field and
/// compare every captured line's centre with the level mapping
fn assert_centre_survives(manifest: &RomManifest) {
    let standard = manifest.standard;
    let g = standard.geometry();
    let roms = RomSet::blank(manifest).expect("blank");
    let mut session = EncodeSession::after(manifest, 0, 0).expect("session");
    let fields = session
        .encode(&colour_bars(standard), &digital(), &Default::default(), None)
        .expect("encode");
    let out = write_back(&roms, manifest, &fields).expect("write back");

    let planes = SamplePlanes::from_rom_set(&out).expect("planes");
    let luma = DecodeSession::open(&planes, &out, manifest, 0)
        .and_then(|mut s| s.assemble(Component::Luma, None))
        .expect("luma");
    assert_eq!(luma.height, g.output_lines());

    let order = g.output_order();
    let (back, centre, _) = g.segments(Component::Luma.roms_per_component());
    let profile = digital().profile;
    for line in 0..g.capture_lines() {
        let entry = g.vector_indices(line)[0];
        let row = order
            .iter()
            .position(|l| *l == OutputLine::Vector(entry))
            .expect("captured line is displayed");
        let samples = luma.row(row);
        for x in back..back + centre {
            assert_eq!(
                samples[x] as i64,
                map_luma(bars_luma(line, x), &profile),
                "{} captured line {} sample {}",
                standard,
                line,
                x
            );
        }
    }
}

#[test]
fn test_pal_m_round_trip() {
    let manifest = manifest("pal-m", 1446);
    assert_centre_survives(&manifest);
}

#[test]
fn test_pal_wide_round_trip() {
    let manifest = manifest_with_plane("pal-wide", 1 << 19, 1152);
    assert_centre_survives(&manifest);
}

#[test]
fn test_donor_error_names_field() {
    let manifest = manifest("pal", 1734);
    let roms = RomSet::blank(&manifest).expect("blank");
    let planes = SamplePlanes::from_rom_set(&roms).expect("planes");

    let mut session = DecodeSession::open(&planes, &roms, &manifest, 1).expect("decode");
    match session.back_porch_donor(5000) {
        Err(CodecError::MissingVector { field, index }) => {
            assert_eq!(field, 1);
            assert_eq!(index, 5000);
        }
        other => panic!("expected missing vector, got {:?}", other),
    }
}
