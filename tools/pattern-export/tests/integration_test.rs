//! Integration tests for pattern-export

use pattern_codec::{CAPTURE_LINE_SAMPLES, RomPartRef};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pattern-export"))
}

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

fn write_hardware(dir: &Path) -> PathBuf {
    let mut text = String::from("standard = \"pal\"\nrevision = \"bench\"\n");
    for role in RomPartRef::ALL {
        let length = if role == RomPartRef::Cpu { 16384 } else { 1 << 16 };
        text.push_str(&format!(
            "\n[[part]]\nrole = \"{}\"\nfile = \"{}.bin\"\nlength = {}\n",
            role, role, length
        ));
        let roms = dir.join("roms");
        std::fs::create_dir_all(&roms).unwrap();
        std::fs::write(roms.join(format!("{}.bin", role)), vec![0u8; length]).unwrap();
    }
    text.push_str("\n[vector_table]\nstart = 0x1000\nlength = 1734\n");

    let path = dir.join("pal.toml");
    std::fs::write(&path, text).unwrap();
    path
}

/// Eight vertical bars on every PAL line, little-endian u16
fn write_bars(dir: &Path) {
    let lines = 576;
    let mut y = Vec::new();
    let mut ry = Vec::new();
    let mut by = Vec::new();
    for _ in 0..lines {
        for x in 0..CAPTURE_LINE_SAMPLES {
            let bar = (x / 128) as u16;
            y.extend_from_slice(&(940 - bar * 100).to_le_bytes());
            ry.extend_from_slice(&(512 + (bar % 3) * 100).to_le_bytes());
            by.extend_from_slice(&(512 - (bar % 2) * 100).to_le_bytes());
        }
    }
    let captures = dir.join("captures");
    std::fs::create_dir_all(&captures).unwrap();
    std::fs::write(captures.join("bars.y"), y).unwrap();
    std::fs::write(captures.join("bars.ry"), ry).unwrap();
    std::fs::write(captures.join("bars.by"), by).unwrap();
}

fn write_job(dir: &Path, patches: &[&str], donor: Option<usize>) -> PathBuf {
    write_hardware(dir);
    write_bars(dir);
    std::fs::write(dir.join("patches.toml"), PATCHES).unwrap();

    let names: Vec<String> = patches.iter().map(|p| format!("\"{}\"", p)).collect();
    let donor = donor
        .map(|d| format!("donor_line = {}\n", d))
        .unwrap_or_default();
    let job = format!(
        r#"
hardware = "pal.toml"
roms = "roms"
patches = "patches.toml"
{}
[output]
dir = "out"

[[pattern]]
name = "bars"
y = "captures/bars.y"
ry = "captures/bars.ry"
by = "captures/bars.by"
use_digital_factors = true
decimate_422 = true
patches = [{}]
"#,
        donor,
        names.join(", ")
    );
    let path = dir.join("job.toml");
    std::fs::write(&path, job).unwrap();
    path
}

#[test]
fn test_check_valid_job() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_job(dir.path(), &["clock-cutout"], None);

    let status = bin()
        .arg("check")
        .arg(&job)
        .status()
        .expect("Failed to run pattern-export");
    assert!(status.success(), "check should accept the job");
}

#[test]
fn test_check_rejects_missing_capture() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_job(dir.path(), &[], None);
    std::fs::remove_file(dir.path().join("captures/bars.by")).unwrap();

    let status = bin()
        .arg("check")
        .arg(&job)
        .status()
        .expect("Failed to run pattern-export");
    assert!(!status.success(), "check should fail without the B-Y capture");
}

#[test]
fn test_check_rejects_unknown_patch() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_job(dir.path(), &["no-such-patch"], None);

    let status = bin()
        .arg("check")
        .arg(&job)
        .status()
        .expect("Failed to run pattern-export");
    assert!(!status.success());
}

#[test]
fn test_build_then_decode() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_job(dir.path(), &["clock-cutout"], None);

    let status = bin()
        .arg("build")
        .arg(&job)
        .status()
        .expect("Failed to run pattern-export");
    assert!(status.success(), "build should succeed");

    let out = dir.path().join("out");
    for role in RomPartRef::ALL {
        assert!(out.join(format!("{}.bin", role)).exists(), "missing {}", role);
    }
    // input set untouched
    let cpu = std::fs::read(dir.path().join("roms/cpu.bin")).unwrap();
    assert!(cpu.iter().all(|&b| b == 0));

    let decoded = dir.path().join("decoded");
    let status = bin()
        .args(["decode", "--hardware"])
        .arg(dir.path().join("pal.toml"))
        .arg("--roms")
        .arg(&out)
        .args(["--field", "1", "--mark-column", "600", "--output"])
        .arg(&decoded)
        .status()
        .expect("Failed to run pattern-export");
    assert!(status.success(), "decode should succeed");

    let luma = std::fs::read(decoded.join("luma.raw")).unwrap();
    assert_eq!(luma.len(), 1024 * 578);
    assert_eq!(std::fs::read(decoded.join("ry.raw")).unwrap().len(), luma.len());
    // first bar maps to 724, shown >> 2
    assert_eq!(luma[2 * 1024], 181);
    // clock cutout on output line 42
    assert_eq!(luma[42 * 1024 + 600], 41);

    let raster: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(decoded.join("raster.json")).unwrap())
            .unwrap();
    assert_eq!(raster["standard"], "pal");
    assert_eq!(raster["width"], 1024);
    assert_eq!(raster["height"], 578);
    assert_eq!(raster["field"], 1);
    assert_eq!(raster["vectors"].as_array().map(Vec::len), Some(578));

    let stripes: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(decoded.join("stripes.json")).unwrap())
            .unwrap();
    assert_eq!(stripes["columns"][0], 600);
    // one segment per output line crosses column 600
    assert_eq!(stripes["stripes"].as_array().map(Vec::len), Some(578));
}

#[test]
fn test_build_with_donor_back_porch() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_job(dir.path(), &[], Some(1));

    let out = dir.path().join("elsewhere");
    let status = bin()
        .arg("build")
        .arg(&job)
        .arg("--output")
        .arg(&out)
        .status()
        .expect("Failed to run pattern-export");
    assert!(status.success(), "build should succeed");
    assert!(!dir.path().join("out").exists());

    let decoded = dir.path().join("decoded");
    let status = bin()
        .args(["decode", "--hardware"])
        .arg(dir.path().join("pal.toml"))
        .arg("--roms")
        .arg(&out)
        .args(["--field", "1", "--output"])
        .arg(&decoded)
        .status()
        .expect("Failed to run pattern-export");
    assert!(status.success());
    assert!(!decoded.join("stripes.json").exists());

    let luma = std::fs::read(decoded.join("luma.raw")).unwrap();
    // back porch copied from the blank board, centre holds the bars
    assert_eq!(luma[2 * 1024], 0);
    // third bar: round(676 * 560 / 876) + 164 = 596
    assert_eq!(luma[2 * 1024 + 256], 149);
}

#[test]
fn test_build_keeps_residual_bits() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_job(dir.path(), &[], None);

    // field 0, entry 5: residual bit 6 set, sequence pattern 0
    let cpu_path = dir.path().join("roms/cpu.bin");
    let mut cpu = std::fs::read(&cpu_path).unwrap();
    cpu[0x1000 + 5 * 3] = 0x40;
    std::fs::write(&cpu_path, cpu).unwrap();

    let status = bin()
        .arg("build")
        .arg(&job)
        .status()
        .expect("Failed to run pattern-export");
    assert!(status.success(), "build should succeed");

    let cpu = std::fs::read(dir.path().join("out/cpu.bin")).unwrap();
    let field1 = 0x1000 + 1734;
    assert_eq!(cpu[field1 + 5 * 3] & 0xFC, 0x40);
    assert_eq!(cpu[field1 + 4 * 3] & 0xFC, 0);
}

#[test]
fn test_vectors_lists_field() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_hardware(dir.path());

    let output = bin()
        .args(["vectors", "--hardware"])
        .arg(dir.path().join("pal.toml"))
        .arg("--roms")
        .arg(dir.path().join("roms"))
        .output()
        .expect("Failed to run pattern-export");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("578 vectors"), "unexpected output: {}", stdout);
}

#[test]
fn test_decode_missing_roms() {
    let dir = tempdir().expect("Failed to create temp dir");
    let hardware = write_hardware(dir.path());

    let status = bin()
        .args(["decode", "--hardware"])
        .arg(&hardware)
        .arg("--roms")
        .arg(dir.path().join("nowhere"))
        .arg("--output")
        .arg(dir.path().join("decoded"))
        .status()
        .expect("Failed to run pattern-export");
    assert!(!status.success());
    assert!(!dir.path().join("decoded").exists());
}
