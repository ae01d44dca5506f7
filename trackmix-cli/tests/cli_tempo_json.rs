use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_clicks(path: &Path, sample_rate: u32, bpm: f64, seconds: f64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let period = (sample_rate as f64 * 60.0 / bpm) as usize;
    let burst = sample_rate as usize / 100;
    let total = (sample_rate as f64 * seconds) as usize;
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..total {
        let offset = i % period;
        let sample = if offset < burst {
            let sign = if offset % 2 == 0 { 1 } else { -1 };
            sign * (20_000 - (offset * 20_000 / burst) as i32)
        } else {
            0
        };
        writer.write_sample(sample as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn tempo_prints_json_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    write_clicks(&path, 22_050, 120.0, 8.0);

    let output = Command::new(assert_cmd::cargo::cargo_bin!("trackmix"))
        .arg("tempo")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"bpm\":"))
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let bpm = value["bpm"].as_f64().unwrap();
    let confidence = value["confidence"].as_f64().unwrap();
    assert!((bpm - 120.0).abs() < 2.0, "bpm {}", bpm);
    assert!(confidence >= 0.3);
}

#[test]
fn tempo_falls_back_for_unreadable_input() {
    let dir = tempfile::tempdir().unwrap();
    Command::new(assert_cmd::cargo::cargo_bin!("trackmix"))
        .arg("tempo")
        .arg(dir.path().join("missing.wav"))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"bpm":120.0,"confidence":0.2}"#));
}
