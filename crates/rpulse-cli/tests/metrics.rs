use assert_cmd::Command;
use serde_json::Value;
use std::{error::Error, f64::consts::PI};

fn run_json(args: &[&str], stdin: Option<String>) -> Result<Value, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("rpulse")?;
    cmd.args(args);
    if let Some(input) = stdin {
        cmd.write_stdin(input);
    }
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

fn sine_text(freq: f64, fs: f64, seconds: f64) -> String {
    let n = (fs * seconds) as usize;
    (0..n)
        .map(|i| format!("{}\n", (2.0 * PI * freq * i as f64 / fs).sin()))
        .collect()
}

#[test]
fn rmssd_summary_from_stdin() -> Result<(), Box<dyn Error>> {
    let js = run_json(&["rmssd"], Some("1.0\n1.0\n1.0\n1.04\n1.0\n".into()))?;
    assert_eq!(js["n"], 5);
    let rmssd = js["rmssd_ms"].as_f64().expect("rmssd");
    assert!((rmssd - 28.28).abs() < 0.01, "rmssd {rmssd}");
    Ok(())
}

#[test]
fn rmssd_absent_for_two_intervals() -> Result<(), Box<dyn Error>> {
    let js = run_json(&["rmssd"], Some("0.8\n0.9\n".into()))?;
    assert!(js["rmssd_ms"].is_null());
    Ok(())
}

#[test]
fn focus_score_is_bounded() -> Result<(), Box<dyn Error>> {
    let js = run_json(&["focus", "--hr", "70", "--rmssd", "40"], None)?;
    assert_eq!(js["focus_score"], 50);
    let js = run_json(&["focus", "--hr", "200", "--rmssd", "1"], None)?;
    assert_eq!(js["focus_score"], 100);
    let js = run_json(
        &["focus", "--hr", "60", "--rmssd", "40", "--baseline-hr", "60"],
        None,
    )?;
    assert_eq!(js["focus_score"], 50);
    Ok(())
}

#[test]
fn spectrum_finds_72_bpm() -> Result<(), Box<dyn Error>> {
    let js = run_json(&["spectrum", "--fs", "30"], Some(sine_text(1.2, 30.0, 12.0)))?;
    let bpm = js["estimate"]["heart_rate_bpm"].as_f64().expect("bpm");
    assert!((bpm - 72.0).abs() <= 3.0, "bpm {bpm}");
    assert_eq!(js["spectrum"]["powers"].as_array().map(Vec::len), Some(120));

    let js = run_json(
        &["spectrum", "--fs", "30", "--method", "fft"],
        Some(sine_text(1.2, 30.0, 12.0)),
    )?;
    let bpm = js["estimate"]["heart_rate_bpm"].as_f64().expect("fft bpm");
    assert!((bpm - 72.0).abs() <= 6.0, "fft bpm {bpm}");
    Ok(())
}

#[test]
fn spectrum_rejects_empty_band() -> Result<(), Box<dyn Error>> {
    Command::cargo_bin("rpulse")?
        .args(["spectrum", "--f0", "3", "--f1", "1"])
        .write_stdin("1\n2\n")
        .assert()
        .failure();
    Ok(())
}
