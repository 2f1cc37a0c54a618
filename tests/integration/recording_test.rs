//! End-to-end tests of CSV logging and offline translation.

use super::transport_mock::{
    fast_config, frame_with_distance, pm5_handle, ReadStep, ScriptedTransport,
};
use chrono::Utc;
use rustrow::acquisition::AcquisitionLoop;
use rustrow::recording::log_format::{decode_hex, DecodedRow, RawRow};
use rustrow::recording::sink::{generate_log_paths, CsvFrameSink};
use rustrow::recording::translator::{translate_file, TranslateError};
use rustrow::sensors::pm5::decode;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use tokio::sync::watch;

/// Record a scripted session into fresh logs under `dir`.
async fn record_session(dir: &Path, reads: Vec<ReadStep>) -> (PathBuf, PathBuf) {
    let paths = generate_log_paths(dir, &Utc::now());
    let mut sink = CsvFrameSink::create(&paths.raw, &paths.decoded).unwrap();
    let (tx, mut rx) = watch::channel(false);
    let transport = ScriptedTransport::new(reads).cancel_when_done(tx);

    AcquisitionLoop::new(transport, fast_config())
        .run(&pm5_handle(), &mut sink, &mut rx)
        .await
        .unwrap();

    (paths.raw, paths.decoded)
}

#[tokio::test]
async fn test_logs_written_with_headers_and_rows() {
    let dir = tempdir().unwrap();
    let (raw_path, decoded_path) = record_session(
        dir.path(),
        vec![
            ReadStep::Frame(frame_with_distance(100)),
            ReadStep::Frame(vec![0x00, 0x01]),
            ReadStep::Frame(frame_with_distance(200)),
        ],
    )
    .await;

    let raw = std::fs::read_to_string(&raw_path).unwrap();
    assert!(raw.starts_with("Timestamp,Raw Data\n"));
    let raw_rows: Vec<RawRow> = csv::Reader::from_path(&raw_path)
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(raw_rows.len(), 3);
    assert_eq!(raw_rows[1].raw_data, "0001");
    assert_eq!(decode_hex(&raw_rows[0].raw_data).unwrap(), frame_with_distance(100));

    let decoded = std::fs::read_to_string(&decoded_path).unwrap();
    assert!(decoded.starts_with(
        "Timestamp,stroke_state,stroke_rate,distance_meters,elapsed_time_seconds,power_watts,calories_burned\n"
    ));
    let decoded_rows: Vec<DecodedRow> = csv::Reader::from_path(&decoded_path)
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(decoded_rows.len(), 2);
    assert_eq!(decoded_rows[0].timestamp, raw_rows[0].timestamp);
    assert_eq!(decoded_rows[1].timestamp, raw_rows[2].timestamp);
    assert_eq!(decoded_rows[1].distance_meters, 200);
    assert!((decoded_rows[1].elapsed_time_seconds - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_offline_translation_matches_live_log() {
    let dir = tempdir().unwrap();
    let reads = (0..10)
        .map(|n| {
            if n == 4 {
                ReadStep::Frame(vec![9; 8])
            } else {
                ReadStep::Frame(frame_with_distance(n * 37))
            }
        })
        .collect();
    let (raw_path, decoded_path) = record_session(dir.path(), reads).await;

    let translated_path = dir.path().join("translated.csv");
    let summary = translate_file(&raw_path, &translated_path).unwrap();

    assert_eq!(summary.rows_read, 10);
    assert_eq!(summary.rows_decoded, 9);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(
        std::fs::read_to_string(&translated_path).unwrap(),
        std::fs::read_to_string(&decoded_path).unwrap()
    );
}

#[test]
fn test_translate_uses_frame_codec() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("raw.csv");
    let output = dir.path().join("decoded.csv");
    std::fs::write(
        &input,
        "Timestamp,Raw Data\n1700000000.5,041e102700e80396003200\n",
    )
    .unwrap();

    translate_file(&input, &output).unwrap();

    let rows: Vec<DecodedRow> = csv::Reader::from_path(&output)
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    let expected = decode(&decode_hex("041e102700e80396003200").unwrap()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, "1700000000.5");
    assert_eq!(rows[0].stroke_state, expected.stroke_state);
    assert_eq!(rows[0].power_watts, expected.power_watts);
    assert_eq!(rows[0].calories_burned, expected.calories_burned);
}

#[test]
fn test_translate_missing_input() {
    let dir = tempdir().unwrap();
    let err = translate_file(&dir.path().join("absent.csv"), &dir.path().join("out.csv"))
        .unwrap_err();
    assert!(matches!(err, TranslateError::Io(_)));
}

#[test]
fn test_translate_refuses_to_overwrite_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("raw.csv");
    let contents = "Timestamp,Raw Data\nt1,041e102700e80396003200\n";
    std::fs::write(&input, contents).unwrap();

    let same = dir.path().join(".").join("raw.csv");
    let err = translate_file(&input, &same).unwrap_err();

    assert!(matches!(err, TranslateError::SameFile(_)));
    assert_eq!(std::fs::read_to_string(&input).unwrap(), contents);
}
