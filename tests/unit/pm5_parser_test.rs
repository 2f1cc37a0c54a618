//! Unit tests for PM5 rowing status frame decoding.

use rustrow::sensors::pm5::{decode, DecodeError, RowingMetrics, FRAME_LEN};

/// stroke_state=4, stroke_rate=30, distance=10000 m, elapsed=10.00 s,
/// power=150 W, calories=50
const REFERENCE_FRAME: [u8; 11] = [4, 30, 0x10, 0x27, 0x00, 0xE8, 0x03, 0x96, 0x00, 0x32, 0x00];

fn reference_metrics() -> RowingMetrics {
    RowingMetrics {
        stroke_state: 4,
        stroke_rate: 30,
        distance_meters: 10_000,
        elapsed_time_seconds: 10.0,
        power_watts: 150,
        calories_burned: 50,
    }
}

#[test]
fn test_decode_reference_frame() {
    assert_eq!(decode(&REFERENCE_FRAME).unwrap(), reference_metrics());
}

#[test]
fn test_decode_is_deterministic() {
    let first = decode(&REFERENCE_FRAME).unwrap();
    let second = decode(&REFERENCE_FRAME).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_decode_all_zero_frame() {
    let metrics = decode(&[0u8; 11]).unwrap();

    assert_eq!(metrics.stroke_state, 0);
    assert_eq!(metrics.distance_meters, 0);
    assert_eq!(metrics.elapsed_time_seconds, 0.0);
    assert_eq!(metrics.power_watts, 0);
}

#[test]
fn test_decode_all_ones_frame() {
    let metrics = decode(&[0xFF; 11]).unwrap();

    assert_eq!(metrics.stroke_state, 255);
    assert_eq!(metrics.stroke_rate, 255);
    assert_eq!(metrics.distance_meters, 0x00FF_FFFF);
    assert!((metrics.elapsed_time_seconds - 655.35).abs() < 1e-9);
    assert_eq!(metrics.power_watts, u16::MAX);
    assert_eq!(metrics.calories_burned, u16::MAX);
}

#[test]
fn test_decode_fields_are_little_endian() {
    // Each multi-byte field gets a distinct low/high byte
    let data = [1, 2, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
    let metrics = decode(&data).unwrap();

    assert_eq!(metrics.distance_meters, 0x0003_0201);
    assert_eq!(metrics.elapsed_time_centiseconds(), 0x0504);
    assert_eq!(metrics.power_watts, 0x0706);
    assert_eq!(metrics.calories_burned, 0x0908);
}

#[test]
fn test_decode_hundredths_resolution() {
    // 1234 centiseconds = 12.34 s
    let mut data = [0u8; 11];
    data[5..7].copy_from_slice(&1234u16.to_le_bytes());
    let metrics = decode(&data).unwrap();

    assert!((metrics.elapsed_time_seconds - 12.34).abs() < 1e-9);
}

#[test]
fn test_decode_every_short_length_rejected() {
    for len in 0..FRAME_LEN {
        let err = decode(&REFERENCE_FRAME[..len]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ShortBuffer {
                expected: FRAME_LEN,
                actual: len
            }
        );
    }
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let mut padded = REFERENCE_FRAME.to_vec();
    padded.extend_from_slice(&[0xAB, 0xCD]);

    assert_eq!(padded.len(), 13);
    assert_eq!(decode(&padded).unwrap(), reference_metrics());
}

#[test]
fn test_short_buffer_message() {
    let err = decode(&[1, 2, 3]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "frame too short: expected at least 11 bytes, got 3"
    );
}
