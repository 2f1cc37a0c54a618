//! Unit tests for the raw log byte encoding.

use hex::FromHexError;
use rustrow::recording::log_format::{decode_hex, encode_hex};

#[test]
fn test_encode_reference_frame() {
    let bytes = [4u8, 30, 0x10, 0x27, 0x00, 0xE8, 0x03, 0x96, 0x00, 0x32, 0x00];
    assert_eq!(encode_hex(&bytes), "041e102700e80396003200");
}

#[test]
fn test_every_byte_value_survives() {
    let bytes: Vec<u8> = (0..=255).collect();
    let text = encode_hex(&bytes);

    assert_eq!(text.len(), 512);
    assert_eq!(decode_hex(&text).unwrap(), bytes);
}

#[test]
fn test_leading_zero_frames_keep_length() {
    let bytes = [0u8; 11];
    let decoded = decode_hex(&encode_hex(&bytes)).unwrap();
    assert_eq!(decoded.len(), 11);
}

#[test]
fn test_surrounding_whitespace_ignored() {
    assert_eq!(decode_hex("  0a0b \n").unwrap(), vec![0x0a, 0x0b]);
}

#[test]
fn test_debug_representation_is_rejected() {
    // A printed byte buffer must never be accepted as a payload
    let err = decode_hex("bytearray(b'\\x04')").unwrap_err();
    assert!(matches!(err, FromHexError::InvalidHexCharacter { .. }));
}

#[test]
fn test_non_ascii_payload_is_rejected() {
    assert!(matches!(
        decode_hex("\u{e9}"),
        Err(FromHexError::InvalidHexCharacter { index: 0, .. })
    ));
}
