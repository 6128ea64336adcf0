//! Tests for frame classification.

use bytes::Bytes;
use rstest::rstest;

use super::*;

const PNG_BODY: &[u8] = b"PNG\r\n\x1a\n\0\0\0\rIHDR";

fn binary(header: &str, payload: &[u8]) -> RawFrame {
    let mut bytes = header.as_bytes().to_vec();
    bytes.push(b'\n');
    bytes.extend_from_slice(payload);
    RawFrame::Binary(Bytes::from(bytes))
}

#[test]
fn plain_text_routes_on_whole_string() {
    let decoded = decode(RawFrame::from("invalidatetiles: part=0\nmore"));
    assert_eq!(decoded.frame.header(), "invalidatetiles: part=0\nmore");
    assert!(decoded.frame.payload().is_none());
    assert!(decoded.pending.is_none());
}

#[rstest]
#[case("tile:")]
#[case("tilecombine:")]
#[case("rendersearchlist:")]
#[case("zstdslidelayer:")]
fn image_prefixed_text_splits_at_newline(#[case] prefix: &str) {
    let decoded = decode(RawFrame::from(format!("{prefix} part=0\nabc")));
    assert_eq!(decoded.frame.header(), format!("{prefix} part=0"));
    assert_eq!(decoded.frame.payload().map(|p| &p[..]), Some(&b"abc"[..]));
}

#[test]
fn binary_header_ends_at_first_newline() {
    let decoded = decode(binary("delta: part=0 nviewid=0", b"\x01\x02\n\x03"));
    assert_eq!(decoded.frame.header(), "delta: part=0 nviewid=0");
    assert_eq!(
        decoded.frame.payload().map(|p| &p[..]),
        Some(&b"\x01\x02\n\x03"[..])
    );
    assert!(decoded.frame.is_binary());
}

#[rstest]
#[case("tile: part=0", true)]
#[case("delta: part=0", false)]
fn non_png_tile_payload_is_raw(#[case] header: &str, #[case] keyframe: bool) {
    let decoded = decode(binary(header, b"\x28\xb5\x2f\xfd"));
    match decoded.frame.image() {
        Some(FrameImage::Raw { keyframe: k, data }) => {
            assert_eq!(*k, keyframe);
            assert_eq!(&data[..], b"\x28\xb5\x2f\xfd");
        }
        other => panic!("expected raw image, got {other:?}"),
    }
    assert!(decoded.frame.is_complete());
}

#[test]
fn png_tile_settles_immediately() {
    let decoded = decode(binary("tile: part=0", PNG_BODY));
    assert!(decoded.pending.is_none());
    assert!(decoded.frame.is_complete());
    let Some(FrameImage::Png(handle)) = decoded.frame.image() else {
        panic!("expected png image");
    };
    assert!(handle.data_url().is_some());
}

#[rstest]
#[case("renderfont: font=Sans")]
#[case("slidelayer: {}")]
#[case("windowpaint: id=3")]
fn other_png_kinds_decode_later(#[case] header: &str) {
    let decoded = decode(binary(header, PNG_BODY));
    assert!(!decoded.frame.is_complete());
    let pending = decoded.pending.expect("pending decode");
    pending.run();
    assert!(decoded.frame.is_complete());
}

#[test]
fn nopng_marker_disables_image_handling() {
    let decoded = decode(binary("windowpaint: id=3 nopng", PNG_BODY));
    assert!(decoded.frame.image().is_none());
    assert!(decoded.frame.is_complete());
}

#[test]
fn non_image_binary_routes_on_full_body() {
    let decoded = decode(binary("jsdialog: {\"a\":1}", b"tail"));
    assert_eq!(decoded.frame.message_text(), "jsdialog: {\"a\":1}\ntail");
}

#[rstest]
#[case("short", 10, "short")]
#[case("abcdefghij", 4, "abcd...")]
#[case("h\u{e9}llo", 2, "h\u{e9}...")]
fn loggable_truncates_on_char_boundaries(
    #[case] text: &str,
    #[case] limit: usize,
    #[case] expected: &str,
) {
    assert_eq!(loggable(text, limit), expected);
}
