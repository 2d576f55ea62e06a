use super::*;

#[test]
fn overrides_replace_only_set_fields() {
    let computed = Streams::new(1, 2, 30.0);
    let ov = StreamOverrides {
        audio: Some(0),
        ..StreamOverrides::default()
    };
    assert_eq!(ov.apply(computed), Streams::new(1, 0, 30.0));
    assert_eq!(StreamOverrides::default().apply(computed), computed);
    assert!(StreamOverrides::default().is_empty());
    assert!(!ov.is_empty());
}

#[test]
fn durations_are_clamped_non_negative() {
    assert_eq!(Streams::new(1, 1, -4.0).duration, 0.0);
    assert_eq!(Streams::new(1, 1, f64::NAN).duration, 0.0);
    assert_eq!(Streams::new(1, 1, 2.5).duration, 2.5);
}

#[test]
fn numbers_format_without_trailing_zeroes() {
    assert_eq!(fmt_num(3.0), "3");
    assert_eq!(fmt_num(0.5), "0.5");
    assert_eq!(fmt_num(80.0), "80");
}

#[test]
fn kind_specifiers() {
    assert_eq!(StreamKind::Video.specifier(), 'v');
    assert_eq!(StreamKind::Audio.specifier(), 'a');
    assert_eq!(StreamKind::Audio.to_string(), "audio");
}
