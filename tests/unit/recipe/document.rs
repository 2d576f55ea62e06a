use super::*;

#[test]
fn sections_default_when_absent() {
    let r = Recipe::from_yaml_str("all: [a.mkv]").unwrap();
    let keys = SectionKeys::default();
    assert_eq!(r.flags(keys).unwrap(), DEFAULT_FLAGS.to_vec());
    assert_eq!(r.output(keys).unwrap(), vec![DEFAULT_OUTPUT.to_string()]);
    assert_eq!(r.targets(keys), vec!["all".to_string()]);
}

#[test]
fn sections_accept_scalars_and_sequences() {
    let src = r#"
flags: [-y, -hide_banner]
output: result.mp4
all: [a.mkv]
"#;
    let r = Recipe::from_yaml_str(src).unwrap();
    let keys = SectionKeys::default();
    assert_eq!(r.flags(keys).unwrap(), vec!["-y", "-hide_banner"]);
    assert_eq!(r.output(keys).unwrap(), vec!["result.mp4"]);
    assert_eq!(r.targets(keys), vec!["all".to_string()]);
}

#[test]
fn custom_section_keys() {
    let src = r#"
fast: [-preset, ultrafast, quick.mkv]
all: [a.mkv]
"#;
    let r = Recipe::from_yaml_str(src).unwrap();
    let keys = SectionKeys {
        flags: "flags",
        output: "fast",
    };
    assert_eq!(r.output(keys).unwrap(), vec!["-preset", "ultrafast", "quick.mkv"]);
    let err = r.normalize("fast", keys).unwrap_err();
    assert!(matches!(err, RecipeError::UnresolvedReference(_)));
}

#[test]
fn non_mapping_document_is_malformed() {
    let err = Recipe::from_yaml_str("- a.mkv").unwrap_err();
    assert!(matches!(err, RecipeError::MalformedNode { .. }));
}

#[test]
fn invalid_yaml_surfaces_as_other() {
    let err = Recipe::from_yaml_str("all: [a.mkv").unwrap_err();
    assert!(matches!(err, RecipeError::Other(_)));
}

#[test]
fn normalize_selects_target() {
    let r = Recipe::from_yaml_str("a: x.mkv\nb: [{ref: a}, y.mkv]").unwrap();
    let tree = r.normalize("b", SectionKeys::default()).unwrap();
    assert_eq!(tree.graph.len(), 3);
    assert_eq!(tree.root.index(), 2);
}
