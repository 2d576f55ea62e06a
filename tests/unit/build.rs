use super::*;
use crate::{foundation::error::RecipeError, probe::ffprobe::StaticProbe};

fn probe() -> StaticProbe {
    StaticProbe::new()
        .with("a.mkv", 1, 1, 120.0)
        .with("b.mkv", 1, 1, 60.0)
}

#[test]
fn sections_feed_flags_and_output() {
    let recipe = Recipe::from_yaml_str(
        "flags: [-y]\n\
         output: [-c:v, libx264, final.mp4]\n\
         all: a.mkv\n",
    )
    .unwrap();
    let cmd = compile_target(&recipe, &BuildOptions::default(), &mut probe()).unwrap();
    assert_eq!(
        cmd.args,
        vec!["-y", "-i", "a.mkv", "-map", "0:v:0", "-map", "0:a:0", "-c:v", "libx264", "final.mp4"]
    );
}

#[test]
fn defaults_apply_without_sections() {
    let recipe = Recipe::from_yaml_str("all: a.mkv").unwrap();
    let cmd = compile_target(&recipe, &BuildOptions::default(), &mut probe()).unwrap();
    assert_eq!(&cmd.args[..4], &["-y", "-loglevel", "warning", "-stats"]);
    assert_eq!(cmd.args.last().map(String::as_str), Some("out.mkv"));
}

#[test]
fn custom_section_keys_and_target() {
    let recipe = Recipe::from_yaml_str(
        "fast: [-y]\n\
         dest: short.mkv\n\
         short: {file: b.mkv, duration: 10}\n\
         all: [a.mkv, b.mkv]\n",
    )
    .unwrap();
    let opts = BuildOptions {
        target: "short".into(),
        flags_key: "fast".into(),
        output_key: "dest".into(),
        ffmpeg: "/opt/ffmpeg".into(),
        ..BuildOptions::default()
    };
    let cmd = compile_target(&recipe, &opts, &mut probe()).unwrap();
    assert_eq!(cmd.program, "/opt/ffmpeg");
    assert_eq!(cmd.args[0], "-y");
    assert_eq!(cmd.args.last().map(String::as_str), Some("short.mkv"));
    assert!(!cmd.args.contains(&"a.mkv".to_string()));
}

#[test]
fn repeated_files_are_probed_once() {
    let recipe = Recipe::from_yaml_str("all: [a.mkv, {file: a.mkv, start: 3}, a.mkv]").unwrap();
    let mut p = probe();
    let cmd = compile_target(&recipe, &BuildOptions::default(), &mut p).unwrap();
    assert_eq!(p.calls("a.mkv"), 1);
    assert_eq!(cmd.args.iter().filter(|a| *a == "-i").count(), 1);
}

#[test]
fn dry_build_announces_without_running() {
    let recipe = Recipe::from_yaml_str("all: a.mkv").unwrap();
    let opts = BuildOptions {
        dry: true,
        ffmpeg: "ffrecipe-definitely-not-installed".into(),
        ..BuildOptions::default()
    };
    let mut seen = None;
    let cmd = build(&recipe, &opts, &mut probe(), |c| seen = Some(c.clone())).unwrap();
    assert_eq!(seen, Some(cmd));
}

#[test]
fn failing_probe_names_the_file() {
    let recipe = Recipe::from_yaml_str("all: [a.mkv, missing.mkv]").unwrap();
    let err = compile_target(&recipe, &BuildOptions::default(), &mut probe()).unwrap_err();
    match err {
        RecipeError::ProbeFailure { path, .. } => assert_eq!(path, "missing.mkv"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_target_is_unresolved() {
    let recipe = Recipe::from_yaml_str("all: a.mkv").unwrap();
    let opts = BuildOptions {
        target: "nope".into(),
        ..BuildOptions::default()
    };
    assert!(matches!(
        compile_target(&recipe, &opts, &mut probe()),
        Err(RecipeError::UnresolvedReference(name)) if name == "nope"
    ));
}
