use super::*;
use crate::{
    compile::compiler::Compiler,
    probe::ffprobe::StaticProbe,
    recipe::document::{Recipe, SectionKeys},
    resolve::resolver::Resolver,
};

fn build(src: &str) -> FfmpegCommand {
    let t = Recipe::from_yaml_str(src)
        .unwrap()
        .normalize("all", SectionKeys::default())
        .unwrap();
    let mut p = StaticProbe::new()
        .with("a.mkv", 1, 1, 120.0)
        .with("b.mkv", 1, 1, 60.0);
    let mut r = Resolver::new(&t.graph, &mut p);
    r.resolve(t.root).unwrap();
    let res = r.finish();
    let compiled = Compiler::new(&t.graph, &res).finish(t.root).unwrap();
    assemble(compiled, &["-y".to_string()], &["out.mkv".to_string()], "ffmpeg")
}

#[test]
fn arguments_follow_fixed_order() {
    let cmd = build("all: [a.mkv, b.mkv]");
    assert_eq!(
        cmd.argv(),
        vec![
            "ffmpeg",
            "-y",
            "-i",
            "a.mkv",
            "-i",
            "b.mkv",
            "-filter_complex",
            "[0:v:0][0:a:0][1:v:0][1:a:0]concat=n=2:v=1:a=1[f0][f1]",
            "-map",
            "[f0]",
            "-map",
            "[f1]",
            "out.mkv",
        ]
    );
}

#[test]
fn empty_graph_omits_filter_complex() {
    let cmd = build("all: a.mkv");
    assert_eq!(
        cmd.args,
        vec!["-y", "-i", "a.mkv", "-map", "0:v:0", "-map", "0:a:0", "out.mkv"]
    );
}

#[test]
fn shared_filter_output_is_split() {
    let cmd = build(
        "intro: {file: a.mkv, duration: 5}\n\
         all: [{ref: intro}, {ref: intro}]\n",
    );
    let graph = &cmd.args[cmd.args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
    assert_eq!(
        graph,
        "[0:v:0]trim=duration=5,setpts=PTS-STARTPTS[f0];[f0]split=2[f4][f5];\
         [0:a:0]atrim=duration=5,asetpts=PTS-STARTPTS[f1];[f1]asplit=2[f6][f7];\
         [f4][f6][f5][f7]concat=n=2:v=1:a=1[f2][f3]"
    );
}

#[test]
fn display_quotes_shell_metacharacters() {
    let cmd = FfmpegCommand {
        program: "ffmpeg".into(),
        args: vec![
            "-i".into(),
            "my clip.mkv".into(),
            "-filter_complex".into(),
            "[0:v:0]null[f0]".into(),
            "it's.mkv".into(),
        ],
    };
    assert_eq!(
        cmd.to_string(),
        r#"ffmpeg -i 'my clip.mkv' -filter_complex '[0:v:0]null[f0]' 'it'\''s.mkv'"#
    );
}

#[test]
fn shell_quote_leaves_plain_words() {
    assert_eq!(shell_quote("-loglevel"), "-loglevel");
    assert_eq!(shell_quote("out/final.mkv"), "out/final.mkv");
    assert_eq!(shell_quote(""), "''");
}

#[test]
fn stream_dropped_by_concat_arity_is_sunk() {
    let cmd = build("all: {concat: {inputs: [{file: a.mkv, start: 1}, b.mkv], a: 0}}");
    let graph = &cmd.args[cmd.args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
    assert_eq!(
        graph,
        "[0:v:0]trim=start=1,setpts=PTS-STARTPTS[f0];\
         [0:a:0]atrim=start=1,asetpts=PTS-STARTPTS[f1];[f1]anullsink;\
         [f0][1:v:0]concat=n=2:v=1:a=0[f2]"
    );
    assert_eq!(cmd.args[cmd.args.len() - 3..], ["-map", "[f2]", "out.mkv"]);
}
