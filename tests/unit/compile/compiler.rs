use super::*;
use crate::{
    probe::ffprobe::StaticProbe,
    recipe::document::{EditTree, Recipe, SectionKeys},
    resolve::resolver::Resolver,
};

fn probe() -> StaticProbe {
    StaticProbe::new()
        .with("a.mkv", 1, 1, 120.0)
        .with("b.mkv", 1, 2, 30.0)
        .with("still.mkv", 1, 0, 10.0)
        .with("music.mp3", 0, 1, 200.0)
}

fn tree(src: &str) -> EditTree {
    Recipe::from_yaml_str(src)
        .unwrap()
        .normalize("all", SectionKeys::default())
        .unwrap()
}

fn resolved(t: &EditTree) -> Resolution {
    let mut p = probe();
    let mut r = Resolver::new(&t.graph, &mut p);
    r.resolve(t.root).unwrap();
    r.finish()
}

fn compile(src: &str) -> RecipeResult<CompiledGraph> {
    let t = tree(src);
    let res = resolved(&t);
    Compiler::new(&t.graph, &res).finish(t.root)
}

fn rendered(src: &str) -> String {
    compile(src).unwrap().graph.render()
}

fn names(labels: &[Label]) -> Vec<&str> {
    labels.iter().map(Label::name).collect()
}

#[test]
fn bare_source_maps_input_streams_without_segments() {
    let c = compile("all: a.mkv").unwrap();
    assert_eq!(c.inputs, vec!["a.mkv"]);
    assert!(c.graph.is_empty());
    assert_eq!(names(&c.outputs.video), vec!["0:v:0"]);
    assert_eq!(names(&c.outputs.audio), vec!["0:a:0"]);
}

#[test]
fn concat_takes_minimum_streams_from_each_child() {
    let c = compile("all: [a.mkv, b.mkv]").unwrap();
    assert_eq!(c.inputs, vec!["a.mkv", "b.mkv"]);
    assert_eq!(
        c.graph.render(),
        "[0:v:0][0:a:0][1:v:0][1:a:0]concat=n=2:v=1:a=1[f0][f1]"
    );
    assert_eq!(names(&c.outputs.all()), vec!["f0", "f1"]);
}

#[test]
fn audio_override_drops_audio_from_concat() {
    let c = compile("all: {concat: {inputs: [a.mkv, b.mkv], a: 0}}").unwrap();
    assert_eq!(c.graph.render(), "[0:v:0][1:v:0]concat=n=2:v=1:a=0[f0]");
    assert!(c.outputs.audio.is_empty());
}

#[test]
fn trimmed_source_emits_trim_segments() {
    assert_eq!(
        rendered("all: {file: a.mkv, start: 80, duration: 15}"),
        "[0:v:0]trim=start=80:duration=15,setpts=PTS-STARTPTS[f0];\
         [0:a:0]atrim=start=80:duration=15,asetpts=PTS-STARTPTS[f1]"
    );
}

#[test]
fn speed_retimes_video_and_passes_audio_through() {
    let expected = "[0:v:0]setpts=PTS*0.5[f0];[0:a:0]anull[f1]";
    assert_eq!(rendered("all: {file: a.mkv, speed: 2x}"), expected);
    assert_eq!(rendered("all: {file: a.mkv, speed: 60}"), expected);
}

#[test]
fn tempo_and_scale_touch_only_their_domain() {
    assert_eq!(
        rendered("all: {file: a.mkv, scale: 640x360, tempo: 2x}"),
        "[0:v:0]scale=640:360[f0];[0:a:0]anull[f1];[f0]null[f2];[f1]atempo=2[f3]"
    );
}

#[test]
fn fades_on_a_source_use_the_running_duration() {
    assert_eq!(
        rendered("all: {file: b.mkv, start: 0, duration: 10, fadeout: 2}"),
        "[0:v:0]trim=start=0:duration=10,setpts=PTS-STARTPTS[f0];\
         [0:a:0]atrim=start=0:duration=10,asetpts=PTS-STARTPTS[f1];\
         [0:a:1]atrim=start=0:duration=10,asetpts=PTS-STARTPTS[f2];\
         [f0]fade=out:start_time=8:duration=2[f3];\
         [f1]afade=out:start_time=8:duration=2[f4];\
         [f2]afade=out:start_time=8:duration=2[f5]"
    );
}

#[test]
fn generic_filter_defaults_to_video() {
    let c = compile("all: {file: a.mkv, filters: [hflip, {filter: {name: volume, args: 2, type: a}}]}")
        .unwrap();
    assert_eq!(
        c.graph.render(),
        "[0:v:0]hflip[f0];[0:a:0]anull[f1];[f0]null[f2];[f1]volume=2[f3]"
    );
}

#[test]
fn generic_filter_audio_alternate_name() {
    assert_eq!(
        rendered("all: {file: a.mkv, filters: [{filter: {name: reverse, aname: areverse, type: av}}]}"),
        "[0:v:0]reverse[f0];[0:a:0]areverse[f1]"
    );
}

#[test]
fn concat_fades_chain_after_the_join() {
    assert_eq!(
        rendered("all: {concat: {inputs: [a.mkv, b.mkv], fadein: 2, fadeout: 3}}"),
        "[0:v:0][0:a:0][1:v:0][1:a:0]concat=n=2:v=1:a=1[f0][f1];\
         [f0]fade=in:duration=2[f2];[f1]afade=in:duration=2[f3];\
         [f2]fade=out:start_time=147:duration=3[f4];\
         [f3]afade=out:start_time=147:duration=3[f5]"
    );
}

#[test]
fn concat_addaudio_replaces_audio_with_mix_output() {
    let c = compile("all: {concat: {inputs: [a.mkv, a.mkv], addaudio: music.mp3}}").unwrap();
    assert_eq!(c.inputs, vec!["a.mkv", "music.mp3"]);
    assert_eq!(
        c.graph.render(),
        "[0:v:0][0:a:0][0:v:0][0:a:0]concat=n=2:v=1:a=1[f0][f1];\
         [f1][1:a:0]amix=inputs=2:duration=first[f2]"
    );
    assert_eq!(names(&c.outputs.video), vec!["f0"]);
    assert_eq!(names(&c.outputs.audio), vec!["f2"]);
}

#[test]
fn mix_options_replace_defaults() {
    assert_eq!(
        rendered("all: {addaudio: {input: a.mkv, audio: music.mp3, kwargs: {duration: longest, weights: '1 0.3'}}}"),
        "[0:a:0][1:a:0]amix=inputs=2:duration=longest:weights=1 0.3[f0]"
    );
}

#[test]
fn single_aux_stream_mixes_into_every_primary_stream() {
    let c = compile("all: {addaudio: [b.mkv, music.mp3]}").unwrap();
    assert_eq!(
        c.graph.render(),
        "[0:a:0][1:a:0]amix=inputs=2:duration=first[f0];\
         [0:a:1][1:a:0]amix=inputs=2:duration=first[f1]"
    );
    assert_eq!(names(&c.outputs.video), vec!["0:v:0"]);
}

#[test]
fn silent_primary_adopts_aux_audio() {
    let c = compile("all: {addaudio: [still.mkv, music.mp3]}").unwrap();
    assert!(c.graph.is_empty());
    assert_eq!(names(&c.outputs.all()), vec!["0:v:0", "1:a:0"]);
}

#[test]
fn aux_without_audio_is_out_of_range() {
    let err = compile("all: {addaudio: [a.mkv, still.mkv]}").unwrap_err();
    assert!(matches!(
        err,
        RecipeError::StreamIndexOutOfRange {
            kind: StreamKind::Audio,
            index: 0,
            available: 0,
            ..
        }
    ));
}

#[test]
fn unpaired_aux_streams_are_out_of_range() {
    let err = compile("all: {addaudio: [a.mkv, b.mkv]}").unwrap_err();
    match err {
        RecipeError::StreamIndexOutOfRange {
            node,
            kind,
            index,
            available,
        } => {
            assert_eq!(node, "all.addaudio");
            assert_eq!(kind, StreamKind::Audio);
            assert_eq!((index, available), (1, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn equal_stream_counts_mix_pairwise() {
    let c = compile("all: {addaudio: [b.mkv, b.mkv]}").unwrap();
    assert_eq!(
        c.graph.render(),
        "[0:a:0][0:a:0]amix=inputs=2:duration=first[f0];\
         [0:a:1][0:a:1]amix=inputs=2:duration=first[f1]"
    );
}

#[test]
fn override_beyond_child_streams_is_out_of_range() {
    let err = compile("all: {concat: {inputs: [a.mkv, b.mkv], a: 2}}").unwrap_err();
    match err {
        RecipeError::StreamIndexOutOfRange {
            node,
            kind,
            index,
            available,
        } => {
            assert_eq!(node, "all.concat.inputs[0]");
            assert_eq!(kind, StreamKind::Audio);
            assert_eq!((index, available), (1, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn shared_subtree_compiles_once() {
    let c = compile(
        "intro: {file: a.mkv, start: 0, duration: 5}\n\
         all: [!ref intro, b.mkv, {ref: intro}]\n",
    )
    .unwrap();
    let trims = c
        .graph
        .segments()
        .iter()
        .filter(|s| s.filter.contains("trim="))
        .count();
    assert_eq!(trims, 2);
    assert_eq!(
        c.graph.segments().last().unwrap().to_string(),
        "[f0][f1][1:v:0][1:a:0][f0][f1]concat=n=3:v=1:a=1[f2][f3]"
    );
}

#[test]
fn label_count_matches_resolved_streams_for_every_node() {
    for src in [
        "all: [a.mkv, b.mkv]",
        "all: {concat: {inputs: [b.mkv, {file: b.mkv, speed: 2x}], addaudio: music.mp3, fadein: 1}}",
        "all: {addaudio: [still.mkv, music.mp3]}",
        "all: {file: b.mkv, a: 1, filters: [{filter: {name: pan, args: mono, type: a, a: 1}}]}",
    ] {
        let t = tree(src);
        let res = resolved(&t);
        let mut c = Compiler::new(&t.graph, &res);
        for (id, _) in t.graph.iter() {
            let labels = c.compile(id).unwrap();
            let streams = res.get(id).unwrap();
            assert_eq!(labels.len(), streams.total(), "{src}");
            assert_eq!(labels.video.len(), streams.video, "{src}");
        }
    }
}
