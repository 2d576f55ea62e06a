use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ffrecipe", version, about = "Compile a YAML edit recipe into one ffmpeg run")]
struct Cli {
    /// Recipe YAML file.
    recipe: PathBuf,

    /// Top-level key of the node to build.
    #[arg(default_value = ffrecipe::DEFAULT_TARGET)]
    target: String,

    /// Directory media paths are relative to; ffprobe and ffmpeg run there.
    #[arg(short = 'C', long = "workdir")]
    workdir: Option<PathBuf>,

    /// Recipe key holding the output arguments.
    #[arg(long, default_value = ffrecipe::DEFAULT_OUTPUT_KEY)]
    output_key: String,

    /// Recipe key holding the leading ffmpeg flags.
    #[arg(long, default_value = ffrecipe::DEFAULT_FLAGS_KEY)]
    flags_key: String,

    /// Print the command without running ffmpeg.
    #[arg(long, default_value_t = false)]
    dry: bool,

    /// Print the command as a JSON argv array instead of a shell line.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// List buildable targets and exit.
    #[arg(long, default_value_t = false)]
    list_targets: bool,

    /// ffmpeg binary.
    #[arg(long, env = "FFRECIPE_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: String,

    /// ffprobe binary.
    #[arg(long, env = "FFRECIPE_FFPROBE", default_value = "ffprobe")]
    ffprobe: String,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let recipe = ffrecipe::Recipe::from_path(&cli.recipe)
        .with_context(|| format!("load recipe '{}'", cli.recipe.display()))?;
    let opts = ffrecipe::BuildOptions {
        target: cli.target,
        workdir: cli.workdir,
        flags_key: cli.flags_key,
        output_key: cli.output_key,
        dry: cli.dry,
        ffmpeg: cli.ffmpeg,
        ffprobe: cli.ffprobe,
    };

    if cli.list_targets {
        for target in recipe.targets(opts.section_keys()) {
            println!("{target}");
        }
        return Ok(());
    }

    let json = cli.json;
    let mut probe = opts.system_probe();
    let mut printed = Ok(());
    ffrecipe::build(&recipe, &opts, &mut probe, |cmd| {
        if json {
            printed = serde_json::to_string(&cmd.argv()).map(|line| println!("{line}"));
        } else {
            println!("{cmd}");
        }
    })
    .with_context(|| format!("build target '{}'", opts.target))?;
    printed.context("serialize command")?;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
