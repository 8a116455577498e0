use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "refcite",
    version,
    about = "Sentence-level citation URL extraction for wiki-markup articles"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Batch(BatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Markup file to read, or `-` for stdin.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[arg(long)]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "wiki")]
    pub extension: String,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(long, default_value = "en")]
    pub lang: String,

    #[arg(long = "references-heading")]
    pub references_headings: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub include_archive_urls: bool,

    #[arg(long, value_enum, default_value_t = EngineKind::Builtin)]
    pub renderer: EngineKind,

    #[arg(long)]
    pub renderer_command: Option<String>,

    #[arg(long, value_enum, default_value_t = EngineKind::Builtin)]
    pub splitter: EngineKind,

    #[arg(long)]
    pub splitter_command: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EngineKind {
    Builtin,
    Command,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::Command => "command",
        }
    }
}
