use anyhow::{Context, Result};

use crate::cli::{EngineKind, PipelineArgs};
use crate::engine::{
    CommandRenderer, CommandSplitter, MarkupRenderer, Pipeline, PipelineConfig,
    RuleSentenceSplitter, SentenceSplitter, WikiTextRenderer,
};
use crate::model::PipelineSettings;

pub struct PipelineSetup {
    pub pipeline: Pipeline,
    pub renderer: Box<dyn MarkupRenderer>,
    pub splitter: Box<dyn SentenceSplitter>,
    pub settings: PipelineSettings,
}

pub fn build(args: &PipelineArgs) -> Result<PipelineSetup> {
    let mut config = PipelineConfig::for_language(&args.lang);
    config.headings = config
        .headings
        .with_extra(args.references_headings.iter().cloned());
    config.extract.include_archive_urls = args.include_archive_urls;
    let references_headings = config.headings.titles().to_vec();

    let pipeline = Pipeline::new(config)?;

    let renderer: Box<dyn MarkupRenderer> = match args.renderer {
        EngineKind::Builtin => Box::new(WikiTextRenderer::new()?),
        EngineKind::Command => {
            let command_line = args
                .renderer_command
                .as_deref()
                .context("--renderer command requires --renderer-command")?;
            Box::new(CommandRenderer::parse(command_line)?)
        }
    };

    let splitter: Box<dyn SentenceSplitter> = match args.splitter {
        EngineKind::Builtin => Box::new(RuleSentenceSplitter::default()),
        EngineKind::Command => {
            let command_line = args
                .splitter_command
                .as_deref()
                .context("--splitter command requires --splitter-command")?;
            Box::new(CommandSplitter::parse(command_line)?)
        }
    };

    let settings = PipelineSettings {
        language: args.lang.clone(),
        references_headings,
        include_archive_urls: args.include_archive_urls,
        renderer: format!("{}:{}", args.renderer.as_str(), renderer.name()),
        splitter: format!("{}:{}", args.splitter.as_str(), splitter.name()),
    };

    Ok(PipelineSetup {
        pipeline,
        renderer,
        splitter,
        settings,
    })
}
