use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ExtractArgs;
use crate::commands::artifacts::write_document_artifacts;
use crate::commands::setup;
use crate::engine::write_records;
use crate::util::{ensure_directory, read_markup, sha256_hex};

pub fn run(args: ExtractArgs) -> Result<()> {
    let setup = setup::build(&args.pipeline)?;
    let source = args.input.display().to_string();

    let raw = read_markup(&args.input)?;
    let input_sha256 = sha256_hex(raw.as_bytes());
    info!(
        source = %source,
        bytes = raw.len(),
        lang = %setup.settings.language,
        renderer = %setup.settings.renderer,
        splitter = %setup.settings.splitter,
        "extracting sentence citations"
    );

    let document = setup
        .pipeline
        .process_document(&raw, setup.renderer.as_ref(), setup.splitter.as_ref())
        .with_context(|| format!("failed to process {source}"))?;

    if let Some(dir) = &args.artifacts_dir {
        ensure_directory(dir)?;
        write_document_artifacts(dir, &source, &input_sha256, &setup.settings, &document)?;
    }

    let records = document.records();
    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                ensure_directory(parent)?;
            }
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_records(&mut BufWriter::new(file), &records)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), records = records.len(), "wrote sentence records");
        }
        None => {
            let mut output = BufWriter::new(io::stdout().lock());
            write_records(&mut output, &records)?;
        }
    }

    Ok(())
}
