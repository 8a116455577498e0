use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::BatchArgs;
use crate::commands::artifacts::write_document_artifacts;
use crate::commands::setup::{self, PipelineSetup};
use crate::engine::{AlignmentError, DocumentStats, write_records};
use crate::model::{BatchCounts, BatchDocumentEntry, BatchManifest};
use crate::util::{
    ensure_directory, now_utc_string, read_markup, sha256_hex, utc_compact_string,
    write_json_pretty,
};

pub fn run(args: BatchArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let setup = setup::build(&args.pipeline)?;
    ensure_directory(&args.output_dir)?;

    let mut inputs = discover_inputs(&args.input_dir, &args.extension)?;
    inputs.sort();
    if inputs.is_empty() {
        bail!(
            "no .{} files found in {}",
            args.extension,
            args.input_dir.display()
        );
    }

    info!(
        run_id = %run_id,
        documents = inputs.len(),
        input_dir = %args.input_dir.display(),
        "batch started"
    );

    let mut counts = BatchCounts {
        documents: inputs.len(),
        ..BatchCounts::default()
    };
    let mut documents = Vec::with_capacity(inputs.len());

    for path in inputs {
        let source = path.display().to_string();
        let stem = path
            .file_stem()
            .and_then(|value| value.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
        let output_path = args.output_dir.join(format!("{stem}.tsv"));
        let artifacts_dir = args.artifacts_dir.as_ref().map(|dir| dir.join(&stem));

        match process_one(&setup, &path, &output_path, artifacts_dir.as_deref()) {
            Ok((input_sha256, stats)) => {
                counts.succeeded += 1;
                counts.sentences += stats.sentences;
                counts.sentences_with_urls += stats.sentences_with_urls;
                counts.urls_emitted += stats.urls_emitted;
                documents.push(BatchDocumentEntry {
                    source,
                    output: Some(output_path.display().to_string()),
                    input_sha256: Some(input_sha256),
                    status: "ok".to_string(),
                    error: None,
                    stats: Some(stats),
                });
            }
            Err(error) => {
                let message = format!("{error:#}");
                let status = if error.downcast_ref::<AlignmentError>().is_some() {
                    counts.alignment_failures += 1;
                    "alignment_mismatch"
                } else {
                    counts.other_failures += 1;
                    "failed"
                };
                warn!(source = %source, status, error = %message, "document failed");

                if args.fail_fast {
                    return Err(error).with_context(|| format!("batch aborted at {source}"));
                }

                documents.push(BatchDocumentEntry {
                    source,
                    output: None,
                    input_sha256: None,
                    status: status.to_string(),
                    error: Some(message),
                    stats: None,
                });
            }
        }
    }

    let manifest = BatchManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        started_at,
        completed_at: now_utc_string(),
        input_dir: args.input_dir.display().to_string(),
        output_dir: args.output_dir.display().to_string(),
        settings: setup.settings.clone(),
        counts: counts.clone(),
        documents,
    };

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.output_dir.join("batch_manifest.json"));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        run_id = %run_id,
        succeeded = counts.succeeded,
        alignment_failures = counts.alignment_failures,
        other_failures = counts.other_failures,
        manifest = %manifest_path.display(),
        "batch completed"
    );

    Ok(())
}

fn process_one(
    setup: &PipelineSetup,
    path: &Path,
    output_path: &Path,
    artifacts_dir: Option<&Path>,
) -> Result<(String, DocumentStats)> {
    let raw = read_markup(path)?;
    let input_sha256 = sha256_hex(raw.as_bytes());
    let source = path.display().to_string();

    let document = setup
        .pipeline
        .process_document(&raw, setup.renderer.as_ref(), setup.splitter.as_ref())?;

    let file = File::create(output_path)
        .with_context(|| format!("failed to create {}", output_path.display()))?;
    write_records(&mut BufWriter::new(file), &document.records())
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    if let Some(dir) = artifacts_dir {
        ensure_directory(dir)?;
        write_document_artifacts(dir, &source, &input_sha256, &setup.settings, &document)?;
    }

    Ok((input_sha256, document.stats))
}

fn discover_inputs(input_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension.trim_start_matches('.')))
            .unwrap_or(false);

        if matches_extension {
            inputs.push(path);
        }
    }

    Ok(inputs)
}
