use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentenceCitations {
    pub sentence: String,
    pub urls: Vec<String>,
}

fn format_record(record: &SentenceCitations) -> String {
    let mut line = record
        .sentence
        .replace(['\t', '\n', '\r'], " ");
    for url in &record.urls {
        line.push('\t');
        line.push_str(url);
    }
    line
}

pub fn format_records(records: &[SentenceCitations]) -> String {
    let mut output = String::new();
    for record in records {
        output.push_str(&format_record(record));
        output.push('\n');
    }
    output
}

pub fn write_records<W: Write>(writer: &mut W, records: &[SentenceCitations]) -> Result<()> {
    writer
        .write_all(format_records(records).as_bytes())
        .context("failed to write records")?;
    writer.flush().context("failed to flush records")?;
    Ok(())
}
