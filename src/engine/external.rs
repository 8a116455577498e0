use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};

use super::render::{MarkupRenderer, SentenceSplitter};

/// A program that reads markup on stdin and writes plain text on stdout.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: CommandLine,
}

impl CommandRenderer {
    pub fn parse(command_line: &str) -> Result<Self> {
        Ok(Self {
            command: CommandLine::parse(command_line)?,
        })
    }
}

impl MarkupRenderer for CommandRenderer {
    fn name(&self) -> &str {
        &self.command.program
    }

    fn render(&self, markup: &str) -> Result<String> {
        self.command.run_filter(markup)
    }
}

/// A program that reads plain text on stdin and writes one sentence per line.
#[derive(Debug, Clone)]
pub struct CommandSplitter {
    command: CommandLine,
}

impl CommandSplitter {
    pub fn parse(command_line: &str) -> Result<Self> {
        Ok(Self {
            command: CommandLine::parse(command_line)?,
        })
    }
}

impl SentenceSplitter for CommandSplitter {
    fn name(&self) -> &str {
        &self.command.program
    }

    fn split(&self, text: &str) -> Result<Vec<String>> {
        let output = self.command.run_filter(text)?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }
}

#[derive(Debug, Clone)]
struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    fn parse(command_line: &str) -> Result<Self> {
        let mut parts = split_command_line(command_line)?.into_iter();
        let program = parts
            .next()
            .with_context(|| format!("empty external command: {command_line:?}"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn run_filter(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute {}", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .with_context(|| format!("failed to open stdin for {}", self.program))?;
        let payload = input.to_owned();
        let writer = thread::spawn(move || stdin.write_all(payload.as_bytes()));

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for {}", self.program))?;
        let written = writer
            .join()
            .map_err(|_| anyhow!("stdin writer for {} panicked", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} returned non-zero exit status: {}",
                self.program,
                stderr.trim()
            );
        }
        written.with_context(|| format!("failed to write stdin for {}", self.program))?;

        String::from_utf8(output.stdout)
            .with_context(|| format!("{} produced non-UTF-8 output", self.program))
    }
}

/// Splits a command line into words. Single quotes keep their contents
/// literally, double quotes allow `\"` and `\\` escapes, and a backslash
/// outside quotes escapes the next character. No shell expansion happens.
fn split_command_line(command_line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command_line.chars();

    while let Some(value) = chars.next() {
        match value {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => bail!("unterminated single quote in {command_line:?}"),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => bail!("unterminated double quote in {command_line:?}"),
                        },
                        Some(inner) => current.push(inner),
                        None => bail!("unterminated double quote in {command_line:?}"),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => bail!("trailing backslash in {command_line:?}"),
                }
            }
            value if value.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            value => {
                in_word = true;
                current.push(value);
            }
        }
    }
    if in_word {
        words.push(current);
    }

    Ok(words)
}
