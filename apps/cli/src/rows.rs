//! JSON Lines row input and routed row output.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use dropstep_step::{Route, Row, RowOutcome, StepConfig};
use serde_json::Value;

/// Reads one JSON object per non-blank line.
pub fn read_rows(reader: impl BufRead) -> anyhow::Result<Vec<Row>> {
    let mut rows = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line)
            .with_context(|| format!("line {}: invalid JSON", number + 1))?
        {
            Value::Object(row) => rows.push(row),
            _ => bail!("line {}: row is not a JSON object", number + 1),
        }
    }
    Ok(rows)
}

/// Reads rows from `path`, or from stdin when `path` is `-`.
pub fn read_rows_from(path: &Path) -> anyhow::Result<Vec<Row>> {
    if path == Path::new("-") {
        return read_rows(io::stdin().lock());
    }
    let file = File::open(path).with_context(|| format!("opening rows {}", path.display()))?;
    read_rows(BufReader::new(file))
}

/// Where each route's rows are written.
#[derive(Debug)]
pub struct Outputs {
    /// Main output; stdout when unset.
    main: Option<PathBuf>,
    /// Target step name to output file.
    targets: HashMap<String, PathBuf>,
}

impl Outputs {
    /// Binds the configured target steps to output files.
    ///
    /// Every target step named in `config` needs a file; a step named for
    /// both outcomes needs the same file for both.
    pub fn new(
        config: &StepConfig,
        main: Option<PathBuf>,
        success: Option<PathBuf>,
        failure: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        if !config.chooses_target_steps() {
            if success.is_some() || failure.is_some() {
                tracing::warn!("no target steps configured, --success/--failure ignored");
            }
            return Ok(Self {
                main,
                targets: HashMap::new(),
            });
        }
        if main.is_some() {
            tracing::warn!("target steps configured, --output ignored");
        }

        let mut targets: HashMap<String, PathBuf> = HashMap::new();
        for (flag, step, file) in [
            ("--success", &config.successful_step, success),
            ("--failure", &config.failed_step, failure),
        ] {
            let Some(step) = step else {
                continue;
            };
            let Some(file) = file else {
                bail!("target step '{step}' has no output file (use {flag})");
            };
            match targets.get(step) {
                Some(existing) if *existing != file => {
                    bail!("target step '{step}' is bound to two different files");
                }
                Some(_) => {}
                None => {
                    targets.insert(step.clone(), file);
                }
            }
        }
        Ok(Self { main: None, targets })
    }

    /// Writes each outcome's row to the output of its route.
    ///
    /// Configured files are created even when no row is routed to them.
    pub fn write(&self, outcomes: &[RowOutcome]) -> anyhow::Result<()> {
        let mut files: HashMap<&str, BufWriter<File>> = HashMap::new();
        for (step, path) in &self.targets {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            files.insert(step.as_str(), BufWriter::new(file));
        }

        let mut main: Box<dyn Write> = match &self.main {
            Some(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("creating {}", path.display()))?,
            )),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };

        for outcome in outcomes {
            match &outcome.route {
                Route::Main => write_row(&mut main, &outcome.row)?,
                Route::Target(step) => match files.get_mut(step.as_str()) {
                    Some(out) => write_row(out, &outcome.row)?,
                    None => bail!("no output bound to target step '{step}'"),
                },
                Route::Discard => {}
            }
        }

        main.flush()?;
        for out in files.values_mut() {
            out.flush()?;
        }
        Ok(())
    }
}

fn write_row(out: &mut impl Write, row: &Row) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, row)?;
    out.write_all(b"\n")?;
    Ok(())
}
