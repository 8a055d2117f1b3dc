use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::Result;

pub const SCALAR_FILE: &str = "scalars.jsonl";

/// One `add_scalars` call: named values sharing a tag and a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRecord {
    pub tag: String,
    pub step: usize,
    pub values: BTreeMap<String, f64>,
}

/// Append-only stream of scalar series, one JSON object per line.
///
/// Opened at run start, flushed once per epoch and closed at the end.
/// Resumed runs append to the existing file.
pub struct ScalarWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ScalarWriter {
    pub fn open(dir: &Path) -> Result<ScalarWriter> {
        let path = dir.join(SCALAR_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(ScalarWriter { path, writer: BufWriter::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_scalars(&mut self, tag: &str, values: &[(&str, f64)], step: usize) -> Result<()> {
        let record = ScalarRecord {
            tag: tag.to_string(),
            step,
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Reads back every record in a scalar file.
    pub fn read_all(path: &Path) -> Result<Vec<ScalarRecord>> {
        let text = std::fs::read_to_string(path)?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Ok(serde_json::from_str(l)?))
            .collect()
    }
}
