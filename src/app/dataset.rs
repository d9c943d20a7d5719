//! Plaintext datasets: one labelled sample per line.
//!
//! A record is `<label> <v_0> ... <v_{raw-1}>`, whitespace separated. Images
//! are zero padded to the normalized width on load.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use super::instance::Dimensions;
use crate::{Error, Result};

/// A labelled input vector of the normalized width.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Ground truth class.
    pub label: i64,
    /// Pixels, zero padded.
    pub image: Vec<f32>,
}

/// What to do with a record that does not parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Stop at the first malformed record and keep what was read before it.
    #[default]
    Lenient,
    /// Fail with [Error::Malformed].
    Strict,
}

/// Reads datasets into [Sample]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct DatasetLoader {
    dimensions: Dimensions,
    mode: LoadMode,
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::io(path, e))
}

impl DatasetLoader {

    /// A lenient loader for records of the given dimensions.
    pub fn new(dimensions: Dimensions) -> Self {
        DatasetLoader { dimensions, mode: LoadMode::default() }
    }

    /// Choose how malformed records are handled.
    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Current [LoadMode].
    pub fn mode(&self) -> LoadMode {self.mode}

    /// Load a combined label and pixel file.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<Sample>> {
        let path = path.as_ref();
        self.read(open(path)?, path)
    }

    /// Parse records from any reader. `path` only labels errors.
    pub fn read<R: BufRead>(&self, reader: R, path: &Path) -> Result<Vec<Sample>> {
        let mut dataset = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let parsed = tokens.next()
                .ok_or_else(|| "empty record".to_string())
                .and_then(|t| t.parse::<i64>().map_err(|_| format!("bad label {:?}", t)))
                .and_then(|label| self.parse_image(tokens).map(|image| Sample { label, image }));
            match parsed {
                Ok(sample) => dataset.push(sample),
                Err(reason) => {
                    if !self.on_malformed(path, i + 1, reason)? {
                        break;
                    }
                }
            }
        }
        Ok(dataset)
    }

    /// Load pixels and labels kept in two parallel files, one record per line.
    pub fn load_split(&self, labels: impl AsRef<Path>, pixels: impl AsRef<Path>) -> Result<Vec<Sample>> {
        let labels = read_labels(labels)?;
        let pixels_path = pixels.as_ref();
        let mut images = Vec::new();
        for (i, line) in open(pixels_path)?.lines().enumerate() {
            let line = line.map_err(|e| Error::io(pixels_path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_image(line.split_whitespace()) {
                Ok(image) => images.push(image),
                Err(reason) => {
                    if !self.on_malformed(pixels_path, i + 1, reason)? {
                        break;
                    }
                }
            }
        }
        if self.mode == LoadMode::Strict && images.len() != labels.len() {
            return Err(Error::Config(format!("{} images but {} labels", images.len(), labels.len())));
        }
        Ok(labels.into_iter()
            .zip(images)
            .map(|(label, image)| Sample { label, image })
            .collect())
    }

    fn parse_image<'a>(&self, tokens: impl Iterator<Item = &'a str>) -> std::result::Result<Vec<f32>, String> {
        let mut image = Vec::with_capacity(self.dimensions.normalized());
        for token in tokens {
            let value = token.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("bad pixel {:?}", token))?;
            image.push(value);
        }
        if image.len() != self.dimensions.raw() {
            return Err(format!("expected {} values, found {}", self.dimensions.raw(), image.len()));
        }
        image.resize(self.dimensions.normalized(), 0.0);
        Ok(image)
    }

    /// Returns whether reading continues.
    fn on_malformed(&self, path: &Path, line: usize, reason: String) -> Result<bool> {
        match self.mode {
            LoadMode::Strict => Err(Error::Malformed { path: path.to_path_buf(), line, reason }),
            LoadMode::Lenient => {
                tracing::warn!(path = %path.display(), line, %reason, "stopping at malformed record");
                Ok(false)
            }
        }
    }

}

/// Read one integer label per line, skipping blank lines.
pub fn read_labels(path: impl AsRef<Path>) -> Result<Vec<i64>> {
    let path = path.as_ref();
    let mut labels = Vec::new();
    for (i, line) in open(path)?.lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let label = line.parse::<i64>().map_err(|_| Error::Malformed {
            path: path.to_path_buf(),
            line: i + 1,
            reason: format!("bad label {:?}", line),
        })?;
        labels.push(label);
    }
    Ok(labels)
}
