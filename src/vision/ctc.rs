//! Greedy CTC decoding of recognizer output

use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use ndarray::ArrayView2;
use tracing::debug;

use crate::error::{OcrError, Result};

/// Symbols appended after the alphanumerics in the built-in table
const DEFAULT_PUNCTUATION: [&str; 16] = [
    " ", ".", ",", "!", "?", "-", "_", "/", ":", "(", ")", "@", "+", "=", "%", "$",
];

/// Trailing symbols some recognizers were trained with; duplicates are intentional
const DEFAULT_TAIL: [&str; 5] = ["+", "-", ".", ",", " "];

/// Index-to-symbol table; index 0 is the CTC blank
#[derive(Debug, Clone, PartialEq)]
pub struct CharDictionary {
    symbols: Vec<String>,
}

impl Default for CharDictionary {
    fn default() -> Self {
        let mut symbols = vec![String::from("<blank>")];
        symbols.extend(('0'..='9').map(String::from));
        symbols.extend(('a'..='z').map(String::from));
        symbols.extend(('A'..='Z').map(String::from));
        symbols.extend(DEFAULT_PUNCTUATION.iter().map(|s| s.to_string()));
        symbols.extend(DEFAULT_TAIL.iter().map(|s| s.to_string()));
        Self { symbols }
    }
}

impl CharDictionary {
    /// Build a dictionary from symbols; a blank is inserted at index 0
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec![String::from("<blank>")];
        all.extend(symbols.into_iter().map(Into::into));
        Self { symbols: all }
    }

    /// Load a dictionary file with one symbol per line
    ///
    /// Empty lines are skipped; a line holding a single space is kept as the
    /// space symbol.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open character dictionary {:?}", path))?;
        let reader = BufReader::new(file);

        let mut symbols = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let symbol = line.trim_end_matches(['\r', '\n']);
            if !symbol.is_empty() {
                symbols.push(symbol.to_string());
            }
        }

        debug!("Loaded {} symbols from {:?}", symbols.len(), path);
        Ok(Self::from_symbols(symbols))
    }

    /// Number of entries including the blank
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbol at `index`; `None` for the blank and out-of-range indices
    pub fn get(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.symbols.get(index).map(String::as_str)
    }
}

/// Greedy (best-path) CTC decoder
#[derive(Debug, Clone, Default)]
pub struct CtcDecoder {
    dictionary: CharDictionary,
}

impl CtcDecoder {
    pub fn new(dictionary: CharDictionary) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &CharDictionary {
        &self.dictionary
    }

    /// Decode a `[timesteps, symbols]` score matrix
    ///
    /// Takes the arg-max per timestep (first index wins on ties), merges
    /// consecutive repeats and drops blanks. Indices beyond the dictionary
    /// are skipped.
    pub fn decode(&self, scores: ArrayView2<f32>) -> Result<String> {
        let (timesteps, classes) = scores.dim();
        if timesteps > 0 && classes == 0 {
            return Err(OcrError::DecodeFailure(
                "recognizer output has an empty symbol axis".to_string(),
            ));
        }

        let mut text = String::new();
        let mut previous: Option<usize> = None;

        for row in scores.outer_iter() {
            let index = argmax(row.iter().copied());
            if previous != Some(index) && index != 0 {
                if let Some(symbol) = self.dictionary.get(index) {
                    text.push_str(symbol);
                }
            }
            previous = Some(index);
        }

        Ok(text)
    }
}

/// Index of the first maximum value
fn argmax(values: impl Iterator<Item = f32>) -> usize {
    let mut best_index = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best_index = i;
            best_value = v;
        }
    }
    best_index
}
