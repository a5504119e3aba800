use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// A comma-delimited file with a header row, read whole into memory.
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let content = content.trim_start_matches('\u{feff}');
        let mut lines = content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());

        let headers = lines
            .next()
            .ok_or_else(|| anyhow!("Missing header row"))?
            .split(',')
            .map(|h| h.trim().to_string())
            .collect();
        let rows = lines.map(split_line).collect();

        Ok(Self { headers, rows })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            headers: &self.headers,
            values,
        })
    }
}

pub struct Record<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl Record<'_> {
    /// Value under `column`, or "" when the column or the value is missing.
    pub fn get(&self, column: &str) -> &str {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn field(&self, idx: usize) -> &str {
        self.values.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Split a line on commas outside double quotes.
///
/// Quotes only toggle the in-quotes state and are dropped. Doubled (`""`) or
/// backslash-escaped quotes are not understood and will mis-split.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
