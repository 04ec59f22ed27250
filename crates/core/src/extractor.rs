use regex::Regex;
use std::collections::HashSet;

use crate::error::IndexError;

const HEADER_WINDOW_LINES: usize = 120;
const FALLBACK_WINDOW_LINES: usize = 40;

// Line shapes tried in order; the first match wins.
const LINE_PATTERNS: [&str; 5] = [
    r"^-\s*(.*)$",
    r"^\*\s*(.*)$",
    r"^\d+\.\s*(.*)$",
    r"^\d+\s+(.*)$",
    r"^(.*:)$",
];

// Accepts almost any non-blank line inside the ingredients window;
// strict mode leaves it out.
const CATCH_ALL_PATTERN: &str = r"^\s*(.*\w.*)\s*$";

pub struct IngredientExtractor {
    patterns: Vec<Regex>,
    parenthetical: Regex,
    quantity_unit: Regex,
    digits: Regex,
}

impl IngredientExtractor {
    pub fn new() -> Result<Self, IndexError> {
        Self::with_strictness(false)
    }

    pub fn with_strictness(strict: bool) -> Result<Self, IndexError> {
        let mut patterns = LINE_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        if !strict {
            patterns.push(Regex::new(CATCH_ALL_PATTERN)?);
        }

        Ok(Self {
            patterns,
            parenthetical: Regex::new(r"\(.*?\)")?,
            quantity_unit: Regex::new(
                r"(?i)^\d+(\.\d+)?\s*(cup|cups|tbsp|tsp|grams|g|kg|ml|l)\b",
            )?,
            digits: Regex::new(r"[0-9/]+")?,
        })
    }

    // Without an "ingredients" header the first lines of the document
    // are scanned instead.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();

        let header = lines
            .iter()
            .position(|line| line.trim().to_lowercase().starts_with("ingredients"));

        let window: &[&str] = match header {
            Some(index) => {
                let start = index + 1;
                let end = (start + HEADER_WINDOW_LINES).min(lines.len());
                &lines[start.min(lines.len())..end]
            }
            None => &lines[..FALLBACK_WINDOW_LINES.min(lines.len())],
        };

        let mut seen = HashSet::new();
        let mut ingredients = Vec::new();

        for line in window {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(captured) = self
                .patterns
                .iter()
                .find_map(|pattern| pattern.captures(line))
                .and_then(|captures| captures.get(1))
            else {
                continue;
            };

            let cleaned = self.clean(captured.as_str());
            if cleaned.is_empty() {
                continue;
            }

            if seen.insert(cleaned.clone()) {
                ingredients.push(cleaned);
            }
        }

        ingredients
    }

    fn clean(&self, raw: &str) -> String {
        let mut text = raw.trim().to_string();
        text = self.parenthetical.replace_all(&text, "").into_owned();
        text = self.quantity_unit.replace(&text, "").into_owned();
        text = self.digits.replace_all(&text, "").into_owned();
        text.trim().to_lowercase().trim_end_matches(',').to_string()
    }
}
