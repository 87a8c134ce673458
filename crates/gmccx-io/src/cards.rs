//! Keyword-card reader for CalculiX decks.
//!
//! Splits a deck into `*KEYWORD, PARAM=value` cards with their data lines,
//! and summarizes a parsed deck. Used to inspect written decks before they
//! are handed to the solver.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{CodecError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Upper-case keyword without the leading `*`
    pub keyword: String,
    pub parameters: Vec<Parameter>,
    pub data_lines: Vec<String>,
    /// 1-based line of the card header
    pub line_start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub key: String,
    pub value: Option<String>,
}

impl Card {
    /// Value of parameter `key` (upper case)
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.value.as_deref())
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.parameters.iter().any(|p| p.key == key)
    }

    /// Data records; a line ending with `,` continues on the next one.
    pub fn records(&self) -> Vec<String> {
        let mut records = Vec::new();
        let mut current = String::new();
        for line in &self.data_lines {
            current.push_str(line);
            if !line.ends_with(',') {
                records.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            records.push(current);
        }
        records
    }
}

impl Deck {
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&raw)
    }

    /// Split `raw` into cards. Blank lines and `**` comments are skipped;
    /// a header line starting with `,` continues the previous header.
    pub fn parse_str(raw: &str) -> Result<Self> {
        let mut lines = raw
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with("**"))
            .peekable();
        let mut cards: Vec<Card> = Vec::new();

        while let Some((number, line)) = lines.next() {
            let Some(header) = line.strip_prefix('*') else {
                return Err(CodecError::Deck {
                    line: number,
                    message: "data line outside of a card".to_string(),
                });
            };

            let mut header = header.trim().to_string();
            while let Some((_, continued)) = lines.next_if(|(_, l)| l.starts_with(',')) {
                header.push_str(continued);
            }
            let (keyword, parameters) = parse_header(&header, number)?;

            let mut data_lines = Vec::new();
            while let Some((_, data)) = lines.next_if(|(_, l)| !l.starts_with('*')) {
                data_lines.push(data.to_string());
            }

            cards.push(Card {
                keyword,
                parameters,
                data_lines,
                line_start: number,
            });
        }

        Ok(Deck { cards })
    }

    /// Cards with the given keyword, in deck order
    pub fn cards_named<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Card> + 'a {
        self.cards
            .iter()
            .filter(move |c| normalized(&c.keyword) == normalized(keyword))
    }
}

fn parse_header(header: &str, line: usize) -> Result<(String, Vec<Parameter>)> {
    let mut parts = header.split(',').map(str::trim);
    let keyword = match parts.next() {
        Some(k) if !k.is_empty() => k.to_ascii_uppercase(),
        _ => {
            return Err(CodecError::Deck {
                line,
                message: "empty card keyword".to_string(),
            });
        }
    };

    let parameters = parts
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((key, value)) => Parameter {
                key: key.trim().to_ascii_uppercase(),
                value: Some(value.trim().to_string()),
            },
            None => Parameter {
                key: item.to_ascii_uppercase(),
                value: None,
            },
        })
        .collect();

    Ok((keyword, parameters))
}

fn normalized(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Counts and flags extracted from a parsed deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckSummary {
    pub total_cards: usize,
    pub keyword_counts: BTreeMap<String, usize>,
    pub node_rows: usize,
    /// Element records per `TYPE`
    pub element_rows: BTreeMap<String, usize>,
    pub materials: Vec<String>,
    pub beam_sections: usize,
    pub shell_sections: usize,
    pub boundary_rows: usize,
    pub has_step: bool,
    pub has_static: bool,
    pub nonlinear: bool,
}

impl DeckSummary {
    pub fn from_deck(deck: &Deck) -> Self {
        let mut keyword_counts = BTreeMap::<String, usize>::new();
        let mut element_rows = BTreeMap::<String, usize>::new();
        let mut materials = Vec::new();
        let mut node_rows = 0usize;
        let mut beam_sections = 0usize;
        let mut shell_sections = 0usize;
        let mut boundary_rows = 0usize;
        let mut has_step = false;
        let mut has_static = false;
        let mut nonlinear = false;

        for card in &deck.cards {
            *keyword_counts.entry(card.keyword.clone()).or_insert(0) += 1;

            match normalized(&card.keyword).as_str() {
                "STEP" => {
                    has_step = true;
                    nonlinear |= card.has_flag("NLGEOM");
                }
                "STATIC" => has_static = true,
                "NODE" => node_rows += card.data_lines.len(),
                "ELEMENT" => {
                    let kind = card.parameter("TYPE").unwrap_or("?").to_string();
                    *element_rows.entry(kind).or_insert(0) += card.records().len();
                }
                "MATERIAL" => {
                    if let Some(name) = card.parameter("NAME") {
                        materials.push(name.to_string());
                    }
                }
                "BEAMSECTION" | "BEAMGENERALSECTION" => beam_sections += 1,
                "SHELLSECTION" | "MEMBRANESECTION" => shell_sections += 1,
                "BOUNDARY" => boundary_rows += card.data_lines.len(),
                _ => {}
            }
        }

        Self {
            total_cards: deck.cards.len(),
            keyword_counts,
            node_rows,
            element_rows,
            materials,
            beam_sections,
            shell_sections,
            boundary_rows,
            has_step,
            has_static,
            nonlinear,
        }
    }

    pub fn element_count(&self) -> usize {
        self.element_rows.values().sum()
    }
}
