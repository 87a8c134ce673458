//! CalculiX `.frd` result reader for 2D element fields
//!
//! Shell and membrane elements are expanded by the solver into volume
//! elements, so their results come back on the expanded nodes. The reader
//! first walks the element block (`3C`) to find, for every 2D element, the
//! result-file node ids of its expanded vertices, then reads one nodal
//! tensor block (`STRESS` or `TOSTRAIN`) and stores one value per vertex.
//!
//! ## Format Overview
//!
//! Nodal result rows are fixed-width:
//! - columns 1-2: record marker `-1`
//! - columns 4-12: node id
//! - from column 13: six 12-character values (`INF`/`-INF` for overflow)
//!
//! The line before the block keyword carries the step time as its third
//! token.

use std::collections::HashMap;

use gmccx_model::{Model, ModelError, STRAIN_2D, STRESS_2D, ccx_id};
use tracing::debug;

use crate::error::{CodecError, Result};
use crate::results::{BlockStart, ResultSelection, line_at, parse_f64, tokens};

const KEYWORD_COLUMN: usize = 5;
const NODE_COLUMNS: std::ops::Range<usize> = 4..13;
const FIRST_VALUE_COLUMN: usize = 13;
const VALUE_WIDTH: usize = 12;

/// Tensor field read for 2D elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    Stress,
    Strain,
}

impl FieldGroup {
    /// Block keyword in the result file
    pub fn keyword(&self) -> &'static str {
        match self {
            FieldGroup::Stress => "STRESS",
            FieldGroup::Strain => "TOSTRAIN",
        }
    }

    /// Element result channels, in file component order
    pub fn channels(&self) -> [&'static str; 6] {
        match self {
            FieldGroup::Stress => STRESS_2D,
            FieldGroup::Strain => STRAIN_2D,
        }
    }
}

fn is_record(line: &str, marker: &str) -> bool {
    line.get(1..3) == Some(marker)
}

/// Read `group` for every 2D element of the model.
pub fn read_2d_results(
    model: &mut Model,
    source: &str,
    group: FieldGroup,
    selection: &ResultSelection,
) -> Result<()> {
    let faces: Vec<(usize, usize)> = model
        .mesh()
        .faces()
        .map(|(id, face)| (id, face.primary_count()))
        .collect();
    if faces.is_empty() {
        return Ok(());
    }

    let lines: Vec<&str> = source.lines().collect();
    let vertices = element_vertices(&lines, &faces)?;
    let blocks = result_blocks(&lines, group.keyword())?;
    let block = selection.select(&blocks, group.keyword())?;
    let values = nodal_values(&lines, block.line)?;

    let channels = group.channels();
    let mut rows_per_element = Vec::with_capacity(faces.len());
    for (&(id, _), vertex_ids) in faces.iter().zip(&vertices) {
        let rows = vertex_ids
            .iter()
            .map(|v| {
                values.get(v).copied().ok_or_else(|| {
                    CodecError::MissingBlock(format!("{} values for node {v}", group.keyword()))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let results = model.mesh().element(id)?.results();
        for name in channels {
            if let Some(existing) = results.get(name) {
                if existing.len() != rows.len() {
                    return Err(ModelError::ResultChannel {
                        name: name.to_string(),
                        message: format!(
                            "element {} has {} values, file has {}",
                            ccx_id(id),
                            existing.len(),
                            rows.len()
                        ),
                    }
                    .into());
                }
            }
        }
        rows_per_element.push((id, rows));
    }

    let mesh = model.mesh_mut();
    for (id, rows) in rows_per_element {
        let results = mesh.element_mut(id)?.results_mut();
        for (k, name) in channels.iter().enumerate() {
            let column: Vec<f64> = rows.iter().map(|row| row[k]).collect();
            results.store(name, &column)?;
        }
    }
    debug!(
        field = group.keyword(),
        time = block.time,
        elements = faces.len(),
        "2D element results read"
    );
    Ok(())
}

/// Expanded vertex ids of each face, in `faces` order: the first
/// `2 * primary` ids listed for the element in the `3C` block.
fn element_vertices(lines: &[&str], faces: &[(usize, usize)]) -> Result<Vec<Vec<usize>>> {
    let mut vertices: Vec<Vec<usize>> = Vec::with_capacity(faces.len());
    let mut in_topology = false;
    let mut i = 0;
    while i < lines.len() && vertices.len() < faces.len() {
        let trimmed = lines[i].trim_start();
        if !in_topology {
            in_topology = trimmed.starts_with("3C");
        } else if trimmed.starts_with("-1") {
            let row = tokens(trimmed);
            let solver_id: usize = row
                .get(1)
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| CodecError::format(i + 1, "element record without id"))?;
            let (expected, primary) = faces[vertices.len()];
            if solver_id.checked_sub(1) == Some(expected) {
                i += 1;
                let ids = tokens(line_at(lines, i)?)
                    .iter()
                    .skip(1)
                    .take(primary * 2)
                    .map(|t| {
                        t.parse::<usize>()
                            .map_err(|_| CodecError::format(i + 1, format!("invalid node id '{t}'")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                vertices.push(ids);
            }
        }
        i += 1;
    }

    if let Some(&(missing, _)) = faces.get(vertices.len()) {
        return Err(CodecError::MissingBlock(format!(
            "topology of element {}",
            ccx_id(missing)
        )));
    }
    Ok(vertices)
}

/// Occurrences of `keyword`, each pointing at its first data row.
fn result_blocks(lines: &[&str], keyword: &str) -> Result<Vec<BlockStart>> {
    let mut blocks = Vec::new();
    let end = KEYWORD_COLUMN + keyword.len();
    for (i, line) in lines.iter().enumerate() {
        if line.len() <= end || line.get(KEYWORD_COLUMN..end) != Some(keyword) {
            continue;
        }
        let previous = i
            .checked_sub(1)
            .map(|p| lines[p])
            .ok_or_else(|| CodecError::format(i + 1, "result block without time record"))?;
        let time_token = tokens(previous)
            .get(2)
            .copied()
            .ok_or_else(|| CodecError::format(i, "time record has no time"))?;
        let time = parse_f64(i - 1, time_token)?;

        let first_row = (i..lines.len())
            .find(|&j| is_record(lines[j], "-1"))
            .ok_or_else(|| CodecError::format(i + 1, format!("{keyword} block has no data")))?;
        blocks.push(BlockStart {
            line: first_row,
            time,
        });
    }
    Ok(blocks)
}

/// Consecutive `-1` rows from `start`, keyed by result-file node id.
fn nodal_values(lines: &[&str], start: usize) -> Result<HashMap<usize, [f64; 6]>> {
    let mut values = HashMap::new();
    let mut i = start;
    while i < lines.len() && is_record(lines[i], "-1") {
        let line = lines[i];
        let node: usize = line
            .get(NODE_COLUMNS)
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| CodecError::format(i + 1, "invalid node id"))?;

        let mut row = [0.0; 6];
        for (k, slot) in row.iter_mut().enumerate() {
            let from = FIRST_VALUE_COLUMN + k * VALUE_WIDTH;
            let field = line
                .get(from..from + VALUE_WIDTH)
                .ok_or_else(|| CodecError::format(i + 1, format!("missing value {}", k + 1)))?;
            *slot = parse_value(field).ok_or_else(|| {
                CodecError::format(i + 1, format!("invalid value '{}'", field.trim()))
            })?;
        }
        values.insert(node, row);
        i += 1;
    }
    Ok(values)
}

/// A 12-character value; overflowed values are written as `INF` with the
/// sign in column 8.
fn parse_value(field: &str) -> Option<f64> {
    if let Ok(value) = field.trim().parse::<f64>() {
        return Some(value);
    }
    if field.get(9..) == Some("INF") {
        return Some(if field.as_bytes()[8] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    None
}
