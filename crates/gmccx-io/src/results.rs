//! Result block selection shared by the DAT and FRD readers, and the
//! one-call import of a finished analysis.

use std::fs;

use gmccx_model::{FileType, Model};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dat_reader::{read_displacements, read_section_forces};
use crate::deck::StepSettings;
use crate::error::{CodecError, Result};
use crate::frd_reader::{FieldGroup, read_2d_results};

/// Relative tolerance when comparing the reported step time with the
/// expected total time; the solver prints seven significant digits.
pub const TIME_TOLERANCE: f64 = 1e-6;

/// Which occurrence of a result block to read
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultSelection {
    /// 1-based occurrence; `None` reads the last one
    pub step: Option<usize>,
    /// Time the last occurrence must report
    pub total_time: f64,
}

impl Default for ResultSelection {
    fn default() -> Self {
        Self {
            step: None,
            total_time: 1.0,
        }
    }
}

impl From<&StepSettings> for ResultSelection {
    fn from(step: &StepSettings) -> Self {
        Self {
            step: None,
            total_time: step.total_time,
        }
    }
}

/// A result block header: line index and reported time
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BlockStart {
    pub line: usize,
    pub time: f64,
}

impl ResultSelection {
    /// Pick the requested block. An explicitly requested occurrence is taken
    /// as is; otherwise the last block must have reached the total time.
    pub(crate) fn select(&self, blocks: &[BlockStart], what: &str) -> Result<BlockStart> {
        if let Some(block) = self
            .step
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| blocks.get(i))
        {
            return Ok(*block);
        }

        let last = blocks
            .last()
            .copied()
            .ok_or_else(|| CodecError::MissingBlock(what.to_string()))?;
        let scale = self.total_time.abs().max(1.0);
        if (last.time - self.total_time).abs() > TIME_TOLERANCE * scale {
            return Err(CodecError::Convergence {
                expected: self.total_time,
                found: last.time,
            });
        }
        Ok(last)
    }
}

/// Whitespace separated tokens of a result line
pub(crate) fn tokens(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

pub(crate) fn parse_f64(line: usize, token: &str) -> Result<f64> {
    token
        .parse()
        .map_err(|_| CodecError::format(line + 1, format!("invalid number '{token}'")))
}

pub(crate) fn line_at<'a>(lines: &[&'a str], index: usize) -> Result<&'a str> {
    lines
        .get(index)
        .copied()
        .ok_or_else(|| CodecError::format(index + 1, "unexpected end of file"))
}

/// Read displacements, section forces and 2D stresses and strains from the
/// model's `.dat` and `.frd` files.
///
/// Every reader runs against a copy of the model; the model is only
/// updated when all of them succeed.
pub fn read_results(model: &mut Model, selection: &ResultSelection) -> Result<()> {
    let dat_path = model.paths().file(FileType::Dat);
    debug!(path = %dat_path.display(), "reading results");
    let dat = fs::read_to_string(&dat_path)?;

    let mut staged = model.clone();
    read_displacements(&mut staged, &dat, selection)?;
    read_section_forces(&mut staged, &dat, selection)?;

    if staged.mesh().faces().next().is_some() {
        let frd = fs::read_to_string(model.paths().file(FileType::Frd))?;
        read_2d_results(&mut staged, &frd, FieldGroup::Stress, selection)?;
        read_2d_results(&mut staged, &frd, FieldGroup::Strain, selection)?;
    }

    *model = staged;
    info!(model = model.name(), "results imported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks() -> Vec<BlockStart> {
        vec![
            BlockStart { line: 3, time: 0.5 },
            BlockStart { line: 20, time: 1.0 },
        ]
    }

    #[test]
    fn defaults_to_last_block() {
        let block = ResultSelection::default().select(&blocks(), "displacements").unwrap();
        assert_eq!(block.line, 20);
    }

    #[test]
    fn explicit_step_skips_time_check() {
        let selection = ResultSelection {
            step: Some(1),
            total_time: 1.0,
        };
        assert_eq!(selection.select(&blocks(), "displacements").unwrap().line, 3);
    }

    #[test]
    fn missing_step_falls_back_to_last() {
        let selection = ResultSelection {
            step: Some(7),
            total_time: 2.0,
        };
        let err = selection.select(&blocks(), "displacements").unwrap_err();
        assert!(matches!(
            err,
            CodecError::Convergence {
                expected,
                found
            } if expected == 2.0 && found == 1.0
        ));
    }

    #[test]
    fn no_block_is_reported() {
        let err = ResultSelection::default().select(&[], "statistics").unwrap_err();
        assert!(matches!(err, CodecError::MissingBlock(what) if what == "statistics"));
    }
}
