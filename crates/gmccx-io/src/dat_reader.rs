//! CalculiX `.dat` result reader
//!
//! The `.dat` file is free-form text. Each requested output starts with a
//! header line whose last token is the step time:
//!
//! ```text
//!  displacements (vx,vy,vz) for set NALL and time  0.1000000E+01
//!
//!          1  0.000000E+00  0.000000E+00  0.000000E+00
//! ```
//!
//! Section prints (`*SECTION PRINT ... SOF`) produce one `statistics`
//! block of 20 lines per surface, start then end surface for every beam.
//! The force resultant is on the 4th line after the header and the moment
//! 8 lines below it.

use std::collections::HashMap;

use gmccx_model::{Model, SECTION_FORCES, Vector};
use tracing::debug;

use crate::error::{CodecError, Result};
use crate::results::{BlockStart, ResultSelection, line_at, parse_f64, tokens};

const DISPLACEMENTS: &str = "displacements";
const STATISTICS: &str = "statistics";

/// Lines per `statistics` block
const SECTION_BLOCK_LINES: usize = 20;
const FORCE_OFFSET: usize = 4;
const MOMENT_OFFSET: usize = 8;

fn header_time(index: usize, line: &str) -> Result<f64> {
    let last = tokens(line)
        .last()
        .copied()
        .ok_or_else(|| CodecError::format(index + 1, "empty header"))?;
    parse_f64(index, last)
}

/// Assign nodal displacements from the selected `displacements` block.
///
/// Rows are matched to nodes through their solver id, so the block must
/// list every node of the mesh.
pub fn read_displacements(model: &mut Model, source: &str, selection: &ResultSelection) -> Result<()> {
    let lines: Vec<&str> = source.lines().collect();
    let blocks = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.trim_start().starts_with(DISPLACEMENTS))
        .map(|(i, l)| Ok(BlockStart { line: i, time: header_time(i, l)? }))
        .collect::<Result<Vec<_>>>()?;
    let block = selection.select(&blocks, DISPLACEMENTS)?;

    let mesh = model.mesh();
    let mut values = Vec::with_capacity(mesh.nodes.len());
    for offset in 0..mesh.nodes.len() {
        let index = block.line + 2 + offset;
        let row = tokens(line_at(&lines, index)?);
        if row.len() < 4 {
            return Err(CodecError::format(index + 1, "displacement row needs a node id and three values"));
        }
        let solver_id: usize = row[0]
            .parse()
            .map_err(|_| CodecError::format(index + 1, format!("invalid node id '{}'", row[0])))?;
        let node = solver_id
            .checked_sub(1)
            .filter(|&id| mesh.nodes.contains(id))
            .ok_or_else(|| CodecError::format(index + 1, format!("unknown node {solver_id}")))?;
        let u = Vector::new(
            parse_f64(index, row[1])?,
            parse_f64(index, row[2])?,
            parse_f64(index, row[3])?,
        );
        values.push((node, u));
    }

    let mesh = model.mesh_mut();
    for (id, displacement) in values {
        if let Some(node) = mesh.nodes.get_mut(id) {
            node.displacement = displacement;
        }
    }
    debug!(time = block.time, nodes = mesh.nodes.len(), "displacements read");
    Ok(())
}

/// Assign section forces `Fx..Mzz` (start and end value each) to every
/// beam element, expressed in the owning bar's rotated local frame.
///
/// The end side is sign inverted so both values follow the same
/// convention along the bar.
pub fn read_section_forces(model: &mut Model, source: &str, selection: &ResultSelection) -> Result<()> {
    let beams: Vec<(usize, Option<usize>)> = model
        .mesh()
        .lines()
        .map(|(id, line)| (id, line.component()))
        .collect();
    if beams.is_empty() {
        return Ok(());
    }

    let lines: Vec<&str> = source.lines().collect();
    let step_lines = beams.len() * 2 * SECTION_BLOCK_LINES;
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim_start().starts_with(STATISTICS) {
            blocks.push(BlockStart {
                line: i,
                time: header_time(i, lines[i])?,
            });
            i += step_lines;
        } else {
            i += 1;
        }
    }
    let block = selection.select(&blocks, STATISTICS)?;

    let mut forces: HashMap<usize, [[f64; 2]; 6]> = HashMap::new();
    let mut index = block.line + FORCE_OFFSET;
    for &(element, owner) in &beams {
        let bar = owner
            .and_then(|c| model.bars().get(c))
            .ok_or(CodecError::Unassigned(element))?;
        let frame = bar.rotated_lcs();

        let mut channels = [[0.0; 2]; 6];
        let mut sign = 1.0;
        for side in 0..2 {
            let force = frame.to_local(&(read_vector(&lines, index)? * sign));
            let moment = frame.to_local(&(read_vector(&lines, index + MOMENT_OFFSET)? * sign));
            for (k, value) in force.iter().chain(moment.iter()).enumerate() {
                channels[k][side] = *value;
            }
            index += SECTION_BLOCK_LINES;
            sign = -sign;
        }
        forces.insert(element, channels);
    }

    let mesh = model.mesh_mut();
    for (element, channels) in forces {
        let results = mesh.element_mut(element)?.results_mut();
        for (name, values) in SECTION_FORCES.iter().zip(channels.iter()) {
            results.store(name, values)?;
        }
    }
    debug!(time = block.time, elements = beams.len(), "section forces read");
    Ok(())
}

fn read_vector(lines: &[&str], index: usize) -> Result<Vector> {
    let row = tokens(line_at(lines, index)?);
    if row.len() < 3 {
        return Err(CodecError::format(index + 1, "expected three vector components"));
    }
    Ok(Vector::new(
        parse_f64(index, row[0])?,
        parse_f64(index, row[1])?,
        parse_f64(index, row[2])?,
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gmccx_model::{Bar, ComponentKind, Element1D, LineSegment, Material, Node, Point, Profile};

    use super::*;

    /// Bar along global x; its local frame is x = Z, y = -Y, z = X.
    fn beam_model() -> Model {
        let mut model = Model::new("beam", "/tmp", 1e-3);
        let line = LineSegment::new(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0));
        let steel = Arc::new(Material::isotropic("Steel", 210e9, 0.3, 7860.0));
        let bar = Bar::new(line, Profile::rectangular(0.2, 0.1).unwrap(), steel, 0.0, [0.0; 2]).unwrap();
        model.add_bar(bar).unwrap();
        let mesh = model.mesh_mut();
        mesh.add_node(Node::new(Point::new(0.0, 0.0, 0.0))).unwrap();
        mesh.add_node(Node::new(Point::new(1.0, 0.0, 0.0))).unwrap();
        mesh.add_element(Element1D::new(vec![0, 1], 1, false).unwrap()).unwrap();
        model.assign_elements(ComponentKind::Bar, 0, vec![0]).unwrap();
        model
    }

    fn displacement_block(time: &str, dz: &str) -> String {
        format!(
            " displacements (vx,vy,vz) for set NALL and time  {time}\n\n\
             \x20        1  0.000000E+00  0.000000E+00  0.000000E+00\n\
             \x20        2  1.000000E-03  0.000000E+00  {dz}\n\n"
        )
    }

    fn statistics_block(surface: &str, time: &str, force: &str, moment: &str) -> String {
        let mut lines = vec![String::new(); SECTION_BLOCK_LINES];
        lines[0] = format!(" statistics for surface {surface} and time  {time}");
        lines[FORCE_OFFSET] = format!("   {force}");
        lines[FORCE_OFFSET + MOMENT_OFFSET] = format!("   {moment}");
        lines.join("\n") + "\n"
    }

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn reads_last_displacement_block() {
        let mut model = beam_model();
        let source = displacement_block("0.5000000E+00", "-1.000000E-03")
            + &displacement_block("0.1000000E+01", "-2.000000E-03");
        read_displacements(&mut model, &source, &ResultSelection::default()).unwrap();

        let node = model.mesh().node(1).unwrap();
        assert_eq!(node.displacement, Vector::new(1e-3, 0.0, -2e-3));
    }

    #[test]
    fn explicit_step_reads_intermediate_block() {
        let mut model = beam_model();
        let source = displacement_block("0.5000000E+00", "-1.000000E-03")
            + &displacement_block("0.1000000E+01", "-2.000000E-03");
        let selection = ResultSelection {
            step: Some(1),
            total_time: 1.0,
        };
        read_displacements(&mut model, &source, &selection).unwrap();
        assert_eq!(model.mesh().node(1).unwrap().displacement.z, -1e-3);
    }

    #[test]
    fn unfinished_analysis_is_a_convergence_error() {
        let mut model = beam_model();
        let source = displacement_block("0.7500000E+00", "-2.000000E-03");
        let err = read_displacements(&mut model, &source, &ResultSelection::default()).unwrap_err();
        assert!(matches!(err, CodecError::Convergence { found, .. } if found == 0.75));
        assert_eq!(model.mesh().node(1).unwrap().displacement, Vector::zeros());
    }

    #[test]
    fn truncated_block_is_a_format_error() {
        let mut model = beam_model();
        let source = " displacements (vx,vy,vz) for set NALL and time  0.1000000E+01\n\n         1  0 0 0\n";
        let err = read_displacements(&mut model, source, &ResultSelection::default()).unwrap_err();
        assert!(matches!(err, CodecError::Format { line: 4, .. }));
        assert_eq!(model.mesh().node(0).unwrap().displacement, Vector::zeros());
    }

    #[test]
    fn section_forces_in_local_frame() {
        let mut model = beam_model();
        let time = "0.1000000E+01";
        let source = statistics_block("S1S", time, "1.0 2.0 3.0", "0.1 0.0 0.0")
            + &statistics_block("S1E", time, "1.0 2.0 3.0", "0.0 0.0 0.5");
        read_section_forces(&mut model, &source, &ResultSelection::default()).unwrap();

        let results = model.mesh().element(0).unwrap().results();
        assert!(close(results.get("Fx").unwrap(), &[3.0, -3.0]));
        assert!(close(results.get("Fy").unwrap(), &[-2.0, 2.0]));
        assert!(close(results.get("Fz").unwrap(), &[1.0, -1.0]));
        assert!(close(results.get("Mxx").unwrap(), &[0.0, -0.5]));
        assert!(close(results.get("Myy").unwrap(), &[0.0, 0.0]));
        assert!(close(results.get("Mzz").unwrap(), &[0.1, 0.0]));
    }

    #[test]
    fn beams_without_bar_are_rejected() {
        let mut model = Model::new("loose", "/tmp", 1e-3);
        let mesh = model.mesh_mut();
        mesh.add_node(Node::new(Point::new(0.0, 0.0, 0.0))).unwrap();
        mesh.add_node(Node::new(Point::new(1.0, 0.0, 0.0))).unwrap();
        mesh.add_element(Element1D::new(vec![0, 1], 1, false).unwrap()).unwrap();

        let time = "0.1000000E+01";
        let source = statistics_block("S1S", time, "1 2 3", "0 0 0")
            + &statistics_block("S1E", time, "1 2 3", "0 0 0");
        let err = read_section_forces(&mut model, &source, &ResultSelection::default()).unwrap_err();
        assert!(matches!(err, CodecError::Unassigned(0)));
    }
}
