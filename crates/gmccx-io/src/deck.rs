//! CalculiX input deck writer.
//!
//! The deck is emitted in a fixed order: mesh topology, supports, materials,
//! bar and panel sections, then a single static step with distributed loads,
//! nodal loads, per-bar section force requests and the output requests.
//! All ids are written as solver ids (internal id + 1).

use std::fs;
use std::path::PathBuf;

use gmccx_model::{
    Bar, Elasticity, Element, ElementFamily, FileType, Indexed, Material, Mesh, Model, ModelError,
    Node, Panel, Support, ccx_id,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::format::{ELEMENT_NODES_PER_LINE, Real, ints_to_ccx, vector_to_ccx};

/// Analysis step options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSettings {
    /// Geometric nonlinearity (`NLGEOM`)
    pub nonlinear: bool,
    /// Step time; results are only trusted when the solver reaches it
    pub total_time: f64,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            nonlinear: false,
            total_time: 1.0,
        }
    }
}

/// Build the complete deck as lines.
pub fn deck_lines(model: &Model, step: &StepSettings) -> Result<Vec<String>> {
    let mut lines = mesh_lines(model.mesh())?;

    for support in model.supports() {
        lines.extend(support_lines(support));
    }
    for material in model.materials().iter() {
        lines.extend(material_lines(material));
    }
    for bar in model.bars() {
        if let Some(id) = bar.id() {
            lines.extend(bar_lines(id, bar));
        }
    }
    for panel in model.panels() {
        if let Some(id) = panel.id() {
            lines.extend(panel_lines(id, panel)?);
        }
    }

    lines.extend(step_lines(model, step));
    Ok(lines)
}

/// Write the deck to `<dir>/<name>.inp` and return its path.
pub fn write_deck(model: &Model, step: &StepSettings) -> Result<PathBuf> {
    let lines = deck_lines(model, step)?;
    let path = model.paths().file(FileType::Inp);
    fs::write(&path, lines.join("\n") + "\n")?;
    info!(path = %path.display(), lines = lines.len(), "wrote solver deck");
    Ok(path)
}

/// `*NODE` block followed by one `*ELEMENT` block per element type, in
/// order of first appearance.
fn mesh_lines(mesh: &Mesh) -> Result<Vec<String>> {
    let mut lines = vec!["*NODE, NSET = Nall".to_string()];
    for node in &mesh.nodes {
        if let Some(id) = node.id() {
            lines.push(node_line(id, node));
        }
    }

    let mut groups: Vec<(String, Vec<&Element>)> = Vec::new();
    for element in &mesh.elements {
        let ccx_type = element.ccx_type()?;
        match groups.iter_mut().find(|(t, _)| *t == ccx_type) {
            Some((_, members)) => members.push(element),
            None => groups.push((ccx_type, vec![element])),
        }
    }

    for (ccx_type, members) in groups {
        let set = match members[0] {
            Element::Line(_) => "BARS",
            Element::Face(_) => "PANELS",
        };
        lines.push(format!("*ELEMENT, TYPE = {ccx_type}, ELSET = {set}"));
        for element in members {
            if let Some(id) = element.id() {
                lines.extend(element_lines(id, element));
            }
        }
    }
    Ok(lines)
}

fn node_line(id: usize, node: &Node) -> String {
    let p = node.location;
    format!("{},{},{},{}", ccx_id(id), Real(p.x), Real(p.y), Real(p.z))
}

/// Beams fit on one line; 2D elements go through [`wrap_connectivity`].
fn element_lines(id: usize, element: &Element) -> Vec<String> {
    match element {
        Element::Line(line) => {
            let nodes: Vec<String> = line.nodes().iter().map(|&n| ccx_id(n).to_string()).collect();
            vec![format!("{},{}", ccx_id(id), nodes.join(","))]
        }
        Element::Face(face) => wrap_connectivity(ccx_id(id), face.nodes()),
    }
}

/// `id,` followed by node ids, wrapping after 15 nodes. Every line ends in
/// a comma except the last.
fn wrap_connectivity(ccx_element: usize, nodes: &[usize]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = format!("{ccx_element},");
    for chunk in nodes.chunks(ELEMENT_NODES_PER_LINE) {
        for &n in chunk {
            current.push_str(&format!("{},", ccx_id(n)));
        }
        lines.push(std::mem::take(&mut current));
    }
    if let Some(last) = lines.last_mut() {
        let trimmed = last.trim_end_matches(',').len();
        last.truncate(trimmed);
    }
    lines
}

fn support_lines(support: &Support) -> Vec<String> {
    let set = format!("Support_{}", support.name);
    let nodes: Vec<usize> = support.nodes().iter().copied().collect();

    let mut lines = vec![format!("*NSET,NSET={set}")];
    lines.extend(ints_to_ccx(&nodes, true));
    lines.push("*BOUNDARY".to_string());
    for dof in support.support_type.dofs() {
        lines.push(format!("{set}, {dof}"));
    }
    lines
}

fn material_lines(material: &Material) -> Vec<String> {
    let mut lines = vec![format!("*MATERIAL, NAME = {}", material.name)];
    if material.density != 0.0 {
        lines.push("*DENSITY".to_string());
        lines.push(Real(material.density).to_string());
    }
    match material.elasticity {
        Elasticity::Isotropic {
            youngs_modulus,
            poissons_ratio,
        } => {
            lines.push("*ELASTIC,TYPE = ISO".to_string());
            lines.push(format!("{},{}", Real(youngs_modulus), Real(poissons_ratio)));
        }
        Elasticity::EngineeringConstants {
            youngs_moduli: [e1, e2, e3],
            poissons_ratios: [v12, v13, v23],
            shear_moduli: [g12, g13, g23],
        } => {
            lines.push("*ELASTIC,TYPE = ENGINEERING CONSTANTS".to_string());
            let row: Vec<String> = [e1, e2, e3, v12, v13, v23, g12, g13]
                .iter()
                .map(|&v| Real(v).to_string())
                .collect();
            lines.push(row.join(","));
            lines.push(Real(g23).to_string());
        }
    }
    lines
}

fn bar_lines(id: usize, bar: &Bar) -> Vec<String> {
    let n = ccx_id(id);
    let lcs = bar.rotated_lcs();
    let profile = bar.profile();

    let mut lines = vec![
        format!("*ORIENTATION,NAME=ORBAR{n}"),
        format!("{},{}", vector_to_ccx(&lcs.x_axis), vector_to_ccx(&lcs.y_axis)),
        format!("*ELSET,ELSET=BAR{n}"),
    ];
    lines.extend(ints_to_ccx(bar.elements(), true));

    let mut section = format!(
        "{},MATERIAL={},ELSET=BAR{n},ORIENTATION=ORBAR{n},",
        profile.section_keyword(),
        bar.material().name
    );
    let [ox, oy] = bar.offset();
    if ox != 0.0 {
        section.push_str(&format!("OFFSET1={},", Real(ox / profile.height())));
    }
    if oy != 0.0 {
        section.push_str(&format!("OFFSET2={},", Real(oy / profile.width())));
    }
    section.push_str(&format!("SECTION={}", profile.section_type()));
    lines.push(section);

    let parameters: Vec<String> = profile
        .section_parameters()
        .iter()
        .map(|&v| Real(v).to_string())
        .collect();
    lines.push(parameters.join(","));
    lines.push(vector_to_ccx(&lcs.x_axis));
    lines
}

fn panel_lines(id: usize, panel: &Panel) -> Result<Vec<String>> {
    let keyword = match panel.family() {
        ElementFamily::Shell => "*SHELL",
        ElementFamily::Membrane => "*MEMBRANE",
        other => return Err(ModelError::UnsupportedFamily(other.to_string()).into()),
    };
    let n = ccx_id(id);
    let lcs = panel.lcs();

    let mut lines = vec![
        format!("*ORIENTATION,NAME=ORPANEL{n}"),
        format!("{},{}", vector_to_ccx(&lcs.x_axis), vector_to_ccx(&lcs.y_axis)),
        format!("*ELSET,ELSET=PANEL{n}"),
    ];
    lines.extend(ints_to_ccx(panel.elements(), true));
    lines.push(format!(
        "{keyword} SECTION,MATERIAL={},ELSET=PANEL{n},ORIENTATION=ORPANEL{n}",
        panel.material().name
    ));
    lines.push(Real(panel.thickness()).to_string());
    Ok(lines)
}

fn step_lines(model: &Model, step: &StepSettings) -> Vec<String> {
    let mesh = model.mesh();
    let mut lines = vec![
        if step.nonlinear { "*STEP,NLGEOM" } else { "*STEP" }.to_string(),
        "*STATIC".to_string(),
    ];
    if step.total_time != 1.0 {
        lines.push(format!("{0},{0}", Real(step.total_time)));
    }

    lines.push("*DLOAD".to_string());
    for (id, face) in mesh.faces() {
        if face.pressure() != 0.0 {
            lines.push(format!("{},P,{}", ccx_id(id), Real(face.pressure())));
        }
    }
    let gravity = model.gravity();
    let magnitude = gravity.norm();
    if magnitude > 0.0 {
        let dir = gravity / magnitude;
        lines.push(format!(
            "Eall, GRAV,{},{},{},{}",
            Real(magnitude),
            Real(dir.x),
            Real(dir.y),
            Real(dir.z)
        ));
    }

    lines.push("*CLOAD".to_string());
    for node in &mesh.nodes {
        let Some(id) = node.id() else { continue };
        let n = ccx_id(id);
        let components = node.force.iter().chain(node.moment.iter());
        for (dof, value) in (1..=6).zip(components) {
            if *value != 0.0 {
                lines.push(format!("{n},{dof},{}", Real(*value)));
            }
        }
    }

    for (id, _) in mesh.lines() {
        let n = ccx_id(id);
        lines.extend([
            format!("*SURFACE,NAME = S{n}S"),
            format!("{n},S6"),
            format!("*SURFACE,NAME = S{n}E"),
            format!("{n},S4"),
            format!("*SECTION PRINT,SURFACE = S{n}S,NAME = S{n}S"),
            "SOF".to_string(),
            format!("*SECTION PRINT,SURFACE = S{n}E,NAME = S{n}E"),
            "SOF".to_string(),
        ]);
    }

    lines.extend(
        [
            "*EL FILE,GLOBAL=NO",
            "S, E",
            "*NODE PRINT,NSET=Nall,GLOBAL=YES",
            "U",
            "*END STEP",
        ]
        .map(String::from),
    );
    lines
}
