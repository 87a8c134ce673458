//! Reader for the Abaqus-style mesh file Gmsh writes (`<name>_Mesh.inp`).
//!
//! Nodes and elements are renumbered from zero in file order. Each
//! `*ELSET` named after a Gmsh physical group hands its elements to the
//! next pending bar (`PhysicalLine…`) or panel (`PhysicalSurface…`), so the
//! groups must appear in component declaration order.

use std::collections::HashMap;
use std::fs;

use gmccx_model::{
    ComponentKind, Element, Element1D, Element2D, Mesh, Model, Node, PendingComponents, Point,
};
use tracing::{debug, info};

use crate::error::{CodecError, Result};

/// Counts of what an import produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshImport {
    pub nodes: usize,
    pub elements: usize,
    pub bars: usize,
    pub panels: usize,
}

/// Read the model's mesh file and attach the mesh to its components.
pub fn read_mesh(model: &mut Model, reduced_integration: bool) -> Result<MeshImport> {
    let path = model.paths().mesh_file();
    let source = fs::read_to_string(&path)?;
    debug!(path = %path.display(), "reading mesh");
    import_mesh(model, &source, reduced_integration)
}

/// Parse `source` and replace the model's mesh with it.
///
/// The model is only modified when the whole file parsed and every element
/// set was accepted by its component.
pub fn import_mesh(model: &mut Model, source: &str, reduced_integration: bool) -> Result<MeshImport> {
    let mut parser = MeshParser::new(model.pending_components(), reduced_integration);
    for (index, line) in source.lines().enumerate() {
        parser.line(index + 1, line)?;
    }
    let parsed = parser.finish()?;

    let mut staged = model.clone();
    staged.set_mesh(parsed.mesh);
    let mut summary = MeshImport {
        nodes: staged.mesh().nodes.len(),
        elements: staged.mesh().elements.len(),
        ..Default::default()
    };
    for (kind, component, elements) in parsed.assignments {
        debug!(?kind, component, elements = elements.len(), "assigning element set");
        staged.assign_elements(kind, component, elements)?;
        match kind {
            ComponentKind::Bar => summary.bars += 1,
            ComponentKind::Panel => summary.panels += 1,
        }
    }
    *model = staged;

    info!(
        nodes = summary.nodes,
        elements = summary.elements,
        bars = summary.bars,
        panels = summary.panels,
        "mesh imported"
    );
    Ok(summary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Nodes,
    Elements { order: usize, dimension: usize },
}

struct ParsedMesh {
    mesh: Mesh,
    assignments: Vec<(ComponentKind, usize, Vec<usize>)>,
}

struct MeshParser {
    mesh: Mesh,
    reduced_integration: bool,
    block: Block,
    /// Open element set: receiving component kind and set name
    set: Option<(ComponentKind, String)>,
    set_elements: Vec<usize>,
    node_ids: HashMap<usize, usize>,
    element_ids: HashMap<usize, usize>,
    pending: PendingComponents,
    assignments: Vec<(ComponentKind, usize, Vec<usize>)>,
}

impl MeshParser {
    fn new(pending: PendingComponents, reduced_integration: bool) -> Self {
        Self {
            mesh: Mesh::new(),
            reduced_integration,
            block: Block::None,
            set: None,
            set_elements: Vec::new(),
            node_ids: HashMap::new(),
            element_ids: HashMap::new(),
            pending,
            assignments: Vec::new(),
        }
    }

    fn line(&mut self, number: usize, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        // Any non-numeric line closes the list collected so far.
        if self.set.is_some() && !line.starts_with(|c: char| c.is_ascii_digit()) {
            self.flush_set()?;
        }

        if line.starts_with('*') {
            return self.header(number, line);
        }
        if self.set.is_some() {
            return self.set_line(number, line);
        }
        match self.block {
            Block::Nodes => self.node_line(number, line),
            Block::Elements { order, dimension } => self.element_line(number, line, order, dimension),
            Block::None => Ok(()),
        }
    }

    fn header(&mut self, number: usize, line: &str) -> Result<()> {
        self.block = Block::None;
        self.set = None;

        if line.starts_with("*NODE") && !line.starts_with("*NODE ") {
            self.block = Block::Nodes;
            return Ok(());
        }

        let compact: String = line.chars().filter(|c| *c != ' ').collect();
        let upper = compact.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix("*ELEMENT,TYPE=") {
            let code = rest.split(',').next().unwrap_or_default();
            let (order, dimension) = match code {
                "T3D2" => (1, 1),
                "T3D3" => (2, 1),
                "CPS3" | "CPS4" => (1, 2),
                "CPS6" | "CPS8" => (2, 2),
                other => return Err(CodecError::UnsupportedElement(other.to_string())),
            };
            self.block = Block::Elements { order, dimension };
        } else if line.starts_with("*ELSET,") {
            let kind = if line.contains("PhysicalLine") {
                ComponentKind::Bar
            } else if line.contains("PhysicalSurface") {
                ComponentKind::Panel
            } else {
                return Err(CodecError::format(
                    number,
                    format!("element set is not a Gmsh physical line or surface: {line}"),
                ));
            };
            let name = compact
                .split_once("ELSET=")
                .map(|(_, name)| name.split(',').next().unwrap_or_default())
                .unwrap_or(&compact)
                .to_string();
            self.set = Some((kind, name));
        }
        Ok(())
    }

    fn node_line(&mut self, number: usize, line: &str) -> Result<()> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            return Err(CodecError::format(number, "node line needs an id and three coordinates"));
        }
        let external: usize = parse(number, fields[0], "node id")?;
        let mut xyz = [0.0; 3];
        for (slot, field) in xyz.iter_mut().zip(&fields[1..4]) {
            *slot = parse(number, field, "coordinate")?;
        }

        let id = self.mesh.add_node(Node::new(Point::new(xyz[0], xyz[1], xyz[2])))?;
        if self.node_ids.insert(external, id).is_some() {
            return Err(CodecError::format(number, format!("duplicate node {external}")));
        }
        Ok(())
    }

    fn element_line(&mut self, number: usize, line: &str, order: usize, dimension: usize) -> Result<()> {
        let mut fields = line.split(',').map(str::trim).filter(|f| !f.is_empty());
        let external: usize = match fields.next() {
            Some(field) => parse(number, field, "element id")?,
            None => return Ok(()),
        };
        let nodes = fields
            .map(|field| {
                let node: usize = parse(number, field, "node id")?;
                self.node_ids
                    .get(&node)
                    .copied()
                    .ok_or_else(|| CodecError::format(number, format!("unknown node {node}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let element: Element = if dimension == 1 {
            Element1D::new(nodes, order, self.reduced_integration)
                .map_err(|e| CodecError::format(number, e.to_string()))?
                .into()
        } else {
            Element2D::new(nodes, order, self.reduced_integration)
                .map_err(|e| CodecError::format(number, e.to_string()))?
                .into()
        };
        for node in element.primary_nodes() {
            if let Some(n) = self.mesh.nodes.get_mut(node) {
                n.primary = true;
            }
        }

        let id = self.mesh.add_element(element)?;
        if self.element_ids.insert(external, id).is_some() {
            return Err(CodecError::format(number, format!("duplicate element {external}")));
        }
        Ok(())
    }

    fn set_line(&mut self, number: usize, line: &str) -> Result<()> {
        for field in line.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let Ok(external) = field.parse::<usize>() else {
                continue;
            };
            let id = self
                .element_ids
                .get(&external)
                .copied()
                .ok_or_else(|| CodecError::format(number, format!("unknown element {external}")))?;
            self.set_elements.push(id);
        }
        Ok(())
    }

    fn flush_set(&mut self) -> Result<()> {
        let Some((kind, name)) = &self.set else {
            return Ok(());
        };
        let component = self
            .pending
            .next(*kind)
            .ok_or_else(|| CodecError::NoPendingComponent {
                kind: *kind,
                set: name.clone(),
            })?;
        let elements = std::mem::take(&mut self.set_elements);
        self.assignments.push((*kind, component, elements));
        Ok(())
    }

    fn finish(mut self) -> Result<ParsedMesh> {
        if !self.set_elements.is_empty() {
            self.flush_set()?;
        }
        Ok(ParsedMesh {
            mesh: self.mesh,
            assignments: self.assignments,
        })
    }
}

fn parse<T: std::str::FromStr>(line: usize, field: &str, what: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| CodecError::format(line, format!("invalid {what} '{field}'")))
}
