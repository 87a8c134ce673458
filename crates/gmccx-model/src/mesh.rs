//! Mesh data structures: nodes, 1D/2D elements and their container.
//!
//! Ids are internal, 0-based and assigned by [`IndexedStore`]. Solver files
//! use 1-based ids, see [`ccx_id`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::geometry::{Point, Vector, centroid};
use crate::store::{Indexed, IndexedStore};

/// External (solver file) id for an internal id.
pub fn ccx_id(id: usize) -> usize {
    id + 1
}

/// A node in the finite element mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: Option<usize>,
    /// Location in global coordinates
    pub location: Point,
    /// Corner or end node, as opposed to a mid-side node
    pub primary: bool,
    /// Accumulated concentrated force
    pub force: Vector,
    /// Accumulated concentrated moment
    pub moment: Vector,
    /// Displacement read back from the solver
    pub displacement: Vector,
}

impl Node {
    pub fn new(location: Point) -> Self {
        Self {
            id: None,
            location,
            primary: false,
            force: Vector::zeros(),
            moment: Vector::zeros(),
            displacement: Vector::zeros(),
        }
    }

    pub fn add_force(&mut self, force: &Vector) {
        self.force += force;
    }

    pub fn add_moment(&mut self, moment: &Vector) {
        self.moment += moment;
    }

    /// Displacement result by channel.
    pub fn displacement_result(&self, result: NodalResult) -> f64 {
        match result {
            NodalResult::DX => self.displacement.x,
            NodalResult::DY => self.displacement.y,
            NodalResult::DZ => self.displacement.z,
            NodalResult::DTotal => self.displacement.norm(),
        }
    }
}

impl Indexed for Node {
    fn id(&self) -> Option<usize> {
        self.id
    }

    fn set_id(&mut self, id: Option<usize>) {
        self.id = id;
    }
}

/// Nodal result channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodalResult {
    DX,
    DY,
    DZ,
    DTotal,
}

impl NodalResult {
    pub const ALL: [NodalResult; 4] = [Self::DX, Self::DY, Self::DZ, Self::DTotal];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DX => "dX",
            Self::DY => "dY",
            Self::DZ => "dZ",
            Self::DTotal => "dTotal",
        }
    }
}

/// Section force channels of 1D elements, one value per element end.
pub const SECTION_FORCES: [&str; 6] = ["Fx", "Fy", "Fz", "Mxx", "Myy", "Mzz"];
/// Stress channels of 2D elements, one value per result vertex.
pub const STRESS_2D: [&str; 6] = ["Sxx", "Syy", "Szz", "Sxy", "Sxz", "Syz"];
/// Strain channels of 2D elements, one value per result vertex.
pub const STRAIN_2D: [&str; 6] = ["Exx", "Eyy", "Ezz", "Exy", "Exz", "Eyz"];

/// Finite element formulation of a 2D element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElementFamily {
    Shell,
    Membrane,
    PlaneStress,
    PlaneStrain,
    #[default]
    Unknown,
}

impl ElementFamily {
    /// CalculiX element name prefix
    pub fn ccx_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Shell => Some("S"),
            Self::Membrane => Some("M3D"),
            Self::PlaneStress => Some("CPS"),
            Self::PlaneStrain => Some("CPE"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for ElementFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shell => "Shell",
            Self::Membrane => "Membrane",
            Self::PlaneStress => "PlaneStress",
            Self::PlaneStrain => "PlaneStrain",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Named result arrays of an element. A channel keeps its length once declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    channels: BTreeMap<String, Vec<f64>>,
}

impl ResultTable {
    /// Declare a zero-filled channel, or check the length of an existing one.
    pub fn declare(&mut self, name: &str, len: usize) -> Result<()> {
        match self.channels.get(name) {
            Some(values) if values.len() != len => Err(ModelError::ResultChannel {
                name: name.to_string(),
                message: format!("declared with {} values, requested {len}", values.len()),
            }),
            Some(_) => Ok(()),
            None => {
                self.channels.insert(name.to_string(), vec![0.0; len]);
                Ok(())
            }
        }
    }

    /// Declare and fill a channel in one go.
    pub fn store(&mut self, name: &str, values: &[f64]) -> Result<()> {
        self.declare(name, values.len())?;
        if let Some(slot) = self.channels.get_mut(name) {
            slot.copy_from_slice(values);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

fn check_order(order: usize) -> Result<()> {
    if order == 1 || order == 2 {
        Ok(())
    } else {
        Err(ModelError::InvalidOrder(order))
    }
}

/// Beam element
#[derive(Debug, Clone, PartialEq)]
pub struct Element1D {
    id: Option<usize>,
    nodes: Vec<usize>,
    order: usize,
    pub reduced_integration: bool,
    pub results: ResultTable,
    /// Owning bar, set on assignment
    pub(crate) component: Option<usize>,
}

impl Element1D {
    pub fn new(nodes: Vec<usize>, order: usize, reduced_integration: bool) -> Result<Self> {
        check_order(order)?;
        if nodes.len() != order + 1 {
            return Err(ModelError::InvalidNodeCount {
                dimension: 1,
                order,
                count: nodes.len(),
            });
        }
        Ok(Self {
            id: None,
            nodes,
            order,
            reduced_integration,
            results: ResultTable::default(),
            component: None,
        })
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// End nodes
    pub fn primary_nodes(&self) -> [usize; 2] {
        [self.nodes[0], self.nodes[self.nodes.len() - 1]]
    }

    pub fn component(&self) -> Option<usize> {
        self.component
    }

    /// `B31`/`B32`, with `R` for reduced integration
    pub fn ccx_type(&self) -> String {
        let base = if self.order == 1 { "B31" } else { "B32" };
        if self.reduced_integration {
            format!("{base}R")
        } else {
            base.to_string()
        }
    }
}

/// Shell, membrane or plane element
#[derive(Debug, Clone, PartialEq)]
pub struct Element2D {
    id: Option<usize>,
    nodes: Vec<usize>,
    order: usize,
    primary_count: usize,
    pub reduced_integration: bool,
    pub results: ResultTable,
    /// Accumulated pressure, positive along the element normal
    pressure: f64,
    /// Local material axes
    pub orientation: [Vector; 2],
    pub composite: bool,
    pub family: ElementFamily,
    /// Owning panel, set on assignment
    pub(crate) component: Option<usize>,
}

impl Element2D {
    pub fn new(nodes: Vec<usize>, order: usize, reduced_integration: bool) -> Result<Self> {
        check_order(order)?;
        let count = nodes.len();
        if count % order != 0 || !(3..=4).contains(&(count / order)) {
            return Err(ModelError::InvalidNodeCount {
                dimension: 2,
                order,
                count,
            });
        }
        Ok(Self {
            id: None,
            primary_count: count / order,
            nodes,
            order,
            reduced_integration,
            results: ResultTable::default(),
            pressure: 0.0,
            orientation: [Vector::x(), Vector::y()],
            composite: false,
            family: ElementFamily::Unknown,
            component: None,
        })
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn primary_count(&self) -> usize {
        self.primary_count
    }

    /// Corner nodes
    pub fn primary_nodes(&self) -> &[usize] {
        &self.nodes[..self.primary_count]
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn add_pressure(&mut self, pressure: f64) {
        self.pressure += pressure;
    }

    pub fn component(&self) -> Option<usize> {
        self.component
    }

    /// Reverse the element orientation. Mid-side nodes are reversed separately
    /// from the corners; the pressure changes sign with the normal.
    pub fn flip_normal(&mut self) {
        if self.order == 1 {
            self.nodes.reverse();
        } else {
            let (corners, mids) = self.nodes.split_at_mut(self.primary_count);
            corners.reverse();
            mids.reverse();
        }
        self.pressure = -self.pressure;
    }

    /// Corner locations.
    pub fn vertices(&self, nodes: &IndexedStore<Node>) -> Result<Vec<Point>> {
        self.primary_nodes()
            .iter()
            .map(|&id| {
                nodes
                    .get(id)
                    .map(|n| n.location)
                    .ok_or(ModelError::NotFound { kind: "Node", id })
            })
            .collect()
    }

    pub fn centroid(&self, nodes: &IndexedStore<Node>) -> Result<Point> {
        Ok(centroid(&self.vertices(nodes)?))
    }

    /// (n2 - n1) x (n0 - n1)
    pub fn normal(&self, nodes: &IndexedStore<Node>, unitize: bool) -> Result<Vector> {
        let v = self.vertices(nodes)?;
        let n = (v[2] - v[1]).cross(&(v[0] - v[1]));
        if unitize {
            Ok(n.try_normalize(f64::EPSILON).unwrap_or(n))
        } else {
            Ok(n)
        }
    }

    pub fn ccx_type(&self) -> Result<String> {
        let prefix = self
            .family
            .ccx_prefix()
            .ok_or_else(|| ModelError::UnsupportedFamily(self.family.to_string()))?;
        let suffix = match (self.primary_count, self.order, self.reduced_integration) {
            (3, 1, _) => "3",
            (3, _, _) => "6",
            (_, 1, false) => "4",
            (_, 1, true) => "4R",
            (_, _, false) => "8",
            (_, _, true) => "8R",
        };
        Ok(format!("{prefix}{suffix}"))
    }
}

/// Mesh element
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Line(Element1D),
    Face(Element2D),
}

impl Element {
    pub fn nodes(&self) -> &[usize] {
        match self {
            Element::Line(e) => e.nodes(),
            Element::Face(e) => e.nodes(),
        }
    }

    pub fn order(&self) -> usize {
        match self {
            Element::Line(e) => e.order(),
            Element::Face(e) => e.order(),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Element::Line(_) => 1,
            Element::Face(_) => 2,
        }
    }

    pub fn primary_nodes(&self) -> Vec<usize> {
        match self {
            Element::Line(e) => e.primary_nodes().to_vec(),
            Element::Face(e) => e.primary_nodes().to_vec(),
        }
    }

    pub fn results(&self) -> &ResultTable {
        match self {
            Element::Line(e) => &e.results,
            Element::Face(e) => &e.results,
        }
    }

    pub fn results_mut(&mut self) -> &mut ResultTable {
        match self {
            Element::Line(e) => &mut e.results,
            Element::Face(e) => &mut e.results,
        }
    }

    pub fn ccx_type(&self) -> Result<String> {
        match self {
            Element::Line(e) => Ok(e.ccx_type()),
            Element::Face(e) => e.ccx_type(),
        }
    }

    pub fn as_line(&self) -> Option<&Element1D> {
        match self {
            Element::Line(e) => Some(e),
            Element::Face(_) => None,
        }
    }

    pub fn as_line_mut(&mut self) -> Option<&mut Element1D> {
        match self {
            Element::Line(e) => Some(e),
            Element::Face(_) => None,
        }
    }

    pub fn as_face(&self) -> Option<&Element2D> {
        match self {
            Element::Face(e) => Some(e),
            Element::Line(_) => None,
        }
    }

    pub fn as_face_mut(&mut self) -> Option<&mut Element2D> {
        match self {
            Element::Face(e) => Some(e),
            Element::Line(_) => None,
        }
    }

    pub(crate) fn set_component(&mut self, component: Option<usize>) {
        match self {
            Element::Line(e) => e.component = component,
            Element::Face(e) => e.component = component,
        }
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<usize> {
        match self {
            Element::Line(e) => &mut e.nodes,
            Element::Face(e) => &mut e.nodes,
        }
    }
}

impl Indexed for Element {
    fn id(&self) -> Option<usize> {
        match self {
            Element::Line(e) => e.id,
            Element::Face(e) => e.id,
        }
    }

    fn set_id(&mut self, id: Option<usize>) {
        match self {
            Element::Line(e) => e.id = id,
            Element::Face(e) => e.id = id,
        }
    }
}

impl From<Element1D> for Element {
    fn from(e: Element1D) -> Self {
        Element::Line(e)
    }
}

impl From<Element2D> for Element {
    fn from(e: Element2D) -> Self {
        Element::Face(e)
    }
}

/// Node and element container
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub nodes: IndexedStore<Node>,
    pub elements: IndexedStore<Element>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<usize> {
        self.nodes.add(node)
    }

    /// Add an element; every node it references must exist.
    pub fn add_element(&mut self, element: impl Into<Element>) -> Result<usize> {
        let element = element.into();
        if let Some(&missing) = element.nodes().iter().find(|&&n| !self.nodes.contains(n)) {
            return Err(ModelError::NotFound {
                kind: "Node",
                id: missing,
            });
        }
        self.elements.add(element)
    }

    pub fn node(&self, id: usize) -> Result<&Node> {
        self.nodes.get(id).ok_or(ModelError::NotFound { kind: "Node", id })
    }

    pub fn element(&self, id: usize) -> Result<&Element> {
        self.elements
            .get(id)
            .ok_or(ModelError::NotFound { kind: "Element", id })
    }

    pub fn element_mut(&mut self, id: usize) -> Result<&mut Element> {
        self.elements
            .get_mut(id)
            .ok_or(ModelError::NotFound { kind: "Element", id })
    }

    /// Iterate over 2D elements with their ids.
    pub fn faces(&self) -> impl Iterator<Item = (usize, &Element2D)> {
        self.elements
            .iter()
            .filter_map(|e| Some((e.id()?, e.as_face()?)))
    }

    pub fn lines(&self) -> impl Iterator<Item = (usize, &Element1D)> {
        self.elements
            .iter()
            .filter_map(|e| Some((e.id()?, e.as_line()?)))
    }

    /// Copy of the mesh with nodes moved by `factor` times their displacement.
    pub fn deformed(&self, factor: f64) -> Mesh {
        let mut mesh = self.clone();
        for node in mesh.nodes.iter_mut() {
            node.location += node.displacement * factor;
        }
        mesh
    }

    pub fn statistics(&self) -> MeshStatistics {
        let mut stats = MeshStatistics {
            num_nodes: self.nodes.len(),
            num_primary_nodes: self.nodes.iter().filter(|n| n.primary).count(),
            num_elements: self.elements.len(),
            ..Default::default()
        };
        for element in &self.elements {
            let key = element.ccx_type().unwrap_or_else(|_| match element {
                Element::Line(_) => "1D".to_string(),
                Element::Face(e) => format!("2D{}", e.primary_count()),
            });
            *stats.element_types.entry(key).or_insert(0) += 1;
        }
        stats
    }
}

/// Mesh statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshStatistics {
    pub num_nodes: usize,
    pub num_primary_nodes: usize,
    pub num_elements: usize,
    pub element_types: BTreeMap<String, usize>,
}

impl MeshStatistics {
    /// Format statistics as a human-readable string
    pub fn format(&self) -> String {
        let mut s = format!(
            "Mesh: {} nodes ({} primary), {} elements\n",
            self.num_nodes, self.num_primary_nodes, self.num_elements
        );
        for (ty, count) in &self.element_types {
            s.push_str(&format!("  {ty}: {count}\n"));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            mesh.add_node(Node::new(Point::new(x, y, 0.0))).unwrap();
        }
        mesh.add_element(Element2D::new(vec![0, 1, 2, 3], 1, false).unwrap())
            .unwrap();
        mesh
    }

    #[test]
    fn element_order_is_validated() {
        assert_eq!(
            Element1D::new(vec![0, 1], 3, false).unwrap_err(),
            ModelError::InvalidOrder(3)
        );
        assert!(Element1D::new(vec![0, 1], 2, false).is_err());
        assert!(Element2D::new(vec![0, 1, 2, 3, 4], 1, false).is_err());
        assert!(Element2D::new(vec![0, 1, 2, 3, 4, 5, 6], 2, false).is_err());
        assert_eq!(Element2D::new(vec![0; 8], 2, false).unwrap().primary_count(), 4);
        assert_eq!(Element2D::new(vec![0; 6], 2, false).unwrap().primary_count(), 3);
    }

    #[test]
    fn normal_follows_node_order() {
        let mesh = square_mesh();
        let face = mesh.element(0).unwrap().as_face().unwrap();
        let n = face.normal(&mesh.nodes, true).unwrap();
        assert_eq!(n, Vector::new(0.0, 0.0, 1.0));
        assert_eq!(face.centroid(&mesh.nodes).unwrap(), Point::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn flip_reverses_nodes_and_pressure() {
        let mut face = Element2D::new(vec![0, 1, 2, 3], 1, false).unwrap();
        face.add_pressure(2.5);
        face.flip_normal();
        assert_eq!(face.nodes(), &[3, 2, 1, 0]);
        assert_eq!(face.pressure(), -2.5);

        let mut quad8 = Element2D::new((0..8).collect(), 2, false).unwrap();
        quad8.flip_normal();
        assert_eq!(quad8.nodes(), &[3, 2, 1, 0, 7, 6, 5, 4]);
    }

    #[test]
    fn ccx_types() {
        assert_eq!(Element1D::new(vec![0, 1], 1, false).unwrap().ccx_type(), "B31");
        assert_eq!(Element1D::new(vec![0, 1, 2], 2, true).unwrap().ccx_type(), "B32R");

        let mut tri = Element2D::new(vec![0, 1, 2], 1, true).unwrap();
        assert!(matches!(tri.ccx_type(), Err(ModelError::UnsupportedFamily(_))));
        tri.family = ElementFamily::Shell;
        assert_eq!(tri.ccx_type().unwrap(), "S3");

        let mut quad = Element2D::new((0..8).collect(), 2, true).unwrap();
        quad.family = ElementFamily::Membrane;
        assert_eq!(quad.ccx_type().unwrap(), "M3D8R");
        quad.family = ElementFamily::PlaneStrain;
        quad.reduced_integration = false;
        assert_eq!(quad.ccx_type().unwrap(), "CPE8");
    }

    #[test]
    fn add_element_requires_nodes() {
        let mut mesh = square_mesh();
        let err = mesh
            .add_element(Element1D::new(vec![0, 9], 1, false).unwrap())
            .unwrap_err();
        assert_eq!(err, ModelError::NotFound { kind: "Node", id: 9 });
    }

    #[test]
    fn result_channel_length_is_fixed() {
        let mut table = ResultTable::default();
        table.declare("Fx", 2).unwrap();
        table.store("Fx", &[1.0, -1.0]).unwrap();
        assert_eq!(table.get("Fx"), Some(&[1.0, -1.0][..]));
        assert!(table.store("Fx", &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn deformed_mesh_and_displacement_channels() {
        let mut mesh = square_mesh();
        mesh.nodes.get_mut(2).unwrap().displacement = Vector::new(0.0, 3.0, 4.0);
        let node = mesh.node(2).unwrap();
        assert_eq!(node.displacement_result(NodalResult::DTotal), 5.0);
        assert_eq!(node.displacement_result(NodalResult::DY), 3.0);

        let deformed = mesh.deformed(2.0);
        assert_eq!(deformed.node(2).unwrap().location, Point::new(1.0, 7.0, 8.0));
        assert_eq!(mesh.node(2).unwrap().location, Point::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn statistics_format() {
        let mut mesh = square_mesh();
        if let Some(face) = mesh.elements.get_mut(0).and_then(Element::as_face_mut) {
            face.family = ElementFamily::Shell;
        }
        let stats = mesh.statistics();
        assert_eq!(stats.num_nodes, 4);
        assert_eq!(stats.element_types.get("S4"), Some(&1));
        assert!(stats.format().contains("4 nodes"));
    }
}
