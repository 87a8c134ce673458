//! The structural model: mesh, components, materials, loads and supports.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::binding::{LoadBinding, bind_load, bind_support};
use crate::component::{Bar, ComponentKind, Panel};
use crate::error::{ModelError, Result};
use crate::geometry::Vector;
use crate::loads::{Load, Support};
use crate::material::{Material, MaterialCollection};
use crate::mesh::{Element, Mesh};
use crate::store::{Indexed, IndexedStore};

/// Files exchanged with the mesher and the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Solver input deck
    Inp,
    /// Solver fixed-column results
    Frd,
    /// Solver free-form results
    Dat,
    /// Mesher script
    Geo,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Inp => "inp",
            FileType::Frd => "frd",
            FileType::Dat => "dat",
            FileType::Geo => "geo",
        }
    }
}

/// Location and base name of the model's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub directory: PathBuf,
    pub name: String,
}

impl ArtifactPaths {
    pub fn new(directory: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            directory: directory.into(),
            name: name.to_string(),
        }
    }

    /// `<dir>/<name>`
    pub fn base(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    pub fn file(&self, file_type: FileType) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.name, file_type.extension()))
    }

    /// Mesh written by the mesher
    pub fn mesh_file(&self) -> PathBuf {
        self.directory.join(format!("{}_Mesh.inp", self.name))
    }

    /// Bar curves exported for the mesher
    pub fn curves_file(&self) -> PathBuf {
        self.directory.join(format!("{}_Curves.iges", self.name))
    }

    /// Panel surfaces exported for the mesher
    pub fn surfaces_file(&self) -> PathBuf {
        self.directory.join(format!("{}_Surfaces.iges", self.name))
    }
}

/// Components still waiting for their mesh elements, in declaration order.
///
/// The mesher emits one physical group per bar and per panel, in the order
/// the components were declared; import consumes one token per group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingComponents {
    bars: VecDeque<usize>,
    panels: VecDeque<usize>,
}

impl PendingComponents {
    /// Next component of the given kind, if any is left.
    pub fn next(&mut self, kind: ComponentKind) -> Option<usize> {
        match kind {
            ComponentKind::Bar => self.bars.pop_front(),
            ComponentKind::Panel => self.panels.pop_front(),
        }
    }

    pub fn remaining(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Bar => self.bars.len(),
            ComponentKind::Panel => self.panels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty() && self.panels.is_empty()
    }
}

/// Old id -> new id maps used when copying a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdTranslation {
    pub nodes: HashMap<usize, usize>,
    pub elements: HashMap<usize, usize>,
    pub bars: HashMap<usize, usize>,
    pub panels: HashMap<usize, usize>,
}

impl IdTranslation {
    fn map(table: &HashMap<usize, usize>, kind: &'static str, id: usize) -> Result<usize> {
        table
            .get(&id)
            .copied()
            .ok_or(ModelError::NotFound { kind, id })
    }

    pub fn node(&self, id: usize) -> Result<usize> {
        Self::map(&self.nodes, "Node", id)
    }

    pub fn element(&self, id: usize) -> Result<usize> {
        Self::map(&self.elements, "Element", id)
    }

    pub fn component(&self, kind: ComponentKind, id: usize) -> Result<usize> {
        match kind {
            ComponentKind::Bar => Self::map(&self.bars, "Bar", id),
            ComponentKind::Panel => Self::map(&self.panels, "Panel", id),
        }
    }
}

/// Structural model
#[derive(Debug, Clone)]
pub struct Model {
    paths: ArtifactPaths,
    tolerance: f64,
    mesh: Mesh,
    bars: IndexedStore<Bar>,
    panels: IndexedStore<Panel>,
    materials: MaterialCollection,
    loads: Vec<Load>,
    unbound: Vec<usize>,
    supports: Vec<Support>,
    gravity: Vector,
}

impl Model {
    pub fn new(name: &str, directory: impl AsRef<Path>, tolerance: f64) -> Self {
        Self {
            paths: ArtifactPaths::new(directory.as_ref(), name),
            tolerance,
            mesh: Mesh::new(),
            bars: IndexedStore::new(),
            panels: IndexedStore::new(),
            materials: MaterialCollection::new(),
            loads: Vec::new(),
            unbound: Vec::new(),
            supports: Vec::new(),
            gravity: Vector::zeros(),
        }
    }

    pub fn name(&self) -> &str {
        &self.paths.name
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    /// Replace the mesh. Component element lists are cleared.
    pub fn set_mesh(&mut self, mesh: Mesh) {
        self.mesh = mesh;
        for bar in self.bars.iter_mut() {
            bar.elements.clear();
        }
        for panel in self.panels.iter_mut() {
            panel.elements.clear();
        }
    }

    pub fn bars(&self) -> &IndexedStore<Bar> {
        &self.bars
    }

    pub fn panels(&self) -> &IndexedStore<Panel> {
        &self.panels
    }

    pub fn materials(&self) -> &MaterialCollection {
        &self.materials
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn supports(&self) -> &[Support] {
        &self.supports
    }

    /// Sum of all gravity loads
    pub fn gravity(&self) -> Vector {
        self.gravity
    }

    pub fn add_bar(&mut self, bar: Bar) -> Result<usize> {
        self.add_bar_with_id(bar, None)
    }

    /// Add a bar; its material joins the material collection.
    pub fn add_bar_with_id(&mut self, mut bar: Bar, id: Option<usize>) -> Result<usize> {
        if let Some(existing) = bar.id() {
            return Err(ModelError::AlreadyIndexed(existing));
        }
        if let Some(id) = id.filter(|&id| self.bars.contains(id)) {
            return Err(ModelError::IdTaken(id));
        }
        bar.material = self.materials.add(Arc::clone(&bar.material))?;
        self.bars.add_with_id(bar, id)
    }

    pub fn add_panel(&mut self, panel: Panel) -> Result<usize> {
        self.add_panel_with_id(panel, None)
    }

    pub fn add_panel_with_id(&mut self, mut panel: Panel, id: Option<usize>) -> Result<usize> {
        if let Some(existing) = panel.id() {
            return Err(ModelError::AlreadyIndexed(existing));
        }
        if let Some(id) = id.filter(|&id| self.panels.contains(id)) {
            return Err(ModelError::IdTaken(id));
        }
        panel.material = self.materials.add(Arc::clone(&panel.material))?;
        self.panels.add_with_id(panel, id)
    }

    pub fn add_material(&mut self, material: Arc<Material>) -> Result<Arc<Material>> {
        self.materials.add(material)
    }

    /// Record a load and bind it to the current mesh.
    pub fn add_load(&mut self, load: Load) -> Result<LoadBinding> {
        let binding = bind_load(&mut self.mesh, &load, self.tolerance, &mut self.gravity)?;
        if binding == LoadBinding::Unbound {
            warn!(
                load = load.kind(),
                tolerance = self.tolerance,
                "no primary node within tolerance, load not applied"
            );
            self.unbound.push(self.loads.len());
        }
        self.loads.push(load);
        Ok(binding)
    }

    /// Loads that found no node to act on.
    pub fn unbound_loads(&self) -> impl Iterator<Item = &Load> {
        self.unbound.iter().map(|&i| &self.loads[i])
    }

    /// Record a support and bind it to the current mesh.
    pub fn add_support(&mut self, mut support: Support) {
        bind_support(&self.mesh, &mut support, self.tolerance);
        if support.nodes().is_empty() {
            warn!(support = %support.name, "support did not bind any node");
        }
        self.supports.push(support);
    }

    /// Tokens for every component, in declaration order.
    pub fn pending_components(&self) -> PendingComponents {
        PendingComponents {
            bars: self.bars.iter().filter_map(|b| b.id()).collect(),
            panels: self.panels.iter().filter_map(|p| p.id()).collect(),
        }
    }

    /// Hand mesh elements to a component.
    ///
    /// Bars take 1D elements and enforce their profile's order requirement;
    /// panels take 2D elements and stamp their family on them.
    pub fn assign_elements(
        &mut self,
        kind: ComponentKind,
        component: usize,
        elements: Vec<usize>,
    ) -> Result<()> {
        for &id in &elements {
            let element = self.mesh.element(id)?;
            if element.dimension() != kind.dimension() {
                return Err(ModelError::InvalidGeometry(format!(
                    "element {id} is {}D, {kind:?} {component} needs {}D elements",
                    element.dimension(),
                    kind.dimension()
                )));
            }
        }

        match kind {
            ComponentKind::Bar => {
                let bar = self
                    .bars
                    .get_mut(component)
                    .ok_or(ModelError::NotFound { kind: "Bar", id: component })?;
                if bar.profile().requires_second_order() {
                    for &id in &elements {
                        if self.mesh.element(id)?.order() != 2 {
                            return Err(ModelError::ProfileOrder(bar.profile().name().to_string()));
                        }
                    }
                }
                for &id in &elements {
                    self.mesh.element_mut(id)?.set_component(Some(component));
                }
                bar.elements = elements;
            }
            ComponentKind::Panel => {
                let panel = self
                    .panels
                    .get_mut(component)
                    .ok_or(ModelError::NotFound { kind: "Panel", id: component })?;
                for &id in &elements {
                    let element = self.mesh.element_mut(id)?;
                    element.set_component(Some(component));
                    if let Element::Face(face) = element {
                        face.family = panel.family();
                    }
                }
                panel.elements = elements;
            }
        }
        Ok(())
    }

    /// Independent deep copy with compacted ids.
    pub fn snapshot(&self) -> Result<Model> {
        self.snapshot_with_translation().map(|(model, _)| model)
    }

    /// Deep copy that renumbers every store from zero in enumeration order.
    /// All cross references (element nodes, component elements, element
    /// owners, support nodes) are rewritten through the returned table.
    pub fn snapshot_with_translation(&self) -> Result<(Model, IdTranslation)> {
        let mut table = IdTranslation::default();
        let mut copy = Model::new(&self.paths.name, &self.paths.directory, self.tolerance);
        copy.gravity = self.gravity;

        for material in self.materials.iter() {
            copy.materials.add(Arc::new(Material::clone(material)))?;
        }
        let material = |m: &Arc<Material>, materials: &MaterialCollection| {
            materials
                .get(&m.name)
                .cloned()
                .ok_or_else(|| ModelError::MaterialConflict(m.name.clone()))
        };

        for bar in self.bars.iter() {
            let mut b = bar.clone();
            b.set_id(None);
            b.material = material(&bar.material, &copy.materials)?;
            b.elements.clear();
            let new = copy.bars.add(b)?;
            if let Some(old) = bar.id() {
                table.bars.insert(old, new);
            }
        }
        for panel in self.panels.iter() {
            let mut p = panel.clone();
            p.set_id(None);
            p.material = material(&panel.material, &copy.materials)?;
            p.elements.clear();
            let new = copy.panels.add(p)?;
            if let Some(old) = panel.id() {
                table.panels.insert(old, new);
            }
        }

        for node in self.mesh.nodes.iter() {
            let mut n = node.clone();
            n.set_id(None);
            let new = copy.mesh.nodes.add(n)?;
            if let Some(old) = node.id() {
                table.nodes.insert(old, new);
            }
        }

        for element in self.mesh.elements.iter() {
            let mut e = element.clone();
            e.set_id(None);
            for n in e.nodes_mut().iter_mut() {
                *n = table.node(*n)?;
            }
            let owner = match element {
                Element::Line(line) => line
                    .component()
                    .map(|c| table.component(ComponentKind::Bar, c))
                    .transpose()?,
                Element::Face(face) => face
                    .component()
                    .map(|c| table.component(ComponentKind::Panel, c))
                    .transpose()?,
            };
            e.set_component(owner);
            let new = copy.mesh.elements.add(e)?;
            if let Some(old) = element.id() {
                table.elements.insert(old, new);
            }
        }

        for (bar, b) in self.bars.iter().zip(copy.bars.iter_mut()) {
            b.elements = bar
                .elements()
                .iter()
                .map(|&e| table.element(e))
                .collect::<Result<_>>()?;
        }
        for (panel, p) in self.panels.iter().zip(copy.panels.iter_mut()) {
            p.elements = panel
                .elements()
                .iter()
                .map(|&e| table.element(e))
                .collect::<Result<_>>()?;
        }

        copy.loads = self.loads.clone();
        copy.unbound = self.unbound.clone();
        for support in &self.supports {
            let mut s = support.clone();
            s.nodes = support
                .nodes()
                .iter()
                .map(|&n| table.node(n))
                .collect::<Result<_>>()?;
            copy.supports.push(s);
        }

        debug!(
            nodes = table.nodes.len(),
            elements = table.elements.len(),
            "model snapshot"
        );
        Ok((copy, table))
    }
}
