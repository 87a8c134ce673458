//! JSON project file: components, materials, boundary conditions and
//! run settings for one model.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gmccx_io::{CodecError, MesherParams, StepSettings};
use gmccx_model::{
    Bar, ElementFamily, LineSegment, Load, Material, MaterialLibrary, Model, ModelError, Panel,
    Point, Profile, Support, Surface,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Unknown material '{0}': not defined in the project or the library")]
    UnknownMaterial(String),

    #[error("Cannot read project {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid project file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, ProjectError>;

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_tolerance() -> f64 {
    1e-3
}

fn default_true() -> bool {
    true
}

fn default_family() -> ElementFamily {
    ElementFamily::Shell
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarDef {
    pub start: Point,
    pub end: Point,
    pub profile: Profile,
    pub material: String,
    /// Radians about the bar axis
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub offset: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelDef {
    pub outline: Vec<Point>,
    pub thickness: f64,
    pub material: String,
    #[serde(default = "default_family")]
    pub family: ElementFamily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Artifact directory; relative paths resolve against the project file
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub bars: Vec<BarDef>,
    #[serde(default)]
    pub panels: Vec<PanelDef>,
    #[serde(default)]
    pub loads: Vec<Load>,
    #[serde(default)]
    pub supports: Vec<Support>,
    #[serde(default)]
    pub mesher: MesherParams,
    #[serde(default)]
    pub step: StepSettings,
    #[serde(default = "default_true")]
    pub reduced_integration: bool,
}

impl Project {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut project: Project = serde_json::from_str(&raw)?;
        if project.directory.is_relative() {
            if let Some(parent) = path.parent() {
                project.directory = parent.join(&project.directory);
            }
        }
        debug!(
            path = %path.display(),
            bars = project.bars.len(),
            panels = project.panels.len(),
            "loaded project"
        );
        Ok(project)
    }

    /// Project materials first, then the standard library.
    fn material(&self, name: &str) -> Result<Arc<Material>> {
        self.materials
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .cloned()
            .or_else(|| MaterialLibrary::find(name))
            .map(Arc::new)
            .ok_or_else(|| ProjectError::UnknownMaterial(name.to_string()))
    }

    /// Model with components only; mesh and boundary conditions come later.
    pub fn build_model(&self) -> Result<Model> {
        let mut model = Model::new(&self.name, &self.directory, self.tolerance);
        for material in &self.materials {
            model.add_material(Arc::new(material.clone()))?;
        }
        for def in &self.bars {
            let line = LineSegment::new(def.start, def.end);
            let material = self.material(&def.material)?;
            model.add_bar(Bar::new(line, def.profile.clone(), material, def.rotation, def.offset)?)?;
        }
        for def in &self.panels {
            let surface = Surface::polygon(def.outline.clone())?;
            let material = self.material(&def.material)?;
            model.add_panel(Panel::new(surface, def.thickness, material, def.family)?)?;
        }
        info!(
            model = model.name(),
            bars = model.bars().len(),
            panels = model.panels().len(),
            "model built"
        );
        Ok(model)
    }

    /// Bind the project's loads and supports to the model's current mesh.
    pub fn apply_boundary_conditions(&self, model: &mut Model) -> Result<()> {
        for load in &self.loads {
            model.add_load(load.clone())?;
        }
        for support in &self.supports {
            model.add_support(support.clone());
        }
        let unbound = model.unbound_loads().count();
        if unbound > 0 {
            warn!(unbound, "some loads did not reach the mesh");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"{
        "name": "portal",
        "materials": [
            {"name": "S355", "density": 7850, "kind": "Isotropic",
             "youngs_modulus": 210e9, "poissons_ratio": 0.3}
        ],
        "bars": [
            {"start": [0, 0, 0], "end": [0, 0, 3],
             "profile": {"kind": "Rectangular", "height": 0.3, "width": 0.2},
             "material": "S355"},
            {"start": [0, 0, 3], "end": [4, 0, 3],
             "profile": {"kind": "Round", "diameter": 0.2},
             "material": "steel"}
        ],
        "panels": [
            {"outline": [[0, 0, 3], [4, 0, 3], [4, 2, 3], [0, 2, 3]],
             "thickness": 0.2, "material": "Concrete"}
        ],
        "loads": [{"type": "Gravity", "acceleration": [0, 0, -9.81]}],
        "mesher": {"max_char_length": 0.5},
        "step": {"nonlinear": true}
    }"#;

    #[test]
    fn defaults_fill_missing_settings() {
        let project: Project = serde_json::from_str(PROJECT).unwrap();
        assert_eq!(project.tolerance, 1e-3);
        assert_eq!(project.directory, PathBuf::from("."));
        assert!(project.reduced_integration);
        assert_eq!(project.panels[0].family, ElementFamily::Shell);
        assert_eq!(project.mesher.max_char_length, 0.5);
        assert!(project.step.nonlinear);
        assert_eq!(project.step.total_time, 1.0);
    }

    #[test]
    fn materials_resolve_from_project_then_library() {
        let project: Project = serde_json::from_str(PROJECT).unwrap();
        let model = project.build_model().unwrap();
        assert_eq!(model.bars().len(), 2);
        assert_eq!(model.panels().len(), 1);

        let mut names: Vec<&str> = model.materials().iter().map(|m| m.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Concrete", "S355", "Steel"]);
    }

    #[test]
    fn project_materials_match_any_case() {
        let mut project: Project = serde_json::from_str(PROJECT).unwrap();
        project.bars[0].material = "s355".into();
        let model = project.build_model().unwrap();
        let bar = model.bars().get(0).unwrap();
        assert_eq!(bar.material().name, "S355");
        assert_eq!(bar.material().density, 7850.0);
    }

    #[test]
    fn unknown_material_is_reported() {
        let mut project: Project = serde_json::from_str(PROJECT).unwrap();
        project.bars[0].material = "Unobtainium".into();
        let err = project.build_model().unwrap_err();
        assert!(matches!(err, ProjectError::UnknownMaterial(name) if name == "Unobtainium"));
    }

    #[test]
    fn relative_directory_follows_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.json");
        fs::write(&path, PROJECT).unwrap();
        let project = Project::load(&path).unwrap();
        assert_eq!(project.directory, dir.path().join("."));
    }
}
