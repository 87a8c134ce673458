//! Gmsh `.geo` script writer.
//!
//! The script merges the exported bar curves and panel surfaces, splits
//! them at their mutual intersections so the mesh is conforming, tags one
//! physical group per input curve/surface (in declaration order) and
//! meshes in 2D with the OpenCASCADE kernel.

use std::fs;
use std::path::PathBuf;

use gmccx_model::{FileType, Model};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Gmsh 2D meshing algorithm (`Mesh.Algorithm`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeshAlgorithm {
    MeshAdapt,
    #[default]
    Automatic,
    Delaunay,
    Frontal,
    Bamg,
    DelQuad,
    Pack,
}

impl MeshAlgorithm {
    pub fn gmsh_code(&self) -> u8 {
        match self {
            MeshAlgorithm::MeshAdapt => 1,
            MeshAlgorithm::Automatic => 2,
            MeshAlgorithm::Delaunay => 5,
            MeshAlgorithm::Frontal => 6,
            MeshAlgorithm::Bamg => 7,
            MeshAlgorithm::DelQuad => 8,
            MeshAlgorithm::Pack => 9,
        }
    }
}

/// Shape of generated 2D elements (`Mesh.RecombineAll`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ElementShape {
    #[default]
    Tri,
    Quad,
}

impl ElementShape {
    pub fn recombine_flag(&self) -> u8 {
        match self {
            ElementShape::Tri => 0,
            ElementShape::Quad => 1,
        }
    }
}

/// Meshing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesherParams {
    pub element_shape: ElementShape,
    pub algorithm: MeshAlgorithm,
    pub max_char_length: f64,
    pub second_order: bool,
    pub smoothing_steps: u32,
    pub high_order_optimization: bool,
    pub optimization_threshold: f64,
    /// Optimize high order meshes on primary surface meshes
    pub unify_faces: bool,
}

impl Default for MesherParams {
    fn default() -> Self {
        Self {
            element_shape: ElementShape::Tri,
            algorithm: MeshAlgorithm::Automatic,
            max_char_length: 1.0,
            second_order: false,
            smoothing_steps: 1,
            high_order_optimization: false,
            optimization_threshold: 0.1,
            unify_faces: false,
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Script lines for the model base name `name`.
pub fn gmsh_script(name: &str, tolerance: f64, params: &MesherParams) -> Vec<String> {
    let mut lines: Vec<String> = vec![
        "SetFactory(\"OpenCASCADE\");".into(),
        format!("Geometry.Tolerance={tolerance};"),
        "Geometry.OCCFixDegenerated=1;".into(),
        "Geometry.OCCFixSmallEdges=1;".into(),
        "Geometry.OCCFixSmallFaces=1;".into(),
        "Geometry.OCCParallel=1;".into(),
        format!("Merge \"{name}_Curves.iges\";"),
        "lineList[] = Line \"*\";".into(),
        "initLineCount = #lineList[];".into(),
        format!("Merge \"{name}_Surfaces.iges\";"),
    ];

    lines.extend(
        [
            "lineList[] = Line \"*\";",
            "initSurfaceLineCount = #lineList[];",
            "surfaceList[] = Surface \"*\";",
            "initSurfaceCount = #surfaceList[];",
            "surfaceCount = #surfaceList[];",
            "linesToDelete = {};",
            "surfacesToDelete = {};",
            // Split every curve against everything, keep fragments as its group.
            "For i In {1:initLineCount}",
            "lineCountBefore = #lineList[];",
            "BooleanIntersection { Line{i}; }{ Line{1:initLineCount};",
            "Surface{1:initSurfaceCount}; }",
            "lineList[] = Line \"*\";",
            "lineCountAfter = #lineList[];",
            "If(lineCountAfter>lineCountBefore)",
            "Physical Line(i) = {lineCountBefore+1:lineCountAfter};",
            "linesToDelete+={i};",
            "Else",
            "Physical Line(i) = {i};",
            "EndIf",
            "EndFor",
            "For i In {1:initSurfaceCount}",
            "surfaceCountBefore = #surfaceList[];",
            "BooleanIntersection { Surface{i}; }{ Line{1:initLineCount}; ",
            "Surface{1:initSurfaceCount}; }",
            "surfaceList[] = Surface \"*\";",
            "surfaceCountAfter = #surfaceList[];",
            "If(surfaceCountAfter>surfaceCountBefore)",
            "Physical Surface(i) = {surfaceCountBefore+1:surfaceCountAfter};",
            "surfacesToDelete+={i};",
            "Else",
            "Physical Surface(i) = {i};",
            "EndIf",
            "EndFor",
            "For i In {0:#linesToDelete[]-1}",
            "Delete{Line{linesToDelete[i]};}",
            "EndFor",
            "For i In {0:#surfacesToDelete[]-1}",
            "Delete{Surface{surfacesToDelete[i]};}",
            "EndFor",
            "Geometry.Tolerance=1e-8;",
        ]
        .map(String::from),
    );

    lines.extend([
        format!("Mesh.Algorithm = {};", params.algorithm.gmsh_code()),
        format!("Mesh.CharacteristicLengthMax = {};", params.max_char_length),
        format!(
            "Mesh.ElementOrder = {};",
            if params.second_order { 2 } else { 1 }
        ),
        "Mesh.SecondOrderIncomplete = 1;".into(),
        format!("Mesh.Smoothing = {};", params.smoothing_steps),
        format!("Mesh.RecombineAll = {};", params.element_shape.recombine_flag()),
        "Mesh.SubdivisionAlgorithm = 0;".into(),
        format!("Mesh.HighOrderThresholdMin = {};", params.optimization_threshold),
        format!("Mesh.HighOrderOptPrimSurfMesh = {};", flag(params.unify_faces)),
        format!("Mesh.HighOrderOptimize = {};", flag(params.high_order_optimization)),
        "Mesh 2;".into(),
        "Coherence Mesh;".into(),
        "Mesh.SurfaceFaces = 1;".into(),
    ]);
    lines
}

/// Write `<dir>/<name>.geo` for the model and return its path.
pub fn write_geo(model: &Model, params: &MesherParams) -> Result<PathBuf> {
    let lines = gmsh_script(model.name(), model.tolerance(), params);
    let path = model.paths().file(FileType::Geo);
    fs::write(&path, lines.join("\n") + "\n")?;
    info!(
        path = %path.display(),
        bars = model.bars().len(),
        panels = model.panels().len(),
        "wrote mesher script"
    );
    Ok(path)
}
