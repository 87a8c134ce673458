//! Structural finite element model for the Gmsh/CalculiX bridge.
//!
//! This crate provides:
//! - **Indexed entity stores** with stable, reusable ids
//! - **Mesh** nodes and 1D/2D elements with result channels
//! - **Building components** (bars and panels) with profiles and materials
//! - **Loads and supports** described on geometry
//! - **Binding** of loads and supports to the mesh by proximity
//! - **Model** aggregation, id-compacting snapshots and artifact paths
//!
//! Text formats (solver deck, mesher script, mesh and result files) live in
//! `gmccx-io`.

pub mod binding;
pub mod component;
pub mod error;
pub mod expression;
pub mod geometry;
pub mod loads;
pub mod material;
pub mod mesh;
pub mod model;
pub mod profile;
pub mod store;

pub use binding::{LoadBinding, bind_load, bind_support, closest_primary_node};
pub use component::{Bar, ComponentKind, Panel};
pub use error::{ModelError, Result};
pub use expression::Expression;
pub use geometry::{LineSegment, Plane, Point, Polyline, Surface, Vector, Volume};
pub use loads::{Infill, InfillLoad, Load, Support, SupportGeometry, SupportType};
pub use material::{Elasticity, Material, MaterialCollection, MaterialLibrary};
pub use mesh::{
    Element, Element1D, Element2D, ElementFamily, Mesh, MeshStatistics, NodalResult, Node,
    ResultTable, STRAIN_2D, STRESS_2D, SECTION_FORCES, ccx_id,
};
pub use model::{ArtifactPaths, FileType, IdTranslation, Model, PendingComponents};
pub use profile::{Profile, ProfileShape};
pub use store::{Indexed, IndexedStore};
