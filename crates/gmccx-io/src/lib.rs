//! Text formats of the Gmsh/CalculiX bridge.
//!
//! This crate provides:
//! - **Solver deck writer** for the CalculiX keyword format
//! - **Mesher script writer** for Gmsh `.geo` files
//! - **Mesh import** of the Gmsh-exported `.inp` mesh into a model
//! - **DAT/FRD result readers** for displacements, section forces and 2D
//!   stresses and strains
//! - **Keyword-card reader** to inspect written decks

pub mod cards;
pub mod dat_reader;
pub mod deck;
pub mod error;
pub mod format;
pub mod frd_reader;
pub mod geo;
pub mod mesh_import;
pub mod results;

pub use cards::{Card, Deck, DeckSummary, Parameter};
pub use dat_reader::{read_displacements, read_section_forces};
pub use deck::{StepSettings, deck_lines, write_deck};
pub use error::{CodecError, Result};
pub use format::{Real, ints_to_ccx, vector_to_ccx};
pub use frd_reader::{FieldGroup, read_2d_results};
pub use geo::{ElementShape, MeshAlgorithm, MesherParams, gmsh_script, write_geo};
pub use mesh_import::{MeshImport, import_mesh, read_mesh};
pub use results::{ResultSelection, TIME_TOLERANCE, read_results};
