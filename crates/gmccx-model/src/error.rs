//! Error types for gmccx-model

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid element order {0}, expected 1 or 2")]
    InvalidOrder(usize),

    #[error("Invalid node count {count} for a {dimension}D element of order {order}")]
    InvalidNodeCount {
        dimension: usize,
        order: usize,
        count: usize,
    },

    #[error("Entity is already indexed with id {0}")]
    AlreadyIndexed(usize),

    #[error("Id {0} is already taken")]
    IdTaken(usize),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: usize },

    #[error("Invalid support type: {0}")]
    InvalidSupportType(String),

    #[error("Material {0} already exists with different properties")]
    MaterialConflict(String),

    #[error("Profile {0} uses a beam general section and requires 2nd order 1D elements")]
    ProfileOrder(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Panel family {0} is not supported")]
    UnsupportedFamily(String),

    #[error("Plane fit failed: {0}")]
    PlaneFit(String),

    #[error("Expression error at {position}: {message}")]
    Expression { position: usize, message: String },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Result channel {name}: {message}")]
    ResultChannel { name: String, message: String },
}
