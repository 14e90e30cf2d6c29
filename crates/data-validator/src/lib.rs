//! Data Validation
//!
//! Rejects uploaded tables whose shape would make feature extraction too
//! expensive for an unauthenticated, synchronous endpoint.

mod error;
mod validator;

pub use error::ShapeError;
pub use validator::{ShapeLimits, ShapeValidator};
