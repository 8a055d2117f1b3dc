pub mod dense;
pub mod dropout;

pub use dense::{Layer, ParamMut};
pub use dropout::Dropout;
