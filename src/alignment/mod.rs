pub mod dtw;
pub mod gaussian;
pub mod templates;

pub use dtw::{align, DtwAlignment};
pub use gaussian::GaussianState;
pub use templates::Template;
