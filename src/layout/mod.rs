pub mod grid;

pub use grid::{GridCell, GridLayout, GridSpec};
