pub mod addr;
pub mod coord;
pub mod grid;
pub mod model;
pub mod selection;
