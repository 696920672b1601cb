pub mod classes;
pub mod filesystem;
pub mod matrix;
pub mod sequence;
pub mod xml;
