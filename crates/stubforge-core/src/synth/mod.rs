pub mod generator;
pub mod literals;
pub mod render;
pub mod resolver;
