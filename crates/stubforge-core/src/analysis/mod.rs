pub mod callgraph;
pub mod classifier;
pub mod linker;
pub mod matcher;
