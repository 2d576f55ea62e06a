pub mod compiler;
pub mod graph;
pub mod labels;
