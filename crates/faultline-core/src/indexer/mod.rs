pub mod callgraph;
pub mod filesystem;
pub mod pagerank;
pub mod symbols;
