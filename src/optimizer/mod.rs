//! Back-end interface.
//!
//! The solver itself lives outside this crate. This module gives it the
//! problem structure (variables, factor blocks, sparsity) derived from the
//! world model, and the write-back path for optimized values.

pub mod graph_layout;

pub use graph_layout::{
    collect_graph_layout, FactorBlock, GraphLayout, GraphLayoutConfig, VariableBlock,
};
