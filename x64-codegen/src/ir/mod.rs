mod ir;

pub use ir::*;
