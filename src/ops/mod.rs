//! Every operator is an `impl BddManager` block in its own file, grouped by family. `mod.rs`
//! itself carries no logic — it only wires the families into the crate.

pub mod apply;
pub mod enumerate;
pub mod quant;
pub mod restrict;
pub mod subst;
pub mod varset;
