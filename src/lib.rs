//! Bando: Monte-Carlo tolerance stacks for cylindrical cell modules
//!
//! Cells with sampled offsets and diameters are chained into bandoliers,
//! packed into a module and relaxed in a 2-D rigid-body simulation until the
//! assembly settles. Repeating this across many seeds gives the distribution
//! of the module's overall width and each bandolier's clearance to its end
//! stops.

pub mod cli;
pub mod core;
pub mod entities;
