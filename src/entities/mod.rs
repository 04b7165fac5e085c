//! Assembly entities built on top of a physics session

pub mod bandolier;
pub mod cell;
pub mod end_features;
pub mod module;

pub use bandolier::{Bandolier, CellLink, LinkKind};
pub use cell::Cell;
pub use end_features::{End, EndConstraint, EndFeatures, EndLimit};
pub use module::Module;
