//! Hand landmarks and finger pose classification.

pub mod fingers;
pub mod landmark;
