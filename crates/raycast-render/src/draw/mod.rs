pub mod chain;
pub mod raycast;
pub mod strategy;
