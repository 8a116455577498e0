pub mod batch;
pub mod extract;

mod artifacts;
mod setup;
