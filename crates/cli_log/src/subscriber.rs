//! Integration with the [`tracing`] ecosystem.

mod layer;
mod visitor;

pub use self::layer::CliLayer;
