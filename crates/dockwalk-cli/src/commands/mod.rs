mod build;
mod interrupt;
mod list;
mod pipeline;

pub use build::build;
pub use list::list;
