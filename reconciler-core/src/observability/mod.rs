pub mod logging;
pub mod rotation;

pub use logging::init_tracing;
pub use rotation::rotate_by_created;
