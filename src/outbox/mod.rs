pub mod models;
pub mod relay;
pub mod writer;

pub use models::*;
pub use relay::*;
pub use writer::*;
