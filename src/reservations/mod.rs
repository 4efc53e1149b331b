pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod side_effects;
pub mod status_machine;

pub use error::*;
pub use handlers::*;
pub use models::*;
pub use repository::*;
pub use service::*;
pub use side_effects::*;
pub use status_machine::*;
