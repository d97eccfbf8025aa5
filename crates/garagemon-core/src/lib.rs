pub mod actuator;
pub mod config;
pub mod error;
pub mod gpio;
pub mod indicator;
pub mod lifecycle;
pub mod uptime;

pub use error::{ActivationError, ErrorKind, GarageError, Result};
