pub mod constants;
pub mod error;
pub mod wire;

pub use constants::*;
pub use error::ProtocolError;
