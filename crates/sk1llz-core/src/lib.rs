pub mod config;
pub mod error;
pub mod transport;

pub use config::AppConfig;
pub use error::{Result, SkillError};
pub use transport::{transport_from_config, DirTransport, HttpTransport, Transport};
