pub mod installer;
pub mod resolver;
mod swap;

pub use installer::{count_installed, find_installed, uninstall, InstallReport, Installer};
pub use resolver::{resolve, Environment, InstallResolution, LocationSource, ResolveRequest};
