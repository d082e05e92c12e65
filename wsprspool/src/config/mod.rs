//! Configuration management.
//!
//! Settings load from `~/.wsprspool/config.ini`. Every key is optional and
//! overlays the defaults, so an empty or absent file is a valid
//! configuration. The module splits by concern: data structs in settings,
//! fallback values in defaults, the INI overlay in parser, and file loading
//! in file.

mod defaults;
mod file;
mod parser;
mod settings;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::*;
