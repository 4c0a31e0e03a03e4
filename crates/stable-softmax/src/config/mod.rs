//! Operator configuration files and tensor files.

mod parser;
mod types;
mod validator;

pub use parser::{load_tensor, parse_config, parse_config_str, parse_tensor_str, TensorFormat};
pub use types::*;
pub use validator::validate_config;
