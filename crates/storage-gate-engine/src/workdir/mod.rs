mod initializer;
mod validator;

pub use initializer::{InitError, WorkdirLayout, initialize};
pub use validator::{PathKind, ValidationResult, classify, inspect, validate};
