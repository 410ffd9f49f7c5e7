#![warn(clippy::pedantic)]
// Noisy doc/signature lints: would require annotating every pub function
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference: keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Module structure: handlers and clients follow a foo::FooHandler pattern
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod gateway;
pub mod line;
pub mod schedule;
pub(crate) mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
