//! treenote: a mind-map note editor
//!
//! Topics are circles in a tree, each backed by a markdown note that an
//! external editor works on, and previewed through a rendered thumbnail.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
