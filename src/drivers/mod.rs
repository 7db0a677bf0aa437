//! Device interfaces used by the process manager
//!
//! All drivers follow these security principles:
//! - Input validation on all public interfaces
//! - No panics on invalid input (return errors)

pub mod console;

pub use console::{Console, ConsoleWriter};
