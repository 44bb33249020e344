//! Error helpers shared by the calmcp crates.
//!
//! Each crate keeps its own error enum; this crate only provides the
//! [`FromMessage`] trait and the [`impl_context!`] macro built on it.

pub mod error;

pub use error::FromMessage;
