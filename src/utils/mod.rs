//! Pure utility functions.
//!
//! Process-level helpers shared by binaries and Lambda entry points.

pub mod bootstrap;
