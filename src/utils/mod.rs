//! Utility functions and helpers.

pub mod arn;
