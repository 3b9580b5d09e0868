// src/lib.rs

//! upload-deploy: declare and reconcile the media-upload function and its log group.

pub mod artifact;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod state;
pub mod utils;
