//! API route handlers

pub mod plugins;
