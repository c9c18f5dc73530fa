#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod sync;
