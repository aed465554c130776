// src/lib.rs — Library root for Regista

pub mod api;
pub mod cli;
pub mod core;
pub mod infra;
pub mod provider;
pub mod queue;
pub mod records;
pub mod registration;
pub mod routine;
pub mod session;
pub mod tools;
