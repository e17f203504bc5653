pub mod app;
pub mod config;
pub mod copier;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod job;
pub mod notify;
pub mod output;
pub mod renamer;
pub mod store;
