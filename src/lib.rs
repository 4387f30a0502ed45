pub mod api;
pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod progress;
pub mod remote;
pub mod sync;
