pub mod config;
pub mod logging;

pub mod cache_index;
pub mod checksum;
pub mod control;
pub mod downloader;
pub mod endpoints;
pub mod error;
pub mod integrity;
pub mod manifest;
pub mod resolver;
pub mod retry;
pub mod session;
pub mod storage;
