pub mod compiler;
pub mod config;
pub mod constants;
pub mod datalayer;
pub mod engine;
pub mod error;
pub mod export;
pub mod extractor;
pub mod logging;
pub mod mapper;
pub mod senders;
pub mod storage;
