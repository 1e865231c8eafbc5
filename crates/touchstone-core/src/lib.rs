pub mod config;
pub mod detect;
pub mod engine;
pub mod errors;
pub mod model;
pub mod page;
pub mod report;
pub mod secrets;
pub mod storage;
