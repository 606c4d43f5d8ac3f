pub mod cli;
pub mod config;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod storage;
