pub mod config;
pub mod maintenance;
pub mod run;
