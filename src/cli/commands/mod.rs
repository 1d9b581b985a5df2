pub mod config;
pub mod preflight;
pub mod run;
