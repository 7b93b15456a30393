pub mod config;
pub mod remote;
pub mod session;
pub mod upload;
