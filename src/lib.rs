pub mod client_ip;
pub mod config;
pub mod provision;
pub mod storage;
pub mod visit;
