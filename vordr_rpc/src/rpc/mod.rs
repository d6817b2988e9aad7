pub mod client;
pub mod command;
pub mod connection;
pub mod peer;
pub mod server;
pub mod session;
