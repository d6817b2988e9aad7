#![forbid(unsafe_code)]

pub mod config;
pub mod issuer;
pub mod material;
pub mod server;
pub mod trust;

#[cfg(test)]
mod test;
