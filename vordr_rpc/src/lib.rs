pub use quinn::rustls;

pub mod commands;
pub mod defaults;
pub mod protocol;
pub mod rpc;
pub mod stages;
pub mod status;
pub mod transport;
pub mod verbosity;
pub mod verifiers;

#[cfg(test)]
mod test;
