pub mod skip_verify;
