pub mod get_certificate;
