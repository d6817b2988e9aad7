pub mod direct_connection;
