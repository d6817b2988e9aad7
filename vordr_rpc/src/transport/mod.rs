pub mod chunked_transport;
pub mod object_transport;
pub mod session_transport;
