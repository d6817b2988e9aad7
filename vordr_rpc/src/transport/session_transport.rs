use tokio::io::{AsyncRead, AsyncWrite};

pub trait SessionTransportReader: AsyncRead + Send + Sync + Unpin {}
impl<T> SessionTransportReader for T where T: AsyncRead + Send + Sync + Unpin {}

pub trait SessionTransportWriter: AsyncWrite + Send + Sync + Unpin {}
impl<T> SessionTransportWriter for T where T: AsyncWrite + Send + Sync + Unpin {}
