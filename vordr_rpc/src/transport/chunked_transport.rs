use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::session_transport::{SessionTransportReader, SessionTransportWriter};

/// Largest chunk body the length prefix can express.
const MAX_CHUNK_SIZE: usize = 1 << 31;

#[derive(Debug, thiserror::Error)]
pub enum ChunkReadError {
    #[error("failed to read chunk length: {0}")]
    Length(std::io::Error),
    #[error("failed to read chunk body: {0}")]
    Body(std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkWriteError {
    #[error("chunk of {0} bytes is too big to encode")]
    TooBig(usize),
    #[error("failed to write chunk length: {0}")]
    Length(std::io::Error),
    #[error("failed to write chunk body: {0}")]
    Body(std::io::Error),
}

pub(crate) struct ChunkReader {
    read: Box<dyn SessionTransportReader>,
}

impl ChunkReader {
    pub(crate) fn new(read: Box<dyn SessionTransportReader>) -> Self {
        Self { read }
    }

    /// Chunks are length prefixed. Lengths below 128 fit in one byte,
    /// longer chunks use four big endian bytes with the highest bit set.
    pub async fn read_chunk(&mut self) -> Result<Vec<u8>, ChunkReadError> {
        let first = self.read.read_u8().await.map_err(ChunkReadError::Length)?;

        let len = if first < 0b1000_0000 {
            first as usize
        } else {
            let mut prefix = [first, 0, 0, 0];
            self.read
                .read_exact(&mut prefix[1..])
                .await
                .map_err(ChunkReadError::Length)?;
            prefix[0] &= 0b0111_1111;
            u32::from_be_bytes(prefix) as usize
        };

        let mut chunk = vec![0; len];
        self.read
            .read_exact(&mut chunk)
            .await
            .map_err(ChunkReadError::Body)?;

        Ok(chunk)
    }
}

pub(crate) struct ChunkWriter {
    write: Box<dyn SessionTransportWriter>,
}

impl ChunkWriter {
    pub(crate) fn new(write: Box<dyn SessionTransportWriter>) -> Self {
        Self { write }
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ChunkWriteError> {
        if chunk.len() >= MAX_CHUNK_SIZE {
            return Err(ChunkWriteError::TooBig(chunk.len()));
        }

        let len = chunk.len() as u32;

        if len < 0b1000_0000 {
            self.write
                .write_u8(len as u8)
                .await
                .map_err(ChunkWriteError::Length)?;
        } else {
            let prefix = (len | (1 << 31)).to_be_bytes();
            self.write
                .write_all(&prefix)
                .await
                .map_err(ChunkWriteError::Length)?;
        }

        self.write
            .write_all(chunk)
            .await
            .map_err(ChunkWriteError::Body)?;

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), std::io::Error> {
        self.write.shutdown().await
    }
}
