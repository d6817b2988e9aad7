use serde::{Serialize, de::DeserializeOwned};

use super::chunked_transport::{ChunkReadError, ChunkReader, ChunkWriteError, ChunkWriter};
use super::session_transport::{SessionTransportReader, SessionTransportWriter};

#[derive(Debug, thiserror::Error)]
pub enum ReadObjectError {
    #[error("failed reading chunk: {0}")]
    Chunk(#[from] ChunkReadError),
    #[error("failed deserializing object: {0}")]
    Decode(#[from] postcard::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum WriteObjectError {
    #[error("failed serializing object: {0}")]
    Encode(#[from] postcard::Error),
    #[error("failed writing chunk: {0}")]
    Chunk(#[from] ChunkWriteError),
}

pub struct ObjectReader {
    read: ChunkReader,
}

pub struct ObjectWriter {
    write: ChunkWriter,
}

impl ObjectReader {
    pub(crate) fn new(read: Box<dyn SessionTransportReader>) -> Self {
        Self {
            read: ChunkReader::new(read),
        }
    }

    pub async fn read_object<U: DeserializeOwned>(&mut self) -> Result<U, ReadObjectError> {
        let chunk = self.read.read_chunk().await?;

        let object = postcard::from_bytes(&chunk)?;

        Ok(object)
    }
}

impl ObjectWriter {
    pub(crate) fn new(write: Box<dyn SessionTransportWriter>) -> Self {
        Self {
            write: ChunkWriter::new(write),
        }
    }

    pub async fn write_object<U: Serialize>(&mut self, object: &U) -> Result<(), WriteObjectError> {
        let encoded = postcard::to_extend(object, Vec::new())?;

        self.write.write_chunk(&encoded).await?;

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), std::io::Error> {
        self.write.shutdown().await
    }
}
