use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("vector store error: {0}")]
    Store(#[from] proxy_retriever::RetrieverError),
}
