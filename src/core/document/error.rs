use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Document has no pages")]
    NoPages,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),
    #[error("Failed to persist output: {0}")]
    Persist(#[from] tempfile::PersistError),
}
