use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A capability's input schema failed to compile.
    #[error("schema error for '{capability}': {message}")]
    Schema { capability: String, message: String },

    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    Catalog(#[from] catalog::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
