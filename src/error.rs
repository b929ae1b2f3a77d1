use thiserror::Error;

use crate::wootric::client::WootricClientError;
use crate::wootric::paginator::PaginateError;
use crate::wootric::schema::SchemaError;
use crate::wootric::transform::TransformError;

#[derive(Debug, Error)]
pub enum TapError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Client(#[from] WootricClientError),

    #[error(transparent)]
    Paginate(#[from] PaginateError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TapResult<T> = Result<T, TapError>;
