use indexer_db::QueryError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum QueueError {
    #[error(transparent)]
    Db(#[from] QueryError),

    #[error("unknown queue name: {0}")]
    UnknownQueue(String),
}

pub type QueueResult<T> = Result<T, QueueError>;
