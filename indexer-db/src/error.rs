use diesel::r2d2::PoolError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error("couldn't get a database connection from the pool")]
    Pool(#[from] PoolError),
}

pub type QueryResult<T> = Result<T, QueryError>;
