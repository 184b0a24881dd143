//! AWS adapter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("ECR returned no authorization data")]
    MissingAuthorizationData,

    #[error("ECR API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, AwsError>;
