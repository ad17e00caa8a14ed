use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid cycle month: {0} (expected 1-12)")]
    InvalidMonth(u32),

    #[error("invalid member id: {0}")]
    InvalidMemberId(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
