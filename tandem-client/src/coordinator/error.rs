use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("A call attempt is already in progress")]
    CallInProgress,
    #[error("No active call")]
    NoActiveCall,
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}
