use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvlError {
    #[error("tree is empty")]
    EmptyTree,
    #[error("keys out of order")]
    Unordered,
    #[error("node out of balance (balance factor {balance})")]
    Unbalanced { balance: isize },
    #[error("stored height {stored} does not match computed height {computed}")]
    HeightMismatch { stored: usize, computed: usize },
    #[error("counted {counted} nodes but len is {recorded}")]
    LenMismatch { counted: usize, recorded: usize },
}

pub type Result<T> = std::result::Result<T, AvlError>;
