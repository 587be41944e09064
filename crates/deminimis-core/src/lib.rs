pub mod aggregation;
pub mod alert;
pub mod amount;
pub mod collaborators;
pub mod error;
pub mod extraction;
pub mod pagination;
pub mod registry;
pub mod settings;
pub mod store;
pub mod types;

#[cfg(feature = "sme")]
pub mod sme;

pub use error::DeMinimisError;
pub use types::*;

/// Standard result type for all De Minimis operations
pub type DeMinimisResult<T> = Result<T, DeMinimisError>;
