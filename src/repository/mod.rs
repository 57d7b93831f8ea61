pub mod client;

pub use client::{DeleteOutcome, RepositoryClient, RepositoryError, RepositoryHandle};
