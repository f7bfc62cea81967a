//! Version-control collaborator: which files a commit touched, and what they
//! looked like before it.

pub mod error;
pub mod parse;
pub mod repository;
pub mod types;

pub use error::GitError;
pub use repository::{CommitHistory, GitRepository};
pub use types::*;
