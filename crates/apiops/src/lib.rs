pub mod artifact;
pub mod config;
pub mod error;
pub mod git;
pub mod json;
pub mod publish;
pub mod remote;
pub mod resource;
pub mod secrets;
pub mod sync;

pub use artifact::{ArtifactError, DesiredStateBuilder, IdentityResolver, OverrideDocument};
pub use config::PublisherSettings;
pub use error::{ConfigError, PublishError, Result, TaskFailure};
pub use git::{CommitHistory, GitError, GitRepository};
pub use publish::publish;
pub use remote::{HttpRemote, InMemoryService, RemoteError, RemoteService};
pub use resource::{ResourceIdentity, ResourceKind, ResourceName, RevisionedName};
pub use secrets::{SecretError, SecretSource};
pub use sync::{cancel_pair, CancelHandle, CancelSignal, ChangeSource, Publisher, RunOutcome};
