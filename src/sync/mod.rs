pub mod cache;
pub mod workspace;

pub use cache::{CacheView, CollectionCache, Mutation, MutationOutcome};
pub use workspace::{Collection, Workspace};
