//! State store for tracking deployed resources.
//!
//! Maps stable logical ids to the mutable remote id space, together with a
//! content hash of what was last deployed.

mod hash;
mod store;
mod types;

pub use hash::{PropertiesHasher, HASH_LEN};
pub use store::StateStore;
pub use types::{ResourceState, StackState, StateFile, STATE_VERSION};
