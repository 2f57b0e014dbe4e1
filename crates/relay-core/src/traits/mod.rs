//! Store traits (ports) consumed by the relay

mod stores;

pub use stores::{ConversationStore, MembershipStore, MessageStore, RepoResult};
