//! JSON-file adapters: the exporter's conversation documents and the
//! per-channel timestamp record

mod conversation;
mod timestamp_store;

pub use conversation::JsonConversationLoader;
pub use timestamp_store::JsonTimestampStore;
