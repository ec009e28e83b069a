//! Client-resident, multi-session conversation history.
//!
//! `ConversationStore` owns session creation, switching, deletion and message
//! appends, and persists the full snapshot through a `KvStore` after every
//! mutation.

pub mod store;
