pub mod peer;

pub use peer::{BroadcastError, PeerClient, PeerReply};
