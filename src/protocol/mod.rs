pub mod framing;
pub mod message;
pub mod sync;

pub use message::{DataPacket, Incoming, SyncMessage};
pub use sync::{ResponderAction, SyncInitiator, SyncOutcome, SyncResponder, SyncState};
