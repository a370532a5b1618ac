pub mod bubble;
pub mod channel;
pub mod event;
pub mod mesh;
pub mod node;
pub mod replica;

pub use bubble::{Bubble, Millis};
pub use event::{MalformedEvent, PeerEvent};
pub use mesh::{LinkError, LinkState, MeshRelay, PeerLink, Transport};
pub use node::{NodeError, PeerNode};
pub use replica::{Replica, ReplicaError};
