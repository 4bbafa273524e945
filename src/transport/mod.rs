pub mod queue;
pub mod tcp;
pub mod traits;

pub use queue::QueueGroundLink;
pub use tcp::{TcpUplink, TcpUplinkHandle};
pub use traits::GroundLink;
