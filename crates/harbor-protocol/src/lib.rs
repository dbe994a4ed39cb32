pub mod bootstrap;
pub mod event;
pub mod osc;

pub use event::{BridgeEvent, Envelope};
pub use osc::{Demuxed, ProtocolDemux};
