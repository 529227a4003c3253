//! Serial port discovery and transport.

pub mod discovery;
pub mod link;

pub use discovery::{find_device, list_ports, PortDescriptor, DEFAULT_KEYWORDS};
pub use link::{LineSink, SerialLink};
