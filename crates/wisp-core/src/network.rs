//! Network stack collaborator

use core::net::Ipv4Addr;

/// Station-mode network link as seen by the core.
///
/// Implementations only report state; association, DHCP and reconnects are
/// the network stack's business. None of these calls may block.
pub trait NetworkLink {
    /// The link is associated and has an address.
    fn is_connected(&self) -> bool;

    fn local_address(&self) -> Option<Ipv4Addr>;

    /// Received signal strength, dBm
    fn signal_strength(&self) -> i32;
}
