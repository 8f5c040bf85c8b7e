//! Protocol state that outlives a single frame.
//!
//! Pure data with no I/O; the controller owns the only live instance.

/// Port → device-type table consulted when decoding sensor frames.
///
/// See [`registry::PortRegistry`] for the main type.
pub mod registry;
