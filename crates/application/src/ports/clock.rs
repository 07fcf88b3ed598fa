//! Clock port - monotonic time source

/// Source of monotonic milliseconds
///
/// Readings never decrease. The origin is adapter-defined, so only
/// differences between readings are meaningful.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current reading in milliseconds
    fn now_ms(&self) -> u64;
}
