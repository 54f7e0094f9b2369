//! Error surface (C12): the one boundary where external byte slices enter
//! the driver.

/// Errors [`crate::Driver::load_song`] can return.
///
/// Everything past the `load_song` boundary — malformed opcodes, buffer
/// overrun, out-of-range clamps — is tolerated best-effort (see the
/// crate's error handling design) rather than surfaced as an `Err`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// A channel was given a zero-length bytecode buffer. An empty
    /// buffer would make the very first cursor read fail before any
    /// bytecode exists, so it is rejected at the load boundary instead
    /// of being tolerated as bytecode-level overrun.
    #[error("channel {channel} received an empty bytecode buffer")]
    EmptyChannelData {
        /// The channel index (`0..=2`) that received the empty buffer.
        channel: u8,
    },
}
