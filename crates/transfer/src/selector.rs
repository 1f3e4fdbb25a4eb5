/// How a file is sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStrategy {
    /// One request carrying the whole file.
    Simple,
    /// Upload session: start, appends, finish.
    Chunked,
}

/// Picks the transfer strategy for a file of `file_size` bytes.
///
/// Anything up to two chunks goes up in a single request; the extra round
/// trips of a session only pay off above that.
pub fn select_strategy(file_size: u64, chunk_size: u64) -> TransferStrategy {
    if file_size <= chunk_size.saturating_mul(2) {
        TransferStrategy::Simple
    } else {
        TransferStrategy::Chunked
    }
}
