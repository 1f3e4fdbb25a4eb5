//! Upload session state machine.
//!
//! [`UploadSession::transition`] is pure: it consumes the session and an
//! [`Event`] (the outcome of the last action) and returns the next session
//! value plus the [`Action`] the driver must perform. All offset
//! bookkeeping, retry accounting and error classification happen here, so
//! the protocol can be exercised without a backend.

use std::time::Duration;

use crate::{BackendError, TransferError};

/// Protocol phase. `Started`, `Appending` and `Finishing` mean the
/// corresponding call is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// No call in flight: before the first attempt or between retries.
    Idle,
    Started,
    Appending,
    Finishing,
    Done,
    Failed,
}

/// Outcome fed back into the state machine.
#[derive(Debug)]
pub enum Event {
    /// Begin (or resume) a protocol iteration.
    Begin,
    /// The start call succeeded and opened a session.
    Started { session_id: String },
    /// The append call succeeded.
    Appended,
    /// The finish call committed the file.
    Committed,
    /// A backend call failed.
    Failed(BackendError),
    /// Reading the local source failed.
    ReadFailed(std::io::Error),
}

/// What the driver must do next.
#[derive(Debug)]
pub enum Action {
    /// Open a session with `len` bytes read at `offset`.
    Start { offset: u64, len: u64 },
    /// Append `len` bytes read at `offset`.
    Append {
        session_id: String,
        offset: u64,
        len: u64,
    },
    /// Send the final `len` bytes at `offset` and commit.
    Finish {
        session_id: String,
        offset: u64,
        len: u64,
    },
    /// Close the source handle, wait `backoff` if given, then send
    /// [`Event::Begin`].
    Retry { backoff: Option<Duration> },
    /// The file is committed.
    Complete,
    /// Terminal failure.
    Abort(TransferError),
}

/// Mutable protocol state of one chunked upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    state: UploadState,
    session_id: Option<String>,
    uploaded_offset: u64,
    /// Length of the call in flight; applied to the offset on success.
    in_flight: u64,
    attempt: u32,
    file_size: u64,
    chunk_size: u64,
    max_attempts: u32,
}

impl UploadSession {
    /// Creates an idle session for a file of `file_size` bytes.
    pub fn new(file_size: u64, chunk_size: u64, max_attempts: u32) -> Self {
        Self {
            state: UploadState::Idle,
            session_id: None,
            uploaded_offset: 0,
            in_flight: 0,
            attempt: 0,
            file_size,
            chunk_size,
            max_attempts,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Bytes the server is believed to hold.
    pub fn uploaded_offset(&self) -> u64 {
        self.uploaded_offset
    }

    /// Failed iterations so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes not yet accepted by the server.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.uploaded_offset)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, UploadState::Done | UploadState::Failed)
    }

    /// Applies `event` and returns the next session and action.
    pub fn transition(mut self, event: Event) -> (Self, Action) {
        match (self.state, event) {
            (UploadState::Idle, Event::Begin) => {
                if let Err(e) = self.check_preconditions() {
                    return self.fail(e);
                }
                self.next_call()
            }
            (UploadState::Started, Event::Started { session_id }) => {
                self.session_id = Some(session_id);
                self.advance();
                self.next_call()
            }
            (UploadState::Appending, Event::Appended) => {
                self.advance();
                self.next_call()
            }
            (UploadState::Finishing, Event::Committed) => {
                self.advance();
                self.state = UploadState::Done;
                (self, Action::Complete)
            }
            (
                UploadState::Started | UploadState::Appending | UploadState::Finishing,
                Event::Failed(err),
            ) => self.on_backend_error(err),
            (
                UploadState::Started | UploadState::Appending | UploadState::Finishing,
                Event::ReadFailed(err),
            ) => self.fail(TransferError::LocalIo(err)),
            (state, event) => {
                let msg = format!("unexpected {event:?} in state {state:?}");
                self.fail(TransferError::Configuration(msg))
            }
        }
    }

    fn check_preconditions(&self) -> Result<(), TransferError> {
        if self.chunk_size == 0 {
            return Err(TransferError::Configuration(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(TransferError::Configuration(
                "max attempts must be greater than zero".into(),
            ));
        }
        if self.file_size < self.chunk_size {
            return Err(TransferError::Configuration(format!(
                "file of {} bytes is smaller than one chunk ({} bytes)",
                self.file_size, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Picks the call that continues the protocol from `uploaded_offset`.
    fn next_call(mut self) -> (Self, Action) {
        let offset = self.uploaded_offset;
        let remaining = self.remaining();

        let action = match self.session_id.clone() {
            None => {
                let len = remaining.min(self.chunk_size);
                self.state = UploadState::Started;
                self.in_flight = len;
                Action::Start { offset, len }
            }
            Some(session_id) if remaining > self.chunk_size => {
                self.state = UploadState::Appending;
                self.in_flight = self.chunk_size;
                Action::Append {
                    session_id,
                    offset,
                    len: self.chunk_size,
                }
            }
            Some(session_id) => {
                self.state = UploadState::Finishing;
                self.in_flight = remaining;
                Action::Finish {
                    session_id,
                    offset,
                    len: remaining,
                }
            }
        };
        (self, action)
    }

    fn advance(&mut self) {
        self.uploaded_offset = (self.uploaded_offset + self.in_flight).min(self.file_size);
        self.in_flight = 0;
    }

    fn on_backend_error(mut self, err: BackendError) -> (Self, Action) {
        self.in_flight = 0;
        let (cause, backoff) = match err {
            BackendError::Network(msg) => (TransferError::TransientNetwork(msg), None),
            BackendError::RateLimited { retry_after } => (
                TransferError::RateLimited { retry_after },
                Some(retry_after),
            ),
            BackendError::IncorrectOffset { correct_offset }
                if self.state != UploadState::Started =>
            {
                if correct_offset > self.file_size {
                    let msg = format!(
                        "server expects offset {correct_offset} beyond file size {}",
                        self.file_size
                    );
                    return self.fail(TransferError::FatalBackend(msg));
                }
                let expected = self.uploaded_offset;
                self.uploaded_offset = correct_offset;
                (
                    TransferError::OffsetMismatch {
                        expected,
                        correct: correct_offset,
                    },
                    None,
                )
            }
            BackendError::IncorrectOffset { correct_offset } => {
                let msg = format!("offset correction to {correct_offset} on session start");
                return self.fail(TransferError::FatalBackend(msg));
            }
            BackendError::Rejected(msg) => return self.fail(TransferError::FatalBackend(msg)),
        };

        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            let attempts = self.attempt;
            return self.fail(TransferError::AttemptsExhausted {
                attempts,
                last: Box::new(cause),
            });
        }
        self.state = UploadState::Idle;
        (self, Action::Retry { backoff })
    }

    fn fail(mut self, err: TransferError) -> (Self, Action) {
        self.state = UploadState::Failed;
        self.in_flight = 0;
        (self, Action::Abort(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK: u64 = 8;

    fn session(size: u64) -> UploadSession {
        UploadSession::new(size, CHUNK, 5)
    }

    fn begin(s: UploadSession) -> (UploadSession, Action) {
        s.transition(Event::Begin)
    }

    fn started(s: UploadSession) -> (UploadSession, Action) {
        s.transition(Event::Started {
            session_id: "sid".into(),
        })
    }

    #[test]
    fn happy_path_20_over_8() {
        let (s, a) = begin(session(20));
        assert!(matches!(a, Action::Start { offset: 0, len: 8 }));
        assert_eq!(s.state(), UploadState::Started);

        let (s, a) = started(s);
        assert_eq!(s.uploaded_offset(), 8);
        assert!(matches!(a, Action::Append { offset: 8, len: 8, .. }));

        let (s, a) = s.transition(Event::Appended);
        assert_eq!(s.uploaded_offset(), 16);
        assert!(matches!(a, Action::Finish { offset: 16, len: 4, .. }));

        let (s, a) = s.transition(Event::Committed);
        assert!(matches!(a, Action::Complete));
        assert_eq!(s.state(), UploadState::Done);
        assert_eq!(s.uploaded_offset(), 20);
        assert!(s.is_terminal());
    }

    #[test]
    fn call_count_matches_chunk_layout() {
        // size = CHUNK * n + r with 0 < r <= CHUNK: n full sends then one finish of r.
        for n in 1..6u64 {
            for r in 1..=CHUNK {
                let size = CHUNK * n + r;
                let (mut s, mut a) = begin(session(size));
                let mut full_sends = 0;
                let finish_len = loop {
                    match a {
                        Action::Start { len, .. } => {
                            assert_eq!(len, CHUNK);
                            full_sends += 1;
                            (s, a) = started(s);
                        }
                        Action::Append { len, .. } => {
                            assert_eq!(len, CHUNK);
                            full_sends += 1;
                            (s, a) = s.transition(Event::Appended);
                        }
                        Action::Finish { len, .. } => break len,
                        other => panic!("unexpected action {other:?}"),
                    }
                };
                assert_eq!(full_sends, n, "size={size}");
                assert_eq!(finish_len, r, "size={size}");
            }
        }
    }

    #[test]
    fn file_of_exactly_one_chunk_finishes_empty() {
        let (s, a) = begin(session(CHUNK));
        assert!(matches!(a, Action::Start { len: 8, .. }));
        let (_, a) = started(s);
        assert!(matches!(a, Action::Finish { offset: 8, len: 0, .. }));
    }

    #[test]
    fn file_smaller_than_chunk_is_rejected() {
        let (s, a) = begin(session(4));
        assert_eq!(s.state(), UploadState::Failed);
        assert!(matches!(a, Action::Abort(TransferError::Configuration(_))));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let (_, a) = UploadSession::new(10, 0, 5).transition(Event::Begin);
        assert!(matches!(a, Action::Abort(TransferError::Configuration(_))));
    }

    #[test]
    fn network_error_retries_without_moving_offset() {
        let (s, _) = begin(session(20));
        let (s, _) = started(s);
        let (s, a) = s.transition(Event::Failed(BackendError::Network("reset".into())));
        assert!(matches!(a, Action::Retry { backoff: None }));
        assert_eq!(s.state(), UploadState::Idle);
        assert_eq!(s.attempt(), 1);
        assert_eq!(s.uploaded_offset(), 8);
        assert_eq!(s.session_id(), Some("sid"));

        // Resumes the same session at the same offset.
        let (_, a) = begin(s);
        assert!(matches!(
            a,
            Action::Append { ref session_id, offset: 8, len: 8 } if session_id == "sid"
        ));
    }

    #[test]
    fn failed_start_retries_start() {
        let (s, _) = begin(session(20));
        let (s, a) = s.transition(Event::Failed(BackendError::Network("timeout".into())));
        assert!(matches!(a, Action::Retry { .. }));
        assert_eq!(s.uploaded_offset(), 0);
        let (_, a) = begin(s);
        assert!(matches!(a, Action::Start { offset: 0, len: 8 }));
    }

    #[test]
    fn rate_limit_carries_backoff() {
        let (s, _) = begin(session(20));
        let (s, _) = started(s);
        let wait = Duration::from_secs(3);
        let (s, a) = s.transition(Event::Failed(BackendError::RateLimited { retry_after: wait }));
        assert!(matches!(a, Action::Retry { backoff: Some(d) } if d == wait));
        assert_eq!(s.uploaded_offset(), 8);
        assert_eq!(s.attempt(), 1);
    }

    #[test]
    fn incorrect_offset_rewinds() {
        // Engine believes 16, server says 8.
        let (s, _) = begin(session(30));
        let (s, _) = started(s);
        let (s, _) = s.transition(Event::Appended);
        assert_eq!(s.uploaded_offset(), 16);

        let (s, a) = s.transition(Event::Failed(BackendError::IncorrectOffset {
            correct_offset: 8,
        }));
        assert!(matches!(a, Action::Retry { backoff: None }));
        assert_eq!(s.uploaded_offset(), 8);

        let (_, a) = begin(s);
        assert!(matches!(a, Action::Append { offset: 8, len: 8, .. }));
    }

    #[test]
    fn incorrect_offset_can_move_forward() {
        let (s, _) = begin(session(30));
        let (s, _) = started(s);
        let (s, _) = s.transition(Event::Failed(BackendError::IncorrectOffset {
            correct_offset: 24,
        }));
        let (_, a) = begin(s);
        assert!(matches!(a, Action::Finish { offset: 24, len: 6, .. }));
    }

    #[test]
    fn next_call_always_uses_corrected_offset() {
        for correct in 0..=30u64 {
            let (s, _) = begin(session(30));
            let (s, _) = started(s);
            let (s, _) = s.transition(Event::Failed(BackendError::IncorrectOffset {
                correct_offset: correct,
            }));
            let (_, a) = begin(s);
            let offset = match a {
                Action::Append { offset, .. } | Action::Finish { offset, .. } => offset,
                other => panic!("unexpected action {other:?}"),
            };
            assert_eq!(offset, correct);
        }
    }

    #[test]
    fn finish_incorrect_offset_rewinds() {
        let (s, _) = begin(session(20));
        let (s, _) = started(s);
        let (s, _) = s.transition(Event::Appended);
        let (s, a) = s.transition(Event::Failed(BackendError::IncorrectOffset {
            correct_offset: 12,
        }));
        assert!(matches!(a, Action::Retry { .. }));
        let (_, a) = begin(s);
        assert!(matches!(a, Action::Finish { offset: 12, len: 8, .. }));
    }

    #[test]
    fn offset_beyond_file_is_fatal() {
        let (s, _) = begin(session(20));
        let (s, _) = started(s);
        let (s, a) = s.transition(Event::Failed(BackendError::IncorrectOffset {
            correct_offset: 21,
        }));
        assert_eq!(s.state(), UploadState::Failed);
        assert!(matches!(a, Action::Abort(TransferError::FatalBackend(_))));
    }

    #[test]
    fn rejection_is_fatal_without_consuming_budget() {
        let (s, _) = begin(session(20));
        let (s, _) = started(s);
        let (s, a) = s.transition(Event::Failed(BackendError::Rejected(
            "path/conflict/file/".into(),
        )));
        assert!(matches!(a, Action::Abort(TransferError::FatalBackend(_))));
        assert_eq!(s.attempt(), 0);
        assert_eq!(s.state(), UploadState::Failed);
    }

    #[test]
    fn read_failure_is_fatal() {
        let (s, _) = begin(session(20));
        let err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let (s, a) = s.transition(Event::ReadFailed(err));
        assert!(matches!(a, Action::Abort(TransferError::LocalIo(_))));
        assert_eq!(s.state(), UploadState::Failed);
    }

    #[test]
    fn budget_exhausts_after_max_attempts() {
        let mut s = UploadSession::new(20, CHUNK, 3);
        for i in 1..=3 {
            let (next, a) = begin(s);
            assert!(matches!(a, Action::Start { .. }));
            let (next, a) = next.transition(Event::Failed(BackendError::Network("down".into())));
            s = next;
            if i < 3 {
                assert!(matches!(a, Action::Retry { .. }));
            } else {
                match a {
                    Action::Abort(TransferError::AttemptsExhausted { attempts, last }) => {
                        assert_eq!(attempts, 3);
                        assert!(matches!(*last, TransferError::TransientNetwork(_)));
                    }
                    other => panic!("unexpected action {other:?}"),
                }
            }
        }
        assert!(s.is_terminal());
    }

    #[test]
    fn events_after_terminal_state_abort() {
        let (s, _) = begin(session(4));
        let (s, a) = s.transition(Event::Begin);
        assert_eq!(s.state(), UploadState::Failed);
        assert!(matches!(a, Action::Abort(_)));
    }

    #[test]
    fn mismatched_event_is_rejected() {
        let (s, _) = begin(session(20));
        // Start is in flight; an append ack makes no sense.
        let (s, a) = s.transition(Event::Appended);
        assert_eq!(s.state(), UploadState::Failed);
        assert!(matches!(a, Action::Abort(TransferError::Configuration(_))));
    }
}
