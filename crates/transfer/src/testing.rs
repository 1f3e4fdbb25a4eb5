//! In-memory backend for tests.
//!
//! Behaves like the real service for the calls it models: sessions keep
//! their received bytes and reject cursors at the wrong offset with the
//! offset they hold. Faults can be scripted per call, either before the
//! call takes effect or after it (a lost reply).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use dropstep_protocol::{CommitInfo, FileMetadata, UploadSessionCursor};

use crate::backend::{BackendError, BoxFuture, Downloaded, StorageBackend};
use crate::chunked::content_hash_bytes;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Upload { path: String, len: u64 },
    Start { len: u64 },
    Append { session_id: String, offset: u64, len: u64 },
    Finish { session_id: String, offset: u64, len: u64, path: String },
    Download { path: String },
}

pub(crate) enum Fault {
    /// The call fails without side effects.
    Before(BackendError),
    /// The call takes effect but the caller sees an error.
    After(BackendError),
}

#[derive(Default)]
pub(crate) struct MockBackend {
    script: Mutex<VecDeque<Option<Fault>>>,
    calls: Mutex<Vec<Call>>,
    sessions: Mutex<HashMap<String, Vec<u8>>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    /// Reported content hash override for the next commit.
    corrupt_hash: Mutex<bool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next call succeeds.
    pub fn push_ok(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    /// Next call fails before taking effect.
    pub fn push_error(&self, err: BackendError) {
        self.script
            .lock()
            .unwrap()
            .push_back(Some(Fault::Before(err)));
    }

    /// Next call takes effect but reports `err`.
    pub fn push_lost_reply(&self, err: BackendError) {
        self.script
            .lock()
            .unwrap()
            .push_back(Some(Fault::After(err)));
    }

    pub fn report_wrong_hash(&self) {
        *self.corrupt_hash.lock().unwrap() = true;
    }

    pub fn put_file(&self, path: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn next_fault(&self) -> Option<Fault> {
        self.script.lock().unwrap().pop_front().flatten()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Runs `apply` unless a fault says otherwise.
    fn run<T>(
        &self,
        apply: impl FnOnce() -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        match self.next_fault() {
            Some(Fault::Before(err)) => Err(err),
            Some(Fault::After(err)) => {
                let _ = apply();
                Err(err)
            }
            None => apply(),
        }
    }

    fn metadata(&self, commit: &CommitInfo, data: &[u8]) -> FileMetadata {
        let name = commit
            .path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let content_hash = if *self.corrupt_hash.lock().unwrap() {
            content_hash_bytes(b"something else")
        } else {
            content_hash_bytes(data)
        };
        FileMetadata {
            name,
            id: format!("id:{}", commit.path),
            path_lower: Some(commit.path.to_lowercase()),
            path_display: Some(commit.path.clone()),
            client_modified: commit.client_modified,
            server_modified: None,
            rev: "015f0000000".into(),
            size: data.len() as u64,
            content_hash: Some(content_hash),
        }
    }

    fn check_offset(&self, cursor: &UploadSessionCursor) -> Result<(), BackendError> {
        let sessions = self.sessions.lock().unwrap();
        let held = sessions
            .get(&cursor.session_id)
            .ok_or_else(|| BackendError::Rejected("lookup_failed/not_found/".into()))?
            .len() as u64;
        if held != cursor.offset {
            return Err(BackendError::IncorrectOffset {
                correct_offset: held,
            });
        }
        Ok(())
    }
}

impl StorageBackend for MockBackend {
    fn upload_whole<'a>(
        &'a self,
        commit: &'a CommitInfo,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<FileMetadata, BackendError>> {
        self.record(Call::Upload {
            path: commit.path.clone(),
            len: data.len() as u64,
        });
        Box::pin(async move {
            self.run(|| {
                let meta = self.metadata(commit, &data);
                self.files.lock().unwrap().insert(commit.path.clone(), data);
                Ok(meta)
            })
        })
    }

    fn session_start(&self, data: Vec<u8>) -> BoxFuture<'_, Result<String, BackendError>> {
        self.record(Call::Start {
            len: data.len() as u64,
        });
        Box::pin(async move {
            self.run(|| {
                let mut sessions = self.sessions.lock().unwrap();
                let id = format!("sid-{}", sessions.len() + 1);
                sessions.insert(id.clone(), data);
                Ok(id)
            })
        })
    }

    fn session_append<'a>(
        &'a self,
        cursor: &'a UploadSessionCursor,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        self.record(Call::Append {
            session_id: cursor.session_id.clone(),
            offset: cursor.offset,
            len: data.len() as u64,
        });
        Box::pin(async move {
            self.run(|| {
                self.check_offset(cursor)?;
                if let Some(held) = self.sessions.lock().unwrap().get_mut(&cursor.session_id) {
                    held.extend_from_slice(&data);
                }
                Ok(())
            })
        })
    }

    fn session_finish<'a>(
        &'a self,
        cursor: &'a UploadSessionCursor,
        commit: &'a CommitInfo,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<FileMetadata, BackendError>> {
        self.record(Call::Finish {
            session_id: cursor.session_id.clone(),
            offset: cursor.offset,
            len: data.len() as u64,
            path: commit.path.clone(),
        });
        Box::pin(async move {
            self.run(|| {
                self.check_offset(cursor)?;
                let mut content = self
                    .sessions
                    .lock()
                    .unwrap()
                    .remove(&cursor.session_id)
                    .unwrap_or_default();
                content.extend_from_slice(&data);
                let meta = self.metadata(commit, &content);
                self.files
                    .lock()
                    .unwrap()
                    .insert(commit.path.clone(), content);
                Ok(meta)
            })
        })
    }

    fn download<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Downloaded, BackendError>> {
        self.record(Call::Download {
            path: path.to_string(),
        });
        Box::pin(async move {
            self.run(|| {
                let data = self
                    .files
                    .lock()
                    .unwrap()
                    .get(path)
                    .cloned()
                    .ok_or_else(|| BackendError::Rejected("path/not_found/".into()))?;
                let metadata = self.metadata(&CommitInfo::add(path, None), &data);
                Ok(Downloaded { metadata, data })
            })
        })
    }
}
