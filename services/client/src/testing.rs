//! Test doubles shared by the unit tests: a scripted transport whose replies
//! can be held back to control arrival order, and a credential store that
//! counts writes.

use crate::adapters::MemoryCredentialStore;
use crate::session::SessionHandle;
use async_trait::async_trait;
use justgo_core::domain::{CredentialRecord, User};
use justgo_core::ports::{
    CredentialStore, HttpTransport, StoreResult, TransportError, TransportRequest,
    TransportResponse,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub fn response(status: u16, body: serde_json::Value) -> TransportResponse {
    TransportResponse {
        status,
        body: body.to_string(),
    }
}

pub fn seeded_record(token: &str) -> CredentialRecord {
    CredentialRecord::new(
        token,
        User {
            id: 1,
            email: "a@b.com".to_string(),
            username: None,
        },
    )
}

/// A fresh, signed-out session over a counting store.
pub fn session_handle() -> (Arc<SessionHandle>, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::default());
    let session = Arc::new(SessionHandle::new(store.clone()));
    (session, store)
}

/// A session restored from a stored credential holding `token`.
pub fn signed_in(token: &str) -> (Arc<SessionHandle>, Arc<CountingStore>) {
    let (session, store) = session_handle();
    store.seed(seeded_record(token));
    session.restore();
    (session, store)
}

//=========================================================================================
// ScriptedTransport
//=========================================================================================

enum Reply {
    Ready(Result<TransportResponse, TransportError>),
    Deferred(oneshot::Receiver<TransportResponse>),
    Hang,
}

/// Replies are queued per path and consumed in order. An unscripted path
/// answers 404.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, path: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn respond(&self, path: &str, status: u16, body: serde_json::Value) {
        self.push(path, Reply::Ready(Ok(response(status, body))));
    }

    pub fn respond_raw(&self, path: &str, status: u16, body: &str) {
        self.push(
            path,
            Reply::Ready(Ok(TransportResponse {
                status,
                body: body.to_string(),
            })),
        );
    }

    pub fn fail(&self, path: &str, error: TransportError) {
        self.push(path, Reply::Ready(Err(error)));
    }

    /// Holds the reply for `path` until the returned sender fires.
    pub fn defer(&self, path: &str) -> oneshot::Sender<TransportResponse> {
        let (tx, rx) = oneshot::channel();
        self.push(path, Reply::Deferred(rx));
        tx
    }

    pub fn hang(&self, path: &str) {
        self.push(path, Reply::Hang);
    }

    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            replies
                .get_mut(&request.path)
                .and_then(VecDeque::pop_front)
        };
        self.calls.lock().unwrap().push(request);

        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Deferred(rx)) => rx
                .await
                .map_err(|_| TransportError::Unreachable("reply dropped".to_string())),
            Some(Reply::Hang) => futures::future::pending().await,
            None => Ok(response(404, serde_json::json!({"message": "Resource not found"}))),
        }
    }
}

//=========================================================================================
// CountingStore
//=========================================================================================

#[derive(Default)]
pub struct CountingStore {
    inner: MemoryCredentialStore,
    saves: AtomicUsize,
    clears: AtomicUsize,
}

impl CountingStore {
    /// Writes a record without counting it.
    pub fn seed(&self, record: CredentialRecord) {
        self.inner.save(&record).unwrap();
    }

    pub fn load_record(&self) -> Option<CredentialRecord> {
        self.inner.load().unwrap()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl CredentialStore for CountingStore {
    fn save(&self, record: &CredentialRecord) -> StoreResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record)
    }

    fn load(&self) -> StoreResult<Option<CredentialRecord>> {
        self.inner.load()
    }

    fn clear(&self) -> StoreResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}
