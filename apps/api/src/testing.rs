//! Test helpers: local HTTP servers for driving vendor clients and the router.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::Value;

use crate::avatar::broker::tests::{StubPersona, StubStreaming};
use crate::avatar::broker::{BrokerSettings, SessionBroker};
use crate::config::Config;
use crate::jobs::catalog::JobCatalog;
use crate::jobs::recommend::ProfileRecommender;
use crate::state::AppState;

/// Serves `router` on an ephemeral localhost port for the rest of the test.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// App state over stub vendors. `overrides` are env-style config keys.
pub fn test_state(overrides: &[(&str, &str)], streaming: bool) -> AppState {
    let config = Config::from_lookup(|key| {
        overrides
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .unwrap();
    let broker = SessionBroker::new(
        Arc::new(StubPersona::default()),
        Arc::new(StubStreaming {
            configured: streaming,
            ..Default::default()
        }),
        BrokerSettings {
            callback_url: None,
            end_session_on_disconnect: config.end_session_on_disconnect,
        },
    );
    AppState {
        config,
        catalog: Arc::new(JobCatalog::builtin().unwrap()),
        recommender: Arc::new(ProfileRecommender),
        broker: Arc::new(broker),
    }
}

/// One request as the vendor saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Fake vendor answering every request with the next scripted reply.
/// The last reply repeats once the script runs out.
pub struct ScriptedVendor {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedVendor {
    pub async fn start(replies: Vec<(u16, Value)>) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let replies = Arc::new(replies);

        let router = {
            let hits = hits.clone();
            let requests = requests.clone();
            Router::new().fallback(
                move |method: Method, uri: Uri, headers: HeaderMap, body: axum::body::Bytes| {
                    let hits = hits.clone();
                    let requests = requests.clone();
                    let replies = replies.clone();
                    async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst);
                        requests.lock().unwrap().push(RecordedRequest {
                            method: method.to_string(),
                            path: uri.path().to_string(),
                            headers,
                            body: serde_json::from_slice(&body).unwrap_or(Value::Null),
                        });
                        let (status, reply) = replies[n.min(replies.len() - 1)].clone();
                        (StatusCode::from_u16(status).unwrap(), Json(reply))
                    }
                },
            )
        };

        Self {
            addr: serve(router).await,
            hits,
            requests,
        }
    }

    pub fn url(&self, scheme: &str) -> String {
        format!("{scheme}://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}
