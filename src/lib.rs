pub mod config;
pub mod endpoints;
pub mod errors;
pub mod generation;
pub mod prompt;
pub mod response;
pub mod submissions;


use std::{collections::HashSet, sync::{Arc, Mutex, PoisonError}};

use axum::{extract::DefaultBodyLimit, Router};
use config::Config;
use generation::GenerationClient;
use submissions::{Submissions, SUBMISSION_BUDGET, SUBMISSION_TTL};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::time, session::Id, Expiry, MemoryStore, SessionManagerLayer};

pub struct State {
    config: Config,
    http: reqwest::Client,
    generator: GenerationClient,
    submissions: Submissions,
    in_flight: Mutex<HashSet<Id>>
}

impl State {
    pub fn new(config: Config) -> State {
        let http = reqwest::Client::new();
        State {
            generator: GenerationClient::new(config.generator.clone(), http.clone()),
            http,
            config,
            submissions: Submissions::new(SUBMISSION_BUDGET, SUBMISSION_TTL),
            in_flight: Mutex::new(HashSet::new())
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn generator(&self) -> &GenerationClient {
        &self.generator
    }

    pub fn submissions(&self) -> &Submissions {
        &self.submissions
    }

    /// Claims the generation slot of a session. `None` while another one is running.
    pub fn begin_generation(&self, session_id: Id) -> Option<InFlight<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(session_id) {
            return None
        }

        Some(InFlight {
            slots: &self.in_flight,
            session_id
        })
    }
}

/// Releases the session's generation slot when dropped, including when the
/// request future is abandoned.
pub struct InFlight<'a> {
    slots: &'a Mutex<HashSet<Id>>,
    session_id: Id
}

impl Drop for InFlight<'_> {

    fn drop(&mut self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }

}

pub type SharedState = Arc<State>;

/// Largest accepted request body, 20 MiB.
pub const BODY_LIMIT: usize = 20480 * 1024;

pub fn app(state: SharedState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(1)));

    endpoints::get_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(BODY_LIMIT))
                .layer(session_layer)
        )
        .with_state(state)
}
