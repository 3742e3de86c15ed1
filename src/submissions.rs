use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant}
};

use tower_sessions::session::Id;
use tracing::{debug, warn};

use crate::generation::GenerationRequest;

/// Budget for all remembered submissions together.
pub const SUBMISSION_BUDGET: usize = 64 * 1024 * 1024;

/// Matches the session cookie's inactivity expiry.
pub const SUBMISSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Last decoded submission per session, replayed by regenerate.
///
/// Bounded by total image and prompt bytes: the least recently used entries
/// go first, and entries idle for longer than the ttl are dropped on access.
pub struct Submissions {
    entries: Mutex<Entries>,
    max_bytes: usize,
    ttl: Duration
}

#[derive(Default)]
struct Entries {
    by_session: HashMap<Id, Entry>,
    bytes: usize
}

struct Entry {
    request: Arc<GenerationRequest>,
    size: usize,
    touched: Instant
}

impl Entries {

    fn remove(&mut self, session_id: &Id) -> Option<Entry> {
        let entry = self.by_session.remove(session_id)?;
        self.bytes -= entry.size;
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant, ttl: Duration) {
        let expired: Vec<Id> = self.by_session
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.touched) >= ttl)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            self.remove(&id);
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let oldest = self.by_session
            .iter()
            .min_by_key(|(_, entry)| entry.touched)
            .map(|(id, _)| *id);

        match oldest {
            Some(id) => {
                debug!("[{}] Evicting stored submission", id);
                self.remove(&id).is_some()
            },
            None => false
        }
    }

}

impl Submissions {
    pub fn new(max_bytes: usize, ttl: Duration) -> Submissions {
        Submissions {
            entries: Mutex::new(Entries::default()),
            max_bytes,
            ttl
        }
    }

    /// Remembers `request` for the session, replacing what it had before.
    pub fn insert(&self, session_id: Id, request: GenerationRequest) -> Arc<GenerationRequest> {
        let request = Arc::new(request);
        let size = request_size(&request);
        let now = Instant::now();
        let mut entries = self.lock();

        entries.remove(&session_id);
        entries.purge_expired(now, self.ttl);

        if size > self.max_bytes {
            warn!("[{}] Submission of {} bytes is too large to keep for regenerate", session_id, size);
            return request
        }

        while entries.bytes + size > self.max_bytes && entries.evict_oldest() {}

        entries.bytes += size;
        entries.by_session.insert(session_id, Entry {
            request: request.clone(),
            size,
            touched: now
        });

        request
    }

    pub fn get(&self, session_id: Id) -> Option<Arc<GenerationRequest>> {
        let now = Instant::now();
        let mut entries = self.lock();

        let expired = now.duration_since(entries.by_session.get(&session_id)?.touched) >= self.ttl;
        if expired {
            entries.remove(&session_id);
            return None
        }

        let entry = entries.by_session.get_mut(&session_id)?;
        entry.touched = now;
        Some(entry.request.clone())
    }

    pub fn remove(&self, session_id: Id) -> bool {
        self.lock().remove(&session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stored_bytes(&self) -> usize {
        self.lock().bytes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn request_size(request: &GenerationRequest) -> usize {
    let image = |image: &Option<crate::generation::SourceImage>| {
        image.as_ref().map_or(0, |image| image.bytes.len() + image.mime_type.len())
    };

    request.prompt.len() + image(&request.reference_image) + image(&request.logo)
}
