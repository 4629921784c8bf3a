//! Debounced city suggestions.
//!
//! Each keystroke cancels the pending timer and arms a new one; only the
//! query still current when the timer fires reaches the provider. Every
//! keystroke and every `clear` bumps the request id, and a response is only
//! applied while its id is the latest, so late answers cannot resurrect
//! suggestions the user has moved past.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    model::CitySearchResult,
    provider::{WeatherProvider, query_too_short},
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Default)]
struct SearchState {
    latest: u64,
    pending: Option<JoinHandle<()>>,
    searching: bool,
    suggestions: Vec<CitySearchResult>,
}

#[derive(Debug)]
pub struct CitySearch {
    provider: Arc<dyn WeatherProvider>,
    debounce: Duration,
    state: Arc<Mutex<SearchState>>,
    updates: Arc<watch::Sender<Vec<CitySearchResult>>>,
}

impl CitySearch {
    pub fn new(provider: Arc<dyn WeatherProvider>, debounce: Duration) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            provider,
            debounce,
            state: Arc::new(Mutex::new(SearchState::default())),
            updates: Arc::new(updates),
        }
    }

    pub fn suggestions(&self) -> Vec<CitySearchResult> {
        self.state.lock().suggestions.clone()
    }

    pub fn is_searching(&self) -> bool {
        self.state.lock().searching
    }

    /// Receives every applied suggestion list, including clears.
    pub fn subscribe(&self) -> watch::Receiver<Vec<CitySearchResult>> {
        self.updates.subscribe()
    }

    /// Registers a keystroke. Must be called from within a tokio runtime.
    pub fn search(&self, query: &str) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        state.latest += 1;
        let request_id = state.latest;

        if query_too_short(query) {
            state.searching = false;
            state.suggestions.clear();
            drop(state);
            self.updates.send_replace(Vec::new());
            return;
        }

        let query = query.trim().to_string();
        let provider = Arc::clone(&self.provider);
        let shared = Arc::clone(&self.state);
        let updates = Arc::clone(&self.updates);
        let debounce = self.debounce;

        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;

            {
                let mut state = shared.lock();
                if state.latest != request_id {
                    return;
                }
                state.searching = true;
            }

            debug!(%query, request_id, "Looking up city suggestions");
            let result = provider.search(&query).await;

            let mut state = shared.lock();
            if state.latest != request_id {
                debug!(request_id, latest = state.latest, "Dropping stale suggestions");
                return;
            }
            state.searching = false;
            state.pending = None;

            let suggestions = match result {
                Ok(cities) => cities,
                Err(e) => {
                    warn!(error = %e, "City search failed");
                    Vec::new()
                }
            };
            state.suggestions = suggestions.clone();
            drop(state);
            updates.send_replace(suggestions);
        }));
    }

    /// Drops current suggestions and anything still pending or in flight.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        state.latest += 1;
        state.searching = false;
        state.suggestions.clear();
        drop(state);
        self.updates.send_replace(Vec::new());
    }
}

impl Drop for CitySearch {
    fn drop(&mut self) {
        if let Some(pending) = self.state.lock().pending.take() {
            pending.abort();
        }
    }
}
