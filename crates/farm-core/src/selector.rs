//! Worker selection criteria

use serde::{Deserialize, Serialize};

use crate::worker::{Worker, WorkerState};

/// Which connectivity states a [`Where`] accepts.
///
/// The default is `Online`: a filter that says nothing about availability
/// only matches online workers, the same as passing no filter at all.
/// Callers that want offline workers must ask for `Offline` (or `Any`)
/// explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Online,
    Offline,
    Any,
}

impl Availability {
    fn accepts(self, offline: bool) -> bool {
        match self {
            Availability::Online => !offline,
            Availability::Offline => offline,
            Availability::Any => true,
        }
    }
}

/// Selection criteria. Empty strings do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Where {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub availability: Availability,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }
}

/// Check a worker against an optional filter.
///
/// `None` matches online workers only.
pub fn matches(worker: &Worker, filter: Option<&Where>) -> bool {
    worker.with_state(|state| matches_state(worker.group(), state, filter))
}

pub(crate) fn matches_state(group: &str, state: &WorkerState, filter: Option<&Where>) -> bool {
    let Some(filter) = filter else {
        return !state.offline;
    };

    if !filter.group.is_empty() && group != filter.group {
        return false;
    }
    if !filter.model.is_empty() && !state.models.contains_key(&filter.model) {
        return false;
    }
    filter.availability.accepts(state.offline)
}
