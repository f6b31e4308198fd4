//! services/client/src/dashboard.rs
//!
//! The data orchestrator behind the main view. Entering the view runs an
//! eager, all-or-nothing load of the overview, trip list and destination list;
//! the weather tab loads lazily for the selected city. Every slot carries a
//! generation tag so that only the most recently issued request can settle it.

use crate::gateway::{Gateway, GatewayError};
use crate::protocol::{
    Destination, DestinationList, Endpoint, Overview, Trip, TripList, WeatherReport,
};
use futures::future::join3;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Overview,
    Trips,
    Destinations,
    Weather,
}

/// What became of a load once it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result (data or error) was written to the view.
    Applied,
    /// A newer request for the same slot was issued first; the result was dropped.
    Superseded,
    /// The dashboard was closed while the load was in flight.
    Cancelled,
    /// Nothing needed loading.
    Idle,
}

//=========================================================================================
// Slot
//=========================================================================================

/// One named sub-resource of the view.
///
/// At most one of `data` and `error` is set. `loading` is true only while the
/// request tagged with the current `generation` has not settled.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<T> {
    data: Option<T>,
    loading: bool,
    error: Option<String>,
    generation: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

impl<T> Slot<T> {
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a new request generation. Data already shown stays visible
    /// until the new request settles.
    fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        self.generation
    }

    /// Settles the slot if `generation` is still the current one.
    fn settle(&mut self, generation: u64, outcome: Result<T, String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.loading = false;
        match outcome {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(message) => {
                self.data = None;
                self.error = Some(message);
            }
        }
        true
    }

    /// Drops the in-flight request of `generation` without settling it. Data
    /// already shown stays.
    fn abandon(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.loading {
            return false;
        }
        self.loading = false;
        true
    }
}

//=========================================================================================
// DashboardState
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub active_tab: Tab,
    pub selected_city: String,
    pub overview: Slot<Overview>,
    pub trips: Slot<Vec<Trip>>,
    pub destinations: Slot<Vec<Destination>>,
    pub weather: Slot<WeatherReport>,
}

impl DashboardState {
    fn new(default_city: &str) -> Self {
        Self {
            active_tab: Tab::Overview,
            selected_city: default_city.to_string(),
            overview: Slot::default(),
            trips: Slot::default(),
            destinations: Slot::default(),
            weather: Slot::default(),
        }
    }

    /// True while the eager load has not fully settled.
    pub fn is_loading(&self) -> bool {
        self.overview.is_loading() || self.trips.is_loading() || self.destinations.is_loading()
    }

    /// The single blocking error of the eager load, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.overview
            .error()
            .or_else(|| self.trips.error())
            .or_else(|| self.destinations.error())
    }
}

//=========================================================================================
// Dashboard
//=========================================================================================

pub struct Dashboard {
    gateway: Arc<Gateway>,
    state: watch::Sender<DashboardState>,
    closed: CancellationToken,
}

impl Dashboard {
    pub fn new(gateway: Arc<Gateway>, default_city: &str) -> Self {
        let (state, _) = watch::channel(DashboardState::new(default_city));
        Self {
            gateway,
            state,
            closed: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Runs the eager aggregate load. Called on entering the view and again by
    /// the retry affordance.
    pub async fn load(&self) -> Result<LoadOutcome, GatewayError> {
        if self.closed.is_cancelled() {
            return Ok(LoadOutcome::Cancelled);
        }
        let mut tags = (0, 0, 0);
        self.state.send_modify(|s| {
            tags = (s.overview.begin(), s.trips.begin(), s.destinations.begin());
        });
        debug!("Loading dashboard (generation {})", tags.0);

        let requests = join3(
            self.gateway.fetch::<Overview>(Endpoint::DASHBOARD),
            self.gateway.fetch::<TripList>(Endpoint::TRIPS),
            self.gateway.fetch::<DestinationList>(Endpoint::DESTINATIONS),
        );
        let Some((overview, trips, destinations)) = self.unless_closed(requests).await else {
            self.state.send_if_modified(|s| {
                let overview = s.overview.abandon(tags.0);
                let trips = s.trips.abandon(tags.1);
                let destinations = s.destinations.abandon(tags.2);
                overview || trips || destinations
            });
            debug!("Dashboard closed with its load in flight");
            return Ok(LoadOutcome::Cancelled);
        };

        // All-or-nothing: the first failure decides the message for the whole view.
        let (loaded, failure) = match (overview, trips, destinations) {
            (Ok(overview), Ok(trips), Ok(destinations)) => {
                (Some((overview, trips.trips, destinations.destinations)), None)
            }
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => (None, Some(e)),
        };

        let applied = self.state.send_if_modified(|s| {
            if (s.overview.generation(), s.trips.generation(), s.destinations.generation()) != tags {
                return false;
            }
            match (loaded, failure.as_ref()) {
                (Some((overview, trips, destinations)), _) => {
                    s.overview.settle(tags.0, Ok(overview));
                    s.trips.settle(tags.1, Ok(trips));
                    s.destinations.settle(tags.2, Ok(destinations));
                }
                (None, failure) => {
                    let message = match failure {
                        Some(e) => format!("Failed to load dashboard: {}", e),
                        None => "Failed to load dashboard".to_string(),
                    };
                    s.overview.settle(tags.0, Err(message.clone()));
                    s.trips.settle(tags.1, Err(message.clone()));
                    s.destinations.settle(tags.2, Err(message));
                }
            }
            true
        });

        if !applied {
            debug!("Discarding superseded dashboard load");
            return Ok(LoadOutcome::Superseded);
        }
        match failure {
            None => {
                info!("Dashboard loaded");
                Ok(LoadOutcome::Applied)
            }
            Some(e) => {
                warn!("Dashboard load failed: {}", e);
                Err(e)
            }
        }
    }

    /// Switches tabs. Entering the weather tab loads weather for the selected city.
    pub async fn select_tab(&self, tab: Tab) -> Result<LoadOutcome, GatewayError> {
        let mut entered_weather = false;
        self.state.send_if_modified(|s| {
            if s.active_tab == tab {
                return false;
            }
            entered_weather = tab == Tab::Weather;
            s.active_tab = tab;
            true
        });

        if entered_weather {
            self.load_weather().await
        } else {
            Ok(LoadOutcome::Idle)
        }
    }

    /// Changes the selected city. Weather reloads only while its tab is active.
    pub async fn select_city(&self, city: &str) -> Result<LoadOutcome, GatewayError> {
        let city = city.trim();
        if city.is_empty() || city.contains('/') {
            warn!("Ignoring invalid city {:?}", city);
            return Ok(LoadOutcome::Idle);
        }

        let mut reload = false;
        self.state.send_if_modified(|s| {
            if s.selected_city == city {
                return false;
            }
            s.selected_city = city.to_string();
            reload = s.active_tab == Tab::Weather;
            true
        });

        if reload {
            self.load_weather().await
        } else {
            Ok(LoadOutcome::Idle)
        }
    }

    /// Stops the view: loads still in flight are abandoned and never applied.
    pub fn close(&self) {
        self.closed.cancel();
    }

    async fn load_weather(&self) -> Result<LoadOutcome, GatewayError> {
        if self.closed.is_cancelled() {
            return Ok(LoadOutcome::Cancelled);
        }
        let mut issued = (String::new(), 0);
        self.state.send_modify(|s| {
            issued = (s.selected_city.clone(), s.weather.begin());
        });
        let (city, tag) = issued;
        debug!("Loading weather for {} (generation {})", city, tag);

        let Some(result) = self
            .unless_closed(self.gateway.fetch::<WeatherReport>(Endpoint::weather(&city)))
            .await
        else {
            self.state.send_if_modified(|s| s.weather.abandon(tag));
            return Ok(LoadOutcome::Cancelled);
        };

        let settled = match &result {
            Ok(report) => Ok(report.clone()),
            Err(e) => Err(format!("Failed to load weather: {}", e)),
        };
        if !self.state.send_if_modified(|s| s.weather.settle(tag, settled)) {
            debug!("Discarding stale weather for {}", city);
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(_) => Ok(LoadOutcome::Applied),
            Err(e) => {
                warn!("Weather for {} failed: {}", city, e);
                Err(e)
            }
        }
    }

    async fn unless_closed<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            output = fut => Some(output),
        }
    }
}
