//! Navigation session state machine.
//!
//! ```text
//! Idle -> Navigating | Simulating -> Paused -> (resume) -> Completed -> Idle
//! ```
//!
//! The session owns all mutable progress state. At most one position source
//! (device subscription or simulation timer) is live at any time; every
//! source is started with a fresh [`SourceToken`] and torn down before the
//! next one starts, so events still in flight from an old source are
//! recognized by their token and discarded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PositionSourceError, SessionError};
use crate::geo::LatLng;
use crate::haversine::{haversine_m, speed_kmh};
use crate::instructions::{Instruction, generate_instructions};
use crate::route::Route;
use crate::tracker::{ProgressSnapshot, ProgressTracker, TrackerConfig};
use crate::traits::{
    Clock, PositionFix, PositionSource, SessionObserver, SourceToken, SubscriptionHandle,
    SystemClock, TickSource,
};

/// Shortest elapsed time used when averaging trip speed.
const MIN_ELAPSED_HOURS: f64 = 1.0 / 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    Idle,
    Navigating,
    Simulating,
    Paused,
    Completed,
}

/// Playback rate of a simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationSpeed {
    #[default]
    X1,
    X2,
    X4,
}

impl SimulationSpeed {
    pub fn multiplier(self) -> u8 {
        match self {
            SimulationSpeed::X1 => 1,
            SimulationSpeed::X2 => 2,
            SimulationSpeed::X4 => 4,
        }
    }

    /// Timer period: one path vertex per `1000 ms / multiplier`.
    pub fn tick_period(self) -> Duration {
        Duration::from_millis(1000 / self.multiplier() as u64)
    }
}

impl TryFrom<u8> for SimulationSpeed {
    type Error = SessionError;

    fn try_from(multiplier: u8) -> Result<Self, Self::Error> {
        match multiplier {
            1 => Ok(SimulationSpeed::X1),
            2 => Ok(SimulationSpeed::X2),
            4 => Ok(SimulationSpeed::X4),
            other => Err(SessionError::UnsupportedSpeed(other)),
        }
    }
}

/// Aggregate computed once when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Distance actually traveled, in meters.
    pub total_distance_m: f64,
    /// Route estimate at session start, in seconds.
    pub total_estimated_time_s: f64,
    pub average_speed_kmh: f64,
    /// Whether the session ended by reaching the destination.
    pub arrived: bool,
}

impl TripSummary {
    /// Builds a summary, bounding the average speed to `[0, max_speed_kmh]`
    /// and the elapsed time from below by one second.
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        total_distance_m: f64,
        total_estimated_time_s: f64,
        max_speed_kmh: f64,
        arrived: bool,
    ) -> Self {
        let elapsed_ms = (end_time - start_time).num_milliseconds().max(0);
        let elapsed_hours = (elapsed_ms as f64 / 3_600_000.0).max(MIN_ELAPSED_HOURS);
        let average_speed_kmh =
            (total_distance_m / 1000.0 / elapsed_hours).clamp(0.0, max_speed_kmh);

        Self {
            start_time,
            end_time,
            total_distance_m,
            total_estimated_time_s,
            average_speed_kmh,
            arrived,
        }
    }

    pub fn duration(&self) -> chrono::TimeDelta {
        self.end_time - self.start_time
    }
}

/// Emitted to observers after each committed change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    Started { mode: SessionMode },
    Tick(ProgressSnapshot),
    Paused,
    Resumed { mode: SessionMode },
    SpeedChanged(SimulationSpeed),
    Arrived,
    SourceFailed(PositionSourceError),
    Completed(TripSummary),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub tracker: TrackerConfig,
    pub initial_speed: SimulationSpeed,
    /// Device fixes reporting a horizontal accuracy worse than this (meters)
    /// are discarded.
    pub max_fix_accuracy_m: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            initial_speed: SimulationSpeed::default(),
            max_fix_accuracy_m: 100.0,
        }
    }
}

/// What a paused session resumes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Driver {
    Device,
    Simulation,
}

impl Driver {
    fn mode(self) -> SessionMode {
        match self {
            Driver::Device => SessionMode::Navigating,
            Driver::Simulation => SessionMode::Simulating,
        }
    }
}

enum Handle<D, T> {
    Device(D),
    Timer(T),
}

struct ActiveSource<D, T> {
    token: SourceToken,
    handle: Handle<D, T>,
}

impl<D: SubscriptionHandle, T: SubscriptionHandle> ActiveSource<D, T> {
    fn cancel(&mut self) {
        match &mut self.handle {
            Handle::Device(handle) => handle.cancel(),
            Handle::Timer(handle) => handle.cancel(),
        }
    }
}

pub struct NavigationSession<P, T, C = SystemClock>
where
    P: PositionSource,
    T: TickSource,
    C: Clock,
{
    config: SessionConfig,
    position_source: P,
    ticker: T,
    clock: C,
    observers: Vec<Box<dyn SessionObserver>>,

    route: Option<Arc<Route>>,
    instructions: Vec<Instruction>,

    mode: SessionMode,
    driver: Option<Driver>,
    active: Option<ActiveSource<P::Handle, T::Handle>>,
    next_token: u64,
    speed: SimulationSpeed,

    tracker: Option<ProgressTracker>,
    snapshot: Option<ProgressSnapshot>,
    position: Option<LatLng>,
    last_fix_time: Option<DateTime<Utc>>,
    simulation_index: usize,
    traveled_m: f64,
    start_time: Option<DateTime<Utc>>,
    summary: Option<TripSummary>,
}

impl<P, T> NavigationSession<P, T, SystemClock>
where
    P: PositionSource,
    T: TickSource,
{
    pub fn new(position_source: P, ticker: T, config: SessionConfig) -> Self {
        Self::with_clock(position_source, ticker, SystemClock, config)
    }
}

impl<P, T, C> NavigationSession<P, T, C>
where
    P: PositionSource,
    T: TickSource,
    C: Clock,
{
    pub fn with_clock(position_source: P, ticker: T, clock: C, config: SessionConfig) -> Self {
        Self {
            speed: config.initial_speed,
            config,
            position_source,
            ticker,
            clock,
            observers: Vec::new(),
            route: None,
            instructions: Vec::new(),
            mode: SessionMode::Idle,
            driver: None,
            active: None,
            next_token: 0,
            tracker: None,
            snapshot: None,
            position: None,
            last_fix_time: None,
            simulation_index: 0,
            traveled_m: 0.0,
            start_time: None,
            summary: None,
        }
    }

    pub fn add_observer(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Progress after the last committed tick.
    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn current_instruction(&self) -> Option<&Instruction> {
        let snapshot = self.snapshot.as_ref()?;
        self.instructions.get(snapshot.instruction_index)
    }

    pub fn position(&self) -> Option<LatLng> {
        self.position
    }

    pub fn speed(&self) -> SimulationSpeed {
        self.speed
    }

    pub fn simulation_index(&self) -> usize {
        self.simulation_index
    }

    pub fn traveled_m(&self) -> f64 {
        self.traveled_m
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Summary of the last completed session, until consumed.
    pub fn trip_summary(&self) -> Option<&TripSummary> {
        self.summary.as_ref()
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.mode,
            SessionMode::Navigating | SessionMode::Simulating | SessionMode::Paused
        )
    }

    /// Installs a route with instructions generated from its geometry.
    pub fn load_route(&mut self, route: Arc<Route>) {
        let instructions = generate_instructions(&route.path);
        self.load_route_with_instructions(route, instructions);
    }

    /// Installs a route. A running session on the previous route is ended
    /// first; its summary stays available through [`Self::take_trip_summary`].
    pub fn load_route_with_instructions(
        &mut self,
        route: Arc<Route>,
        instructions: Vec<Instruction>,
    ) {
        if self.is_running() {
            info!("route replaced, ending running session");
            self.finish(false);
        }
        debug!(vertices = route.path.len(), instructions = instructions.len(), "route loaded");
        self.route = Some(route);
        self.instructions = instructions;
    }

    /// Starts following the device position stream.
    pub fn start_navigation(&mut self) -> Result<(), SessionError> {
        self.check_startable("start navigation")?;
        self.teardown();

        let token = self.issue_token();
        let handle = self.position_source.subscribe(token).map_err(|err| {
            warn!(error = %err, "position source refused subscription");
            SessionError::from(err)
        })?;
        self.active = Some(ActiveSource {
            token,
            handle: Handle::Device(handle),
        });

        self.begin(Driver::Device)?;
        Ok(())
    }

    /// Starts replaying the route path on the simulation timer.
    pub fn start_simulation(&mut self) -> Result<(), SessionError> {
        self.check_startable("start simulation")?;
        self.teardown();
        let route = self.begin(Driver::Simulation)?;

        self.start_timer();
        if let Some(&first) = route.path.first() {
            self.commit_tick(first, None);
        }
        Ok(())
    }

    /// Suspends the live source, keeping all progress.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if !matches!(self.mode, SessionMode::Navigating | SessionMode::Simulating) {
            return Err(self.invalid("pause"));
        }
        self.teardown();
        self.mode = SessionMode::Paused;
        info!("session paused");
        self.emit(SessionEvent::Paused);
        Ok(())
    }

    /// Restarts the source a paused session was using, from where it stopped.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        let driver = match (self.mode, self.driver) {
            (SessionMode::Paused, Some(driver)) => driver,
            _ => return Err(self.invalid("resume")),
        };
        self.teardown();

        match driver {
            Driver::Device => {
                let token = self.issue_token();
                match self.position_source.subscribe(token) {
                    Ok(handle) => {
                        self.active = Some(ActiveSource {
                            token,
                            handle: Handle::Device(handle),
                        })
                    }
                    Err(err) => {
                        self.fail_source(err.clone());
                        return Err(err.into());
                    }
                }
            }
            Driver::Simulation => self.start_timer(),
        }

        self.mode = driver.mode();
        info!(mode = ?self.mode, "session resumed");
        self.emit(SessionEvent::Resumed { mode: self.mode });
        Ok(())
    }

    /// Changes the simulation rate. A running simulation keeps its position;
    /// only the timer is replaced.
    pub fn change_speed(&mut self, multiplier: u8) -> Result<(), SessionError> {
        let speed = SimulationSpeed::try_from(multiplier)?;
        if speed == self.speed {
            return Ok(());
        }
        self.speed = speed;

        if self.mode == SessionMode::Simulating {
            self.teardown();
            self.start_timer();
        }
        debug!(multiplier, "simulation speed changed");
        self.emit(SessionEvent::SpeedChanged(speed));
        Ok(())
    }

    /// Ends the session and returns its summary, leaving the session idle.
    pub fn stop(&mut self) -> Result<TripSummary, SessionError> {
        match self.mode {
            SessionMode::Idle => return Err(self.invalid("stop")),
            SessionMode::Completed => {}
            SessionMode::Navigating | SessionMode::Simulating | SessionMode::Paused => {
                self.finish(false);
            }
        }
        self.take_trip_summary().ok_or_else(|| self.invalid("stop"))
    }

    /// Consumes the summary of a completed session and returns to idle.
    pub fn take_trip_summary(&mut self) -> Option<TripSummary> {
        if self.mode != SessionMode::Completed {
            return None;
        }
        let summary = self.summary.take();
        self.reset_progress();
        self.mode = SessionMode::Idle;
        summary
    }

    /// Drops all session state, cancelling any live source. The route stays
    /// loaded.
    pub fn close(&mut self) {
        self.teardown();
        self.reset_progress();
        self.summary = None;
        self.mode = SessionMode::Idle;
    }

    /// Applies a device fix. Returns the committed snapshot, or `None` when
    /// the fix was discarded.
    pub fn on_position(
        &mut self,
        token: SourceToken,
        fix: PositionFix,
    ) -> Option<ProgressSnapshot> {
        if !self.accepts(token, SessionMode::Navigating) {
            debug!(token = token.0, "discarding fix from inactive source");
            return None;
        }

        let position = LatLng::new(fix.latitude, fix.longitude);
        if !position.is_valid() {
            warn!(lat = fix.latitude, lng = fix.longitude, "discarding out-of-range fix");
            return None;
        }
        if !(fix.accuracy <= self.config.max_fix_accuracy_m) {
            debug!(accuracy = fix.accuracy, "discarding low-accuracy fix");
            return None;
        }

        let instantaneous = match (fix.speed_mps, self.position, self.last_fix_time) {
            (Some(speed_mps), _, _) => Some(speed_mps * 3.6),
            (None, Some(previous), Some(previous_time)) => {
                let seconds = (fix.timestamp - previous_time).num_milliseconds() as f64 / 1000.0;
                (seconds > 0.0).then(|| speed_kmh(haversine_m(previous, position), seconds))
            }
            _ => None,
        };

        self.last_fix_time = Some(fix.timestamp);
        self.commit_tick(position, instantaneous)
    }

    /// Reports a failure of the device position stream. Ends the session.
    pub fn on_position_error(&mut self, token: SourceToken, error: PositionSourceError) {
        if !self.accepts(token, SessionMode::Navigating) {
            debug!(token = token.0, "discarding error from inactive source");
            return;
        }
        self.fail_source(error);
    }

    /// Advances the simulation by one path vertex.
    pub fn on_timer_tick(&mut self, token: SourceToken) -> Option<ProgressSnapshot> {
        if !self.accepts(token, SessionMode::Simulating) {
            debug!(token = token.0, "discarding tick from inactive timer");
            return None;
        }

        let route = self.route.clone()?;
        let last = route.path.len().checked_sub(1)?;
        self.simulation_index = (self.simulation_index + 1).min(last);
        let position = route.path[self.simulation_index];

        let step_m = self.position.map_or(0.0, |previous| haversine_m(previous, position));
        let seconds = self.speed.tick_period().as_secs_f64();
        self.commit_tick(position, Some(speed_kmh(step_m, seconds)))
    }

    fn check_startable(&mut self, action: &'static str) -> Result<(), SessionError> {
        match self.mode {
            SessionMode::Idle => {}
            SessionMode::Completed => {
                if self.summary.is_some() {
                    debug!("discarding unconsumed trip summary");
                }
                self.summary = None;
                self.reset_progress();
                self.mode = SessionMode::Idle;
            }
            _ => return Err(self.invalid(action)),
        }

        match &self.route {
            None => Err(SessionError::NoRoute),
            Some(route) if route.is_empty() => Err(SessionError::EmptyRoute),
            Some(_) => Ok(()),
        }
    }

    /// Resets progress for a new trip and enters the driver's mode.
    fn begin(&mut self, driver: Driver) -> Result<Arc<Route>, SessionError> {
        let route = self.route.clone().ok_or(SessionError::NoRoute)?;

        self.reset_progress();
        self.tracker = Some(ProgressTracker::for_route(
            &route,
            self.instructions.len(),
            self.config.tracker,
        ));
        self.start_time = Some(self.clock.now());
        self.driver = Some(driver);
        self.mode = driver.mode();

        info!(mode = ?self.mode, vertices = route.path.len(), "session started");
        self.emit(SessionEvent::Started { mode: self.mode });
        Ok(route)
    }

    fn start_timer(&mut self) {
        let token = self.issue_token();
        let handle = self.ticker.start(token, self.speed.tick_period());
        self.active = Some(ActiveSource {
            token,
            handle: Handle::Timer(handle),
        });
    }

    fn commit_tick(
        &mut self,
        position: LatLng,
        instantaneous_kmh: Option<f64>,
    ) -> Option<ProgressSnapshot> {
        let tracker = self.tracker.as_mut()?;
        let snapshot = tracker.tick(position, instantaneous_kmh);

        if let Some(previous) = self.position {
            self.traveled_m += haversine_m(previous, position);
        }
        self.position = Some(position);
        self.snapshot = Some(snapshot);
        self.emit(SessionEvent::Tick(snapshot));

        if snapshot.arrived {
            info!(remaining_m = snapshot.remaining_distance_m, "destination reached");
            self.emit(SessionEvent::Arrived);
            self.finish(true);
        }
        Some(snapshot)
    }

    fn fail_source(&mut self, error: PositionSourceError) {
        warn!(error = %error, "position source failed, ending session");
        self.emit(SessionEvent::SourceFailed(error));
        self.finish(false);
    }

    /// Cancels the live source, computes the summary and enters Completed.
    fn finish(&mut self, arrived: bool) {
        self.teardown();

        let end_time = self.clock.now();
        let start_time = self.start_time.unwrap_or(end_time);
        let estimated = self
            .tracker
            .as_ref()
            .map_or(0.0, ProgressTracker::total_estimated_time_s);
        let summary = TripSummary::new(
            start_time,
            end_time,
            self.traveled_m,
            estimated,
            self.config.tracker.max_speed_kmh,
            arrived,
        );

        self.driver = None;
        self.mode = SessionMode::Completed;
        self.summary = Some(summary.clone());
        info!(
            distance_m = summary.total_distance_m,
            average_speed_kmh = summary.average_speed_kmh,
            arrived,
            "session completed"
        );
        self.emit(SessionEvent::Completed(summary));
    }

    fn teardown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.cancel();
            debug!(token = active.token.0, "position source cancelled");
        }
    }

    fn reset_progress(&mut self) {
        self.tracker = None;
        self.snapshot = None;
        self.position = None;
        self.last_fix_time = None;
        self.simulation_index = 0;
        self.traveled_m = 0.0;
        self.start_time = None;
        self.driver = None;
    }

    fn accepts(&self, token: SourceToken, mode: SessionMode) -> bool {
        self.mode == mode && self.active.as_ref().is_some_and(|active| active.token == token)
    }

    fn issue_token(&mut self) -> SourceToken {
        self.next_token += 1;
        SourceToken(self.next_token)
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            from: self.mode,
            action,
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }
}

impl<P, T, C> Drop for NavigationSession<P, T, C>
where
    P: PositionSource,
    T: TickSource,
    C: Clock,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
