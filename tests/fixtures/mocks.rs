//! Hand-written collaborators recording what the session asks of them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use route_nav::error::PositionSourceError;
use route_nav::session::{NavigationSession, SessionConfig, SessionEvent};
use route_nav::traits::{
    Clock, PositionFix, PositionSource, SourceToken, SubscriptionHandle, TickSource,
};

/// Shared record of started and cancelled sources.
#[derive(Debug, Default)]
pub struct SourceLog {
    pub started: Vec<SourceToken>,
    pub cancelled: Vec<SourceToken>,
    pub periods: Vec<Duration>,
}

impl SourceLog {
    pub fn live(&self) -> usize {
        self.started.len() - self.cancelled.len()
    }

    pub fn latest(&self) -> SourceToken {
        *self.started.last().expect("no source started")
    }
}

pub struct MockHandle {
    token: SourceToken,
    log: Rc<RefCell<SourceLog>>,
}

impl SubscriptionHandle for MockHandle {
    fn cancel(&mut self) {
        self.log.borrow_mut().cancelled.push(self.token);
    }
}

#[derive(Clone, Default)]
pub struct MockPositionSource {
    pub log: Rc<RefCell<SourceLog>>,
    pub refuse: Rc<Cell<bool>>,
}

impl PositionSource for MockPositionSource {
    type Handle = MockHandle;

    fn subscribe(&mut self, token: SourceToken) -> Result<MockHandle, PositionSourceError> {
        if self.refuse.get() {
            return Err(PositionSourceError::new("location permission denied"));
        }
        self.log.borrow_mut().started.push(token);
        Ok(MockHandle {
            token,
            log: Rc::clone(&self.log),
        })
    }
}

#[derive(Clone, Default)]
pub struct MockTicker {
    pub log: Rc<RefCell<SourceLog>>,
}

impl TickSource for MockTicker {
    type Handle = MockHandle;

    fn start(&mut self, token: SourceToken, period: Duration) -> MockHandle {
        let mut log = self.log.borrow_mut();
        log.started.push(token);
        log.periods.push(period);
        MockHandle {
            token,
            log: Rc::clone(&self.log),
        }
    }
}

#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(epoch())),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now.set(self.now.get() + TimeDelta::milliseconds(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub type TestSession = NavigationSession<MockPositionSource, MockTicker, ManualClock>;

/// Everything a test needs to drive and inspect a session.
pub struct Harness {
    pub session: TestSession,
    pub device: MockPositionSource,
    pub ticker: MockTicker,
    pub clock: ManualClock,
    pub events: Rc<RefCell<Vec<SessionEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        let device = MockPositionSource::default();
        let ticker = MockTicker::default();
        let clock = ManualClock::new();
        let mut session = NavigationSession::with_clock(
            device.clone(),
            ticker.clone(),
            clock.clone(),
            SessionConfig::default(),
        );

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.add_observer(move |event: &SessionEvent| sink.borrow_mut().push(event.clone()));

        Self {
            session,
            device,
            ticker,
            clock,
            events,
        }
    }

    pub fn timer_token(&self) -> SourceToken {
        self.ticker.log.borrow().latest()
    }

    pub fn device_token(&self) -> SourceToken {
        self.device.log.borrow().latest()
    }

    pub fn live_sources(&self) -> usize {
        self.ticker.log.borrow().live() + self.device.log.borrow().live()
    }

    pub fn count(&self, matches: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| matches(*event)).count()
    }

    pub fn fix(&self, lat: f64, lng: f64, speed_mps: Option<f64>) -> PositionFix {
        PositionFix {
            latitude: lat,
            longitude: lng,
            accuracy: 5.0,
            speed_mps,
            timestamp: self.clock.now(),
        }
    }
}
