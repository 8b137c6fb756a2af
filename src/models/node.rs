//! Node and time window types.

use serde::{Deserialize, Serialize};

/// An admissible service window `[ready, due]` at a node.
///
/// Service may not start before `ready` (the vehicle waits) and must start
/// no later than `due`.
///
/// # Examples
///
/// ```
/// use u_cvrptw::models::TimeWindow;
///
/// let tw = TimeWindow::new(100.0, 200.0).unwrap();
/// assert!(tw.ready() <= tw.due());
/// assert!(tw.contains(150.0));
/// assert!(!tw.contains(250.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    ready: f64,
    due: f64,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// Returns `None` if `ready > due` or either value is non-finite.
    pub fn new(ready: f64, due: f64) -> Option<Self> {
        if !ready.is_finite() || !due.is_finite() || ready > due {
            return None;
        }
        Some(Self { ready, due })
    }

    /// Earliest service start.
    pub fn ready(&self) -> f64 {
        self.ready
    }

    /// Latest service start.
    pub fn due(&self) -> f64 {
        self.due
    }

    /// Returns `true` if the given time falls within this window.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.ready && time <= self.due
    }

    /// Returns `true` if `other` lies entirely inside this window.
    pub fn covers(&self, other: &TimeWindow) -> bool {
        self.ready <= other.ready && other.due <= self.due
    }

    /// Returns `true` if arriving at the given time violates this window.
    pub fn is_violated(&self, arrival: f64) -> bool {
        arrival > self.due
    }
}

/// A location of a routing instance: the depot (id 0) or a customer.
///
/// # Examples
///
/// ```
/// use u_cvrptw::models::{Node, TimeWindow};
///
/// let depot = Node::depot(35.0, 35.0, 230.0);
/// assert_eq!(depot.id(), 0);
/// assert_eq!(depot.demand(), 0.0);
///
/// let c = Node::new(1, 41.0, 49.0, 10.0, TimeWindow::new(161.0, 171.0).unwrap(), 10.0);
/// assert_eq!(c.id(), 1);
/// assert!(!c.is_depot());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: usize,
    x: f64,
    y: f64,
    demand: f64,
    time_window: TimeWindow,
    service_time: f64,
}

impl Node {
    /// Creates a new node.
    pub fn new(
        id: usize,
        x: f64,
        y: f64,
        demand: f64,
        time_window: TimeWindow,
        service_time: f64,
    ) -> Self {
        Self {
            id,
            x,
            y,
            demand,
            time_window,
            service_time,
        }
    }

    /// Creates a depot at the given coordinates, open over `[0, horizon]`.
    ///
    /// A negative or non-finite horizon collapses the window to `[0, 0]`.
    pub fn depot(x: f64, y: f64, horizon: f64) -> Self {
        let time_window = TimeWindow::new(0.0, horizon)
            .unwrap_or(TimeWindow { ready: 0.0, due: 0.0 });
        Self::new(0, x, y, 0.0, time_window, 0.0)
    }

    /// Node id (0 = depot).
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns `true` for the depot.
    pub fn is_depot(&self) -> bool {
        self.id == 0
    }

    /// X-coordinate.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Y-coordinate.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Demand served at this node.
    pub fn demand(&self) -> f64 {
        self.demand
    }

    /// Admissible service window.
    pub fn time_window(&self) -> &TimeWindow {
        &self.time_window
    }

    /// Earliest service start.
    pub fn ready_time(&self) -> f64 {
        self.time_window.ready()
    }

    /// Latest service start.
    pub fn due_date(&self) -> f64 {
        self.time_window.due()
    }

    /// Service duration.
    pub fn service_time(&self) -> f64 {
        self.service_time
    }

    /// Euclidean distance to another node.
    pub fn distance_to(&self, other: &Node) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}
