//! Constant-velocity movement inside a bounding rectangle.
//!
//! A node that crosses an edge of its rectangle re-enters on the opposite
//! side, offset by its overshoot. Direction is never inverted.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rectangle, Vector};
use crate::time::VirtualTime;

/// Movement state owned by a single fog node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mobility {
    position: Point,
    velocity: Vector,
    bounds: Rectangle,
    mobile: bool,
    last_update: VirtualTime,
}

impl Mobility {
    /// A mobile node starting at `position` with a fixed velocity.
    pub fn new(position: Point, velocity: Vector, bounds: Rectangle) -> Self {
        let mut mobility = Mobility {
            position,
            velocity,
            bounds,
            mobile: true,
            last_update: VirtualTime::ZERO,
        };
        mobility.wrap();
        mobility
    }

    /// A mobile node with the given speed and a random heading.
    pub fn with_random_heading<R: Rng + ?Sized>(
        position: Point,
        speed: f64,
        bounds: Rectangle,
        rng: &mut R,
    ) -> Self {
        let heading = rng.gen_range(0.0..std::f64::consts::TAU);
        Mobility::new(position, Vector::from_polar(speed, heading), bounds)
    }

    /// A node that never moves.
    pub fn stationary(position: Point, bounds: Rectangle) -> Self {
        let mut mobility = Mobility::new(position, Vector::ZERO, bounds);
        mobility.mobile = false;
        mobility
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn velocity(&self) -> Vector {
        self.velocity
    }

    pub fn bounds(&self) -> &Rectangle {
        &self.bounds
    }

    pub fn is_mobile(&self) -> bool {
        self.mobile
    }

    pub fn last_update(&self) -> VirtualTime {
        self.last_update
    }

    pub fn set_mobile(&mut self, mobile: bool) {
        self.mobile = mobile;
    }

    /// Replace the velocity; the current position is kept.
    pub fn set_direction(&mut self, velocity: Vector) {
        self.velocity = velocity;
    }

    /// Move for the time elapsed since the last update, then wrap.
    ///
    /// Calling this twice at the same instant moves the node once.
    pub fn advance(&mut self, now: VirtualTime) -> Point {
        let dt = now.elapsed_secs_since(self.last_update);
        if self.mobile && dt > 0.0 {
            self.position = self.position.translated(self.velocity, dt);
            self.wrap();
        }
        if self.last_update.is_before(now) {
            self.last_update = now;
        }
        self.position
    }

    fn wrap(&mut self) {
        self.position.x = wrap_axis(self.position.x, self.bounds.x(), self.bounds.width());
        self.position.y = wrap_axis(self.position.y, self.bounds.y(), self.bounds.height());
    }
}

fn wrap_axis(value: f64, origin: f64, extent: f64) -> f64 {
    if value >= origin && value <= origin + extent {
        return value;
    }
    let offset = (value - origin).rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative offsets.
    if offset >= extent {
        origin
    } else {
        origin + offset
    }
}
