//! The firefly oscillator.
//!
//! A firefly carries a position, a whole-degree orientation, and two
//! deadlines. It fires when the clock reaches `next_blink`; firing moves the
//! deadline forward by exactly one period from the old deadline, never from
//! "now", so repeated firings do not drift. A neighbor's blink pulls the
//! deadline earlier (a nudge), which may make the firefly fire on the spot.
//!
//! Fireflies are plain values. The owning cell mutates them in place during
//! its Move and Blink phases; the world only moves them between cells.

use cellfire_types::{CellCoord, FireflyId};

use crate::blink::BlinkSignal;
use crate::geometry::Geometry;
use crate::migration::Migration;
use crate::trig::{TrigTable, normalize_orientation};

/// One oscillator in the swarm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Firefly {
    id: FireflyId,
    x: f32,
    y: f32,
    orientation: u16,
    period: u64,
    last_blink: u64,
    next_blink: u64,
    nudgeable: bool,
}

impl Firefly {
    /// Create a firefly whose first blink is due at `next_blink`.
    ///
    /// The orientation is normalized into `[0, 360)`. The position is kept as
    /// given; the world wraps it when the firefly enters its first cell.
    pub fn new(
        id: FireflyId,
        x: f32,
        y: f32,
        orientation: i32,
        period: u64,
        next_blink: u64,
    ) -> Self {
        Self {
            id,
            x,
            y,
            orientation: normalize_orientation(orientation),
            period,
            last_blink: next_blink.saturating_sub(period),
            next_blink,
            nudgeable: true,
        }
    }

    /// Unique identifier.
    pub const fn id(&self) -> FireflyId {
        self.id
    }

    /// Horizontal position.
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical position.
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Position as a pair.
    pub const fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Heading in whole degrees, `0..360`, counter-clockwise from +x.
    pub const fn orientation(&self) -> u16 {
        self.orientation
    }

    /// Fixed time between two unperturbed firings.
    pub const fn period(&self) -> u64 {
        self.period
    }

    /// Deadline of the most recent firing.
    pub const fn last_blink(&self) -> u64 {
        self.last_blink
    }

    /// Deadline of the next firing.
    pub const fn next_blink(&self) -> u64 {
        self.next_blink
    }

    /// Whether a neighbor's blink can still move this firefly's deadline.
    pub const fn is_nudgeable(&self) -> bool {
        self.nudgeable
    }

    /// Point the firefly in a new direction.
    pub fn set_orientation(&mut self, degrees: i32) {
        self.orientation = normalize_orientation(degrees);
    }

    /// Rotate by `delta` degrees (counter-clockwise for positive values).
    pub fn turn(&mut self, delta: i32) {
        self.set_orientation(i32::from(self.orientation).saturating_add(delta));
    }

    pub(crate) const fn place(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    /// Make the firefly receptive again at the start of a Blink phase.
    pub const fn reset_nudgeable(&mut self) {
        self.nudgeable = true;
    }

    /// Fire if the deadline has been reached.
    ///
    /// On firing the deadline moves forward by exactly one period from the
    /// old deadline, and the firefly stops accepting nudges for the rest of
    /// the phase. Returns whether it fired.
    pub const fn check_fired(&mut self, clock: u64) -> bool {
        if clock < self.next_blink {
            return false;
        }
        self.last_blink = self.next_blink;
        self.next_blink = self.next_blink.saturating_add(self.period);
        self.nudgeable = false;
        true
    }

    /// Pull the deadline `amount` earlier, then fire if it is now due.
    ///
    /// Nudges compound: each call subtracts `amount` again until the firefly
    /// fires. Returns whether it fired.
    pub const fn nudge(&mut self, amount: u64, clock: u64) -> bool {
        self.next_blink = self.next_blink.saturating_sub(amount);
        self.check_fired(clock)
    }

    /// Take one step of length `step` along the current orientation, wrapping
    /// around the torus.
    ///
    /// `owner` is the cell that currently holds the firefly. Returns a
    /// migration when the new position belongs to a different cell.
    pub fn advance(
        &mut self,
        trig: &TrigTable,
        geometry: &Geometry,
        step: f32,
        owner: CellCoord,
    ) -> Option<Migration> {
        let (cos, sin) = trig.unit(self.orientation);
        let (x, y) = geometry.wrap_position(cos.mul_add(step, self.x), sin.mul_add(step, self.y));
        debug_assert!(
            geometry.contains(x, y),
            "firefly {} escaped the world at ({x}, {y})",
            self.id
        );
        self.x = x;
        self.y = y;

        let destination = geometry.cell_of(x, y);
        (destination != owner).then(|| Migration::relocate(*self, owner, destination))
    }

    /// What neighbors need to know about one firing of this firefly.
    pub const fn signal(&self) -> BlinkSignal {
        BlinkSignal {
            firefly: self.id,
            x: self.x,
            y: self.y,
        }
    }
}

impl core::fmt::Display for Firefly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:>4}: {:>8.2} x {:>8.2} @ {:>4} next {}",
            self.id, self.x, self.y, self.orientation, self.next_blink
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn firefly(next_blink: u64) -> Firefly {
        Firefly::new(FireflyId::new(0), 50.0, 50.0, 0, 1_000_000, next_blink)
    }

    #[test]
    fn check_fired_moves_deadline_by_one_period() {
        let mut f = firefly(500_000);
        assert!(!f.check_fired(499_999));
        assert_eq!(f.next_blink(), 500_000);
        assert!(f.is_nudgeable());

        assert!(f.check_fired(525_000));
        assert_eq!(f.last_blink(), 500_000);
        assert_eq!(f.next_blink(), 1_500_000);
        assert!(!f.is_nudgeable());
    }

    #[test]
    fn deadline_does_not_drift_from_a_late_clock() {
        let mut f = firefly(100);
        assert!(f.check_fired(90_000));
        assert_eq!(f.next_blink(), 1_000_100);
    }

    #[test]
    fn nudge_without_firing_subtracts_exactly() {
        let mut f = firefly(500_000);
        assert!(!f.nudge(50_000, 0));
        assert_eq!(f.next_blink(), 450_000);
        assert!(f.is_nudgeable());
    }

    #[test]
    fn nudges_compound_until_firing() {
        let mut f = firefly(100_000);
        assert!(!f.nudge(50_000, 25_000));
        assert!(f.nudge(50_000, 25_000));
        assert_eq!(f.last_blink(), 0);
        assert_eq!(f.next_blink(), 1_000_000);
        assert!(!f.is_nudgeable());
    }

    #[test]
    fn nudge_saturates_at_zero() {
        let mut f = firefly(10);
        assert!(f.nudge(50_000, 0));
        assert_eq!(f.next_blink(), 1_000_000);
    }

    #[test]
    fn orientation_is_normalized() {
        let mut f = Firefly::new(FireflyId::new(1), 0.0, 0.0, -90, 1, 1);
        assert_eq!(f.orientation(), 270);
        f.turn(95);
        assert_eq!(f.orientation(), 5);
        f.turn(-10);
        assert_eq!(f.orientation(), 355);
    }

    #[test]
    fn advance_inside_a_cell_stays() {
        let trig = TrigTable::new();
        let geometry = Geometry::new(10, 10, 100.0).unwrap();
        let mut f = firefly(1);
        let owner = geometry.cell_of(f.x(), f.y());
        assert!(f.advance(&trig, &geometry, 1.0, owner).is_none());
        assert!((f.x() - 51.0).abs() < 1e-4);
        assert!((f.y() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn advance_across_the_right_edge_wraps_and_migrates() {
        let trig = TrigTable::new();
        let geometry = Geometry::new(10, 10, 100.0).unwrap();
        let mut f = Firefly::new(FireflyId::new(2), 999.5, 10.0, 0, 1, 1);
        let owner = CellCoord::new(9, 0);
        let migration = f.advance(&trig, &geometry, 1.0, owner).unwrap();
        assert!((f.x() - 0.5).abs() < 1e-3);
        assert_eq!(migration.from(), Some(owner));
        assert_eq!(migration.to(), CellCoord::new(0, 0));
        assert_eq!(migration.firefly().id(), FireflyId::new(2));
    }

    #[test]
    fn advance_across_the_bottom_edge_wraps() {
        let trig = TrigTable::new();
        let geometry = Geometry::new(10, 10, 100.0).unwrap();
        let mut f = Firefly::new(FireflyId::new(3), 10.0, 0.25, 270, 1, 1);
        let migration = f
            .advance(&trig, &geometry, 1.0, CellCoord::new(0, 0))
            .unwrap();
        assert!((f.y() - 999.25).abs() < 1e-3);
        assert_eq!(migration.to(), CellCoord::new(0, 9));
    }

    #[test]
    fn display_does_not_panic() {
        let f = firefly(1);
        assert!(f.to_string().contains("50.00"));
    }
}
