use crate::error::{FlowError, FlowResult};
use crate::geometry::{Point, Rect};

/// Tolerance for the empty/full checks, in the same units as capacity.
pub const LEVEL_EPSILON: f64 = 0.1;

#[derive(Clone, Debug)]
pub struct Tank {
    label: String,
    capacity: f64,
    quantity: f64,
    frame: Rect,
}

impl Tank {
    /// Creates an empty tank.
    pub fn new(label: impl Into<String>, capacity: f64, frame: Rect) -> FlowResult<Self> {
        let label = label.into();
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(FlowError::InvalidCapacity { label, capacity });
        }
        Ok(Self {
            label,
            capacity,
            quantity: 0.0,
            frame,
        })
    }

    pub fn with_quantity(mut self, quantity: f64) -> FlowResult<Self> {
        if !quantity.is_finite() || quantity < 0.0 || quantity > self.capacity {
            return Err(FlowError::QuantityOutOfRange {
                label: self.label,
                quantity,
                capacity: self.capacity,
            });
        }
        self.quantity = quantity;
        Ok(self)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn fill_fraction(&self) -> f64 {
        self.quantity / self.capacity
    }

    pub fn free_space(&self) -> f64 {
        self.capacity - self.quantity
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn top_center(&self) -> Point {
        self.frame.top_center()
    }

    pub fn bottom_center(&self) -> Point {
        self.frame.bottom_center()
    }

    /// Adds up to `amount` and returns what actually fit. Over-supply is
    /// clamped silently; only malformed amounts are rejected.
    pub fn add(&mut self, amount: f64) -> FlowResult<f64> {
        check_amount(amount)?;
        Ok(self.add_clamped(amount))
    }

    /// Removes up to `amount` and returns what was actually taken.
    pub fn remove(&mut self, amount: f64) -> FlowResult<f64> {
        check_amount(amount)?;
        Ok(self.remove_clamped(amount))
    }

    pub fn is_empty(&self) -> bool {
        self.quantity <= LEVEL_EPSILON
    }

    pub fn is_full(&self) -> bool {
        self.quantity >= self.capacity - LEVEL_EPSILON
    }

    pub fn set_full(&mut self) {
        self.quantity = self.capacity;
    }

    pub fn set_empty(&mut self) {
        self.quantity = 0.0;
    }

    // amount is known to be valid here
    pub(crate) fn add_clamped(&mut self, amount: f64) -> f64 {
        let added = amount.min(self.free_space()).max(0.0);
        self.quantity = (self.quantity + added).min(self.capacity);
        added
    }

    pub(crate) fn remove_clamped(&mut self, amount: f64) -> f64 {
        let removed = amount.min(self.quantity).max(0.0);
        self.quantity = (self.quantity - removed).max(0.0);
        removed
    }
}

fn check_amount(amount: f64) -> FlowResult<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(FlowError::InvalidAmount(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tank(quantity: f64) -> Tank {
        Tank::new("T", 100.0, Rect::new(0.0, 0.0, 100.0, 140.0))
            .unwrap()
            .with_quantity(quantity)
            .unwrap()
    }

    #[test]
    fn add_clamps_to_free_space() {
        let mut t = tank(99.5);
        assert_abs_diff_eq!(t.add(0.8).unwrap(), 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(t.quantity(), 100.0);
        assert_abs_diff_eq!(t.fill_fraction(), 1.0);
    }

    #[test]
    fn add_on_full_tank_is_noop() {
        let mut t = tank(100.0);
        assert_eq!(t.add(5.0).unwrap(), 0.0);
        assert_eq!(t.quantity(), 100.0);
    }

    #[test]
    fn remove_on_empty_tank_is_noop() {
        let mut t = tank(0.0);
        assert_eq!(t.remove(5.0).unwrap(), 0.0);
        assert_eq!(t.quantity(), 0.0);
    }

    #[test]
    fn remove_clamps_to_quantity() {
        let mut t = tank(0.3);
        assert_abs_diff_eq!(t.remove(0.8).unwrap(), 0.3);
        assert_eq!(t.quantity(), 0.0);
    }

    #[test]
    fn fill_fraction_tracks_quantity() {
        let mut t = tank(0.0);
        t.add(30.0).unwrap();
        assert_abs_diff_eq!(t.fill_fraction(), 0.3);
        t.remove(10.0).unwrap();
        assert_abs_diff_eq!(t.fill_fraction(), 0.2);
    }

    #[test]
    fn emptiness_uses_epsilon() {
        assert!(tank(0.1).is_empty());
        assert!(!tank(0.11).is_empty());
        assert!(tank(99.95).is_full());
        assert!(!tank(99.5).is_full());
    }

    #[test]
    fn set_full_and_empty_bypass_transfer() {
        let mut t = tank(42.0);
        t.set_full();
        assert_eq!(t.quantity(), 100.0);
        assert_eq!(t.fill_fraction(), 1.0);
        t.set_empty();
        assert_eq!(t.quantity(), 0.0);
        assert_eq!(t.fill_fraction(), 0.0);
    }

    #[test]
    fn malformed_amounts_are_rejected() {
        let mut t = tank(50.0);
        assert_eq!(t.add(-1.0), Err(FlowError::InvalidAmount(-1.0)));
        assert!(matches!(t.remove(f64::NAN), Err(FlowError::InvalidAmount(_))));
        assert_eq!(t.quantity(), 50.0);
    }

    #[test]
    fn construction_is_validated() {
        let frame = Rect::new(0.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            Tank::new("bad", 0.0, frame),
            Err(FlowError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            Tank::new("over", 10.0, frame).unwrap().with_quantity(11.0),
            Err(FlowError::QuantityOutOfRange { .. })
        ));
    }
}
