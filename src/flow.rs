use crate::clock::Interval;
use crate::error::{FlowError, FlowResult};
use crate::geometry::Rect;
use crate::pipe::Pipe;
use crate::tank::Tank;
use serde::Serialize;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowRules {
    pub transfer_rate: f64,        // quantity units per pipe per tick
    pub downstream_threshold: f64, // source fill fraction needed past the head pair
    pub tick_interval: Duration,
}

impl Default for FlowRules {
    fn default() -> Self {
        Self {
            transfer_rate: 0.8,
            downstream_threshold: 0.3,
            tick_interval: Duration::from_millis(20),
        }
    }
}

impl FlowRules {
    pub fn validate(&self) -> FlowResult<()> {
        if !self.transfer_rate.is_finite() || self.transfer_rate <= 0.0 {
            return Err(FlowError::InvalidRules("transfer rate must be positive"));
        }
        if !(0.0..=1.0).contains(&self.downstream_threshold) {
            return Err(FlowError::InvalidRules("threshold must lie within 0..=1"));
        }
        if self.tick_interval.is_zero() {
            return Err(FlowError::InvalidRules("tick interval must be non-zero"));
        }
        Ok(())
    }
}

/// Liquid moved through one pipe during a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transfer {
    pub pipe: usize,
    pub removed: f64,
    pub added: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutcome {
    pub transfers: Vec<Transfer>,
}

impl TickOutcome {
    pub fn moved(&self) -> f64 {
        self.transfers.iter().map(|t| t.added).sum()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TankState {
    pub label: String,
    pub quantity: f64,
    pub capacity: f64,
    pub fill_fraction: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PipeState {
    pub source: usize,
    pub destination: usize,
    pub flowing: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub ticks: u64,
    pub running: bool,
    pub tanks: Vec<TankState>,
    pub pipes: Vec<PipeState>,
}

/// Owns a linear tank chain and steps liquid down it one tick at a time.
///
/// `pipes[i]` joins `tanks[i]` and `tanks[i + 1]`. The head pair drains
/// whenever its source holds anything; every later pair waits until its
/// source reaches `downstream_threshold`. Pairs run in forward order, so
/// liquid can cross several pipes within one tick.
#[derive(Clone, Debug)]
pub struct FlowController {
    tanks: Vec<Tank>,
    pipes: Vec<Pipe>,
    rules: FlowRules,
    running: bool,
    ticks: u64,
    clock: Interval,
}

impl FlowController {
    pub fn new(tanks: Vec<Tank>, rules: FlowRules) -> FlowResult<Self> {
        rules.validate()?;
        if tanks.len() < 2 {
            return Err(FlowError::EmptyChain(tanks.len()));
        }
        let pipes = tanks
            .windows(2)
            .enumerate()
            .map(|(i, pair)| Pipe::connect(i, &pair[0], i + 1, &pair[1]))
            .collect();

        Ok(Self {
            tanks,
            pipes,
            rules,
            running: false,
            ticks: 0,
            clock: Interval::new(rules.tick_interval),
        })
    }

    /// Four 100-unit tanks in a staggered cascade; the head starts full.
    pub fn standard() -> FlowResult<Self> {
        const FRAMES: [(f32, f32); 4] = [(60.0, 50.0), (320.0, 200.0), (580.0, 350.0), (320.0, 540.0)];

        let mut tanks = FRAMES
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Tank::new(format!("T{}", i + 1), 100.0, Rect::new(x, y, 100.0, 140.0)))
            .collect::<FlowResult<Vec<_>>>()?;
        tanks[0].set_full();

        Self::new(tanks, FlowRules::default())
    }

    pub fn rules(&self) -> &FlowRules {
        &self.rules
    }

    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn tank(&self, index: usize) -> FlowResult<&Tank> {
        self.tanks.get(index).ok_or(FlowError::TankOutOfRange {
            index,
            count: self.tanks.len(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn total_quantity(&self) -> f64 {
        self.tanks.iter().map(Tank::quantity).sum()
    }

    /// Applies the transfer rule once across the whole chain.
    pub fn tick(&mut self) -> TickOutcome {
        for pipe in &mut self.pipes {
            pipe.set_flowing(false);
        }

        let mut outcome = TickOutcome::default();
        for i in 0..self.pipes.len() {
            if !self.gate_open(i) {
                continue;
            }
            let (head, tail) = self.tanks.split_at_mut(i + 1);
            let (src, dst) = (&mut head[i], &mut tail[0]);

            // never take more than the destination can hold
            let wanted = self.rules.transfer_rate.min(dst.free_space());
            let removed = src.remove_clamped(wanted);
            let added = dst.add_clamped(removed);
            debug_assert!((removed - added).abs() < 1e-9);

            self.pipes[i].set_flowing(true);
            log::trace!("pipe {} moved {:.3} {} -> {}", i, added, src.label(), dst.label());
            outcome.transfers.push(Transfer {
                pipe: i,
                removed,
                added,
            });
        }

        self.ticks += 1;
        outcome
    }

    fn gate_open(&self, pair: usize) -> bool {
        let src = &self.tanks[pair];
        let dst = &self.tanks[pair + 1];
        if dst.is_full() {
            return false;
        }
        if pair == 0 {
            !src.is_empty()
        } else {
            src.fill_fraction() >= self.rules.downstream_threshold
        }
    }

    /// Runs every tick that fell due during `dt`. Does nothing while stopped.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        if !self.running {
            return 0;
        }
        let due = self.clock.advance(dt);
        for _ in 0..due {
            self.tick();
        }
        due
    }

    /// Toggles the simulation and returns the new running state.
    pub fn start_stop(&mut self) -> bool {
        self.running = !self.running;
        self.clock.reset();
        log::info!(
            "simulation {} at tick {}",
            if self.running { "started" } else { "stopped" },
            self.ticks
        );
        self.running
    }

    pub fn fill_tank(&mut self, index: usize) -> FlowResult<()> {
        let tank = self.tank_mut(index)?;
        tank.set_full();
        log::info!("{} filled to {:.1}", tank.label(), tank.quantity());
        Ok(())
    }

    pub fn empty_tank(&mut self, index: usize) -> FlowResult<()> {
        let tank = self.tank_mut(index)?;
        tank.set_empty();
        log::info!("{} emptied", tank.label());
        Ok(())
    }

    fn tank_mut(&mut self, index: usize) -> FlowResult<&mut Tank> {
        let count = self.tanks.len();
        self.tanks
            .get_mut(index)
            .ok_or(FlowError::TankOutOfRange { index, count })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ticks: self.ticks,
            running: self.running,
            tanks: self
                .tanks
                .iter()
                .map(|t| TankState {
                    label: t.label().to_string(),
                    quantity: t.quantity(),
                    capacity: t.capacity(),
                    fill_fraction: t.fill_fraction(),
                })
                .collect(),
            pipes: self
                .pipes
                .iter()
                .map(|p| PipeState {
                    source: p.source(),
                    destination: p.destination(),
                    flowing: p.is_flowing(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn chain(levels: [f64; 4]) -> FlowController {
        let tanks = levels
            .iter()
            .enumerate()
            .map(|(i, &q)| {
                Tank::new(format!("T{}", i + 1), 100.0, Rect::new(0.0, i as f32 * 200.0, 100.0, 140.0))
                    .unwrap()
                    .with_quantity(q)
                    .unwrap()
            })
            .collect();
        FlowController::new(tanks, FlowRules::default()).unwrap()
    }

    fn levels(c: &FlowController) -> Vec<f64> {
        c.tanks().iter().map(Tank::quantity).collect()
    }

    fn flowing(c: &FlowController) -> Vec<bool> {
        c.pipes().iter().map(Pipe::is_flowing).collect()
    }

    #[test]
    fn standard_layout() {
        let c = FlowController::standard().unwrap();
        assert_eq!(levels(&c), vec![100.0, 0.0, 0.0, 0.0]);
        assert_eq!(c.pipes().len(), 3);
        assert!(!c.is_running());
        assert_eq!(c.tanks()[3].label(), "T4");
    }

    #[test]
    fn head_tank_drains_first_tick() {
        let mut c = FlowController::standard().unwrap();
        c.tick();
        let q = levels(&c);
        assert_abs_diff_eq!(q[0], 99.2, epsilon = 1e-9);
        assert_abs_diff_eq!(q[1], 0.8, epsilon = 1e-9);
        assert_eq!(flowing(&c), vec![true, false, false]);
    }

    #[test]
    fn downstream_opens_at_threshold() {
        let mut c = chain([0.0, 30.0, 0.0, 0.0]);
        c.tick();
        let q = levels(&c);
        assert_abs_diff_eq!(q[1], 29.2, epsilon = 1e-9);
        assert_abs_diff_eq!(q[2], 0.8, epsilon = 1e-9);
        assert_eq!(flowing(&c), vec![false, true, false]);
    }

    #[test]
    fn downstream_stays_closed_below_threshold() {
        let mut c = chain([0.0, 29.9, 29.9, 0.0]);
        let outcome = c.tick();
        assert!(outcome.transfers.is_empty());
        assert_eq!(levels(&c), vec![0.0, 29.9, 29.9, 0.0]);
        assert_eq!(flowing(&c), vec![false, false, false]);
    }

    #[test]
    fn head_pair_ignores_threshold() {
        let mut c = chain([5.0, 0.0, 0.0, 0.0]);
        c.tick();
        assert!(c.pipes()[0].is_flowing());
        assert_abs_diff_eq!(c.tanks()[1].quantity(), 0.8, epsilon = 1e-9);
    }

    #[test]
    fn head_pair_stops_within_epsilon_of_empty() {
        let mut c = chain([0.05, 0.0, 0.0, 0.0]);
        c.tick();
        assert!(!c.pipes()[0].is_flowing());
        assert_eq!(c.tanks()[0].quantity(), 0.05);
    }

    #[test]
    fn transfer_into_nearly_full_tank_is_clamped_on_both_sides() {
        let mut c = chain([0.0, 0.0, 50.0, 99.5]);
        let outcome = c.tick();
        let q = levels(&c);
        assert_abs_diff_eq!(q[2], 49.5, epsilon = 1e-9);
        assert_abs_diff_eq!(q[3], 100.0, epsilon = 1e-9);
        assert_eq!(outcome.transfers.len(), 1);
        assert_abs_diff_eq!(outcome.transfers[0].removed, 0.5, epsilon = 1e-9);
        assert!(c.pipes()[2].is_flowing());

        // now full: the gate closes
        c.tick();
        assert!(!c.pipes()[2].is_flowing());
        assert_abs_diff_eq!(c.tanks()[2].quantity(), 49.5, epsilon = 1e-9);
    }

    #[test]
    fn liquid_crosses_several_pipes_in_one_tick() {
        let mut c = chain([100.0, 29.5, 0.0, 0.0]);
        c.tick();
        // T2 reaches 30.3 from the head pair, then forwards in the same tick
        assert_eq!(flowing(&c), vec![true, true, false]);
        assert_abs_diff_eq!(c.tanks()[1].quantity(), 29.5, epsilon = 1e-9);
        assert_abs_diff_eq!(c.tanks()[2].quantity(), 0.8, epsilon = 1e-9);
    }

    #[test]
    fn flags_are_recomputed_every_tick() {
        let mut c = chain([100.0, 0.0, 0.0, 0.0]);
        c.tick();
        assert!(c.pipes()[0].is_flowing());
        c.empty_tank(0).unwrap();
        c.tick();
        assert_eq!(flowing(&c), vec![false, false, false]);
    }

    #[test]
    fn every_transfer_conserves_liquid() {
        let mut c = FlowController::standard().unwrap();
        let start = c.total_quantity();
        for _ in 0..2_000 {
            for t in c.tick().transfers {
                assert_abs_diff_eq!(t.removed, t.added, epsilon = 1e-12);
            }
            for tank in c.tanks() {
                assert!(tank.quantity() >= 0.0);
                assert!(tank.quantity() <= tank.capacity());
            }
        }
        assert_abs_diff_eq!(c.total_quantity(), start, epsilon = 1e-6);
    }

    #[test]
    fn cascade_settles() {
        let mut c = FlowController::standard().unwrap();
        for _ in 0..5_000 {
            c.tick();
        }
        // nothing left that can move
        assert!(c.tick().transfers.is_empty());
        assert!(c.tanks()[0].is_empty());
        for t in &c.tanks()[1..3] {
            assert!(t.fill_fraction() < 0.3);
        }
    }

    #[test]
    fn manual_fill_affects_next_gate() {
        let mut c = chain([0.0, 0.0, 0.0, 0.0]);
        c.fill_tank(2).unwrap();
        assert_eq!(c.tanks()[2].quantity(), 100.0);
        c.tick();
        assert_eq!(flowing(&c), vec![false, false, true]);
        assert_abs_diff_eq!(c.tanks()[3].quantity(), 0.8, epsilon = 1e-9);
    }

    #[test]
    fn manual_commands_work_while_running() {
        let mut c = FlowController::standard().unwrap();
        c.start_stop();
        c.advance(Duration::from_millis(100));
        c.fill_tank(3).unwrap();
        c.empty_tank(0).unwrap();
        assert_eq!(c.tanks()[3].quantity(), 100.0);
        assert_eq!(c.tanks()[0].quantity(), 0.0);
    }

    #[test]
    fn bad_tank_index_is_reported() {
        let mut c = FlowController::standard().unwrap();
        assert_eq!(
            c.fill_tank(4),
            Err(FlowError::TankOutOfRange { index: 4, count: 4 })
        );
        assert!(c.empty_tank(usize::MAX).is_err());
        assert!(c.tank(9).is_err());
    }

    #[test]
    fn start_stop_toggles_without_touching_tanks() {
        let mut c = FlowController::standard().unwrap();
        let before = levels(&c);
        assert!(c.start_stop());
        assert!(!c.start_stop());
        assert!(!c.is_running());
        assert_eq!(levels(&c), before);
        assert_eq!(c.ticks(), 0);
    }

    #[test]
    fn advance_only_ticks_while_running() {
        let mut c = FlowController::standard().unwrap();
        assert_eq!(c.advance(Duration::from_millis(100)), 0);
        assert_eq!(c.ticks(), 0);

        c.start_stop();
        assert_eq!(c.advance(Duration::from_millis(100)), 5);
        assert_eq!(c.ticks(), 5);
        assert_abs_diff_eq!(c.tanks()[0].quantity(), 96.0, epsilon = 1e-9);

        c.start_stop();
        assert_eq!(c.advance(Duration::from_millis(100)), 0);
        assert_eq!(c.ticks(), 5);
    }

    #[test]
    fn restart_drops_partial_interval() {
        let mut c = FlowController::standard().unwrap();
        c.start_stop();
        c.advance(Duration::from_millis(15));
        c.start_stop();
        c.start_stop();
        assert_eq!(c.advance(Duration::from_millis(15)), 0);
    }

    #[test]
    fn rules_are_validated() {
        let tanks = || FlowController::standard().unwrap().tanks().to_vec();
        let bad_rate = FlowRules {
            transfer_rate: 0.0,
            ..FlowRules::default()
        };
        assert!(matches!(
            FlowController::new(tanks(), bad_rate),
            Err(FlowError::InvalidRules(_))
        ));
        let bad_threshold = FlowRules {
            downstream_threshold: 1.5,
            ..FlowRules::default()
        };
        assert!(FlowController::new(tanks(), bad_threshold).is_err());
        assert_eq!(
            FlowController::new(tanks()[..1].to_vec(), FlowRules::default()).err(),
            Some(FlowError::EmptyChain(1))
        );
    }

    #[test]
    fn snapshot_mirrors_state() {
        let mut c = FlowController::standard().unwrap();
        c.tick();
        let snap = c.snapshot();
        assert_eq!(snap.ticks, 1);
        assert!(!snap.running);
        assert_eq!(snap.tanks.len(), 4);
        assert_eq!(snap.tanks[0].label, "T1");
        assert_abs_diff_eq!(snap.tanks[1].fill_fraction, 0.008, epsilon = 1e-9);
        assert!(snap.pipes[0].flowing);
        assert_eq!((snap.pipes[2].source, snap.pipes[2].destination), (2, 3));
    }
}
