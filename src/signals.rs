//! The gesture state machine: noisy per-frame hand samples in, stable
//! control signals out.
//!
//! Hysteresis everywhere: the idle grace window debounces tracking dropouts,
//! the spread is low-pass filtered against depth jitter, and the burst latch
//! requires a sustained push streak so a single spiky frame cannot trigger it.

use crate::config::Thresholds;
use crate::landmarks::HandSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Standby,
    Active,
    Burst,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Standby => "STANDBY",
            Phase::Active => "ACTIVE",
            Phase::Burst => "BURST",
        }
    }
}

/// Control signals for the renderer and UI shell. Mutated only by the frame
/// pipeline; everyone else reads snapshots.
#[derive(Debug, Clone)]
pub struct GestureSignals {
    /// Hand continuously visible within the grace window.
    pub power: bool,
    /// Smoothed expansion amount, always in [0,1].
    pub spread: f32,
    /// Signed wrist-driven value, roughly [-1,1]; frozen while bursting.
    pub rotation: f32,
    /// Latched burst mode; only set with `spread` saturated at 1.
    pub exploded: bool,
    explode_streak: u32,
    idle_deadline_ms: Option<u64>,
}

impl Default for GestureSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureSignals {
    pub fn new() -> Self {
        Self {
            power: false,
            spread: 0.0,
            rotation: 0.0,
            exploded: false,
            explode_streak: 0,
            idle_deadline_ms: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if !self.power {
            Phase::Standby
        } else if self.exploded {
            Phase::Burst
        } else {
            Phase::Active
        }
    }

    /// Advance the state machine by one processed frame. `sample` is `None`
    /// for a frame without a visible hand (including swallowed tracking
    /// errors); `now_ms` is the pipeline's monotonic clock.
    pub fn on_sample(&mut self, sample: Option<&HandSample>, now_ms: u64, th: &Thresholds) {
        let Some(s) = sample else {
            self.on_absent(now_ms, th);
            return;
        };

        self.idle_deadline_ms = None;
        self.power = true;

        // Rotation decisions use the burst state as it was when the frame
        // arrived: it still tracks on the latch frame and stays frozen
        // through the release frame.
        let was_exploded = self.exploded;
        let open = s.openness > th.open_dist;

        if open {
            if self.exploded {
                // pull-back reverses the burst; otherwise hold everything
                if s.z > th.release_z {
                    self.exploded = false;
                }
            } else {
                let target = ((-s.z - th.spread_bias) * th.spread_gain).clamp(0.0, 1.0);
                self.spread += (target - self.spread) * th.spread_smooth;
                if s.z < th.push_z {
                    self.explode_streak += 1;
                    if self.explode_streak > th.explode_hold_frames {
                        self.exploded = true;
                        self.spread = 1.0;
                        self.explode_streak = 0;
                    }
                } else {
                    self.explode_streak = 0;
                }
            }
        } else {
            self.spread *= th.spread_decay;
            self.exploded = false;
            self.explode_streak = 0;
        }

        if !was_exploded {
            self.rotation = (s.wrist_x - 0.5) * 2.0;
        }
    }

    /// No hand this frame. Arm the grace deadline once; fire it once it
    /// elapses. Firing when already dormant changes nothing.
    fn on_absent(&mut self, now_ms: u64, th: &Thresholds) {
        match self.idle_deadline_ms {
            None => self.idle_deadline_ms = Some(now_ms + th.idle_grace_ms),
            Some(deadline) if now_ms >= deadline => {
                self.power = false;
                self.spread = 0.0;
                self.exploded = false;
                self.explode_streak = 0;
                self.idle_deadline_ms = None;
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: u64 = 33;

    fn th() -> Thresholds {
        Thresholds::default()
    }

    fn open_at(z: f32) -> HandSample {
        HandSample { wrist_x: 0.5, z, openness: 0.3 }
    }

    fn open_with_wrist(z: f32, wrist_x: f32) -> HandSample {
        HandSample { wrist_x, z, openness: 0.3 }
    }

    fn closed() -> HandSample {
        HandSample { wrist_x: 0.5, z: -0.1, openness: 0.05 }
    }

    #[test]
    fn grace_window_powers_down_once_at_deadline() {
        let mut sig = GestureSignals::new();
        sig.on_sample(Some(&open_at(-0.2)), 0, &th());
        assert!(sig.power);

        let mut power_drops = 0u32;
        let mut drop_time = 0u64;
        let mut last_power = sig.power;
        for i in 1..60u64 {
            let t = i * FRAME_MS;
            sig.on_sample(None, t, &th());
            if last_power && !sig.power {
                power_drops += 1;
                drop_time = t;
            }
            last_power = sig.power;
        }

        assert_eq!(power_drops, 1);
        // deadline armed at t=33, so the drop lands on the first frame >= 833
        assert!(drop_time >= FRAME_MS + 800);
        assert!(drop_time < FRAME_MS + 800 + FRAME_MS);
        assert_eq!(sig.spread, 0.0);
        assert!(!sig.exploded);
        assert_eq!(sig.phase(), Phase::Standby);
    }

    #[test]
    fn grace_window_not_rescheduled_by_later_absent_frames() {
        let mut sig = GestureSignals::new();
        sig.on_sample(Some(&open_at(-0.2)), 0, &th());

        // absent frames at 100ms intervals: armed at t=100, must fire at
        // t=900 even though later frames kept arriving while pending
        for t in [100u64, 300, 500, 700] {
            sig.on_sample(None, t, &th());
            assert!(sig.power, "still within grace at t={t}");
        }
        sig.on_sample(None, 900, &th());
        assert!(!sig.power);
    }

    #[test]
    fn hand_reappearing_cancels_grace() {
        let mut sig = GestureSignals::new();
        sig.on_sample(Some(&open_at(-0.2)), 0, &th());
        sig.on_sample(None, 100, &th()); // deadline at 900
        sig.on_sample(Some(&open_at(-0.2)), 700, &th());
        // new absence arms a fresh window; the old deadline is gone
        sig.on_sample(None, 950, &th()); // deadline at 1750
        assert!(sig.power);
        sig.on_sample(None, 1700, &th());
        assert!(sig.power);
        sig.on_sample(None, 1760, &th());
        assert!(!sig.power);
    }

    #[test]
    fn dormant_state_is_idempotent_under_absence() {
        let mut sig = GestureSignals::new();
        for i in 0..100u64 {
            sig.on_sample(None, i * FRAME_MS, &th());
        }
        assert!(!sig.power);
        assert_eq!(sig.spread, 0.0);
        assert_eq!(sig.rotation, 0.0);
        assert!(!sig.exploded);
    }

    #[test]
    fn burst_latches_on_eleventh_push_frame() {
        let mut sig = GestureSignals::new();
        for i in 1..=10u64 {
            sig.on_sample(Some(&open_at(-0.3)), i * FRAME_MS, &th());
            assert!(!sig.exploded, "latched too early on frame {i}");
        }
        sig.on_sample(Some(&open_at(-0.3)), 11 * FRAME_MS, &th());
        assert!(sig.exploded);
        assert_eq!(sig.spread, 1.0);
        assert_eq!(sig.phase(), Phase::Burst);
    }

    #[test]
    fn push_streak_resets_on_non_qualifying_frame() {
        let mut sig = GestureSignals::new();
        let mut t = 0u64;
        let mut step = |sig: &mut GestureSignals, z: f32| {
            t += FRAME_MS;
            sig.on_sample(Some(&open_at(z)), t, &th());
        };
        for _ in 0..10 {
            step(&mut sig, -0.3);
        }
        step(&mut sig, -0.2); // breaks the streak
        for _ in 0..10 {
            step(&mut sig, -0.3);
            assert!(!sig.exploded);
        }
        step(&mut sig, -0.3); // 11th of the new streak
        assert!(sig.exploded);
    }

    #[test]
    fn rotation_tracks_on_latch_frame_then_freezes() {
        let mut sig = GestureSignals::new();
        for i in 1..=10u64 {
            sig.on_sample(Some(&open_with_wrist(-0.3, 0.5)), i * FRAME_MS, &th());
        }
        sig.on_sample(Some(&open_with_wrist(-0.3, 0.8)), 11 * FRAME_MS, &th());
        assert!(sig.exploded);
        let frozen = sig.rotation;
        assert!((frozen - 0.6).abs() < 1e-6);

        // wrist moves all over; rotation must not budge while bursting
        for (i, wx) in [0.1f32, 0.9, 0.0, 1.0].iter().enumerate() {
            sig.on_sample(
                Some(&open_with_wrist(-0.3, *wx)),
                (12 + i as u64) * FRAME_MS,
                &th(),
            );
            assert!(sig.exploded);
            assert_eq!(sig.rotation, frozen);
        }
    }

    #[test]
    fn pull_back_reverses_burst_on_that_frame() {
        let mut sig = GestureSignals::new();
        for i in 1..=11u64 {
            sig.on_sample(Some(&open_at(-0.3)), i * FRAME_MS, &th());
        }
        assert!(sig.exploded);
        let frozen = sig.rotation;

        sig.on_sample(Some(&open_with_wrist(0.0, 0.9)), 12 * FRAME_MS, &th());
        assert!(!sig.exploded);
        // release frame still uses the pre-frame burst state for rotation
        assert_eq!(sig.rotation, frozen);
        assert_eq!(sig.phase(), Phase::Active);

        // next frame rotation tracks again
        sig.on_sample(Some(&open_with_wrist(-0.15, 0.9)), 13 * FRAME_MS, &th());
        assert!((sig.rotation - 0.8).abs() < 1e-6);
    }

    #[test]
    fn held_burst_leaves_signals_untouched() {
        let mut sig = GestureSignals::new();
        for i in 1..=11u64 {
            sig.on_sample(Some(&open_at(-0.3)), i * FRAME_MS, &th());
        }
        let before = sig.clone();
        // deep push while bursting: below release_z, so everything holds
        sig.on_sample(Some(&open_at(-0.3)), 12 * FRAME_MS, &th());
        assert_eq!(sig.spread, before.spread);
        assert_eq!(sig.rotation, before.rotation);
        assert!(sig.exploded);
    }

    #[test]
    fn closed_hand_decays_spread_geometrically() {
        let mut sig = GestureSignals::new();
        sig.on_sample(Some(&open_at(-0.2)), 0, &th());
        sig.spread = 1.0;

        let expected = [0.85f32, 0.7225, 0.614125, 0.52200625, 0.4437053];
        for (i, e) in expected.iter().enumerate() {
            sig.on_sample(Some(&closed()), (i as u64 + 1) * FRAME_MS, &th());
            assert!(
                (sig.spread - e).abs() < 1e-4,
                "frame {i}: got {}, want {e}",
                sig.spread
            );
        }
        assert!(!sig.exploded);
    }

    #[test]
    fn closed_hand_clears_burst_and_streak() {
        let mut sig = GestureSignals::new();
        for i in 1..=11u64 {
            sig.on_sample(Some(&open_at(-0.3)), i * FRAME_MS, &th());
        }
        assert!(sig.exploded);
        sig.on_sample(Some(&closed()), 12 * FRAME_MS, &th());
        assert!(!sig.exploded);
        assert!(sig.spread < 1.0);
    }

    #[test]
    fn spread_smooths_toward_clamped_target() {
        let mut sig = GestureSignals::new();
        // target = (0.15 - 0.05) * 3 = 0.3; one smoothing step from 0
        sig.on_sample(Some(&open_at(-0.15)), 0, &th());
        assert!((sig.spread - 0.045).abs() < 1e-6);

        // extreme depth clamps the target at 1, spread stays in range
        let mut sig = GestureSignals::new();
        for i in 0..500u64 {
            sig.on_sample(Some(&open_at(-0.24)), i * FRAME_MS, &th());
            assert!((0.0..=1.0).contains(&sig.spread));
        }
        // z = -0.24 never qualifies for the push streak
        assert!(!sig.exploded);
    }
}
