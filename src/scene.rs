//! Render-scene glue: integrates gesture signals into the per-display-frame
//! transforms a particle renderer consumes. Read-only with respect to the
//! signals; the burst offset and yaw accumulators live here because the
//! state machine has no notion of display time.

use crate::config::SceneTuning;
use crate::signals::GestureSignals;
use serde::Serialize;

/// One display frame's worth of transforms.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FrameTransforms {
    /// Spread plus the accumulated burst offset.
    pub effective_spread: f32,
    /// Radial displacement factor for the particle cloud; zero unpowered.
    pub displacement: f32,
    pub tree_yaw: f32,
    pub star_yaw: f32,
    pub star_y: f32,
    pub star_scale: f32,
    pub powered: bool,
}

#[derive(Debug, Default)]
pub struct SceneState {
    explosion_offset: f32,
    tree_yaw: f32,
    star_yaw: f32,
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one display frame. `dt` is the seconds since the previous
    /// call; signal staleness is fine, the values are smoothed upstream.
    pub fn advance(&mut self, sig: &GestureSignals, dt: f32, tn: &SceneTuning) -> FrameTransforms {
        if sig.exploded {
            self.explosion_offset += dt * tn.explode_rise;
        } else if self.explosion_offset > 0.0 {
            self.explosion_offset = (self.explosion_offset - dt * tn.explode_fall).max(0.0);
        }

        let effective = sig.spread + self.explosion_offset;

        // slow idle spin unpowered, wrist-reactive spin powered, frozen
        // while bursting
        if !sig.exploded {
            self.tree_yaw += if sig.power {
                tn.power_spin + sig.rotation * tn.rotation_gain
            } else {
                tn.base_spin
            };
        }
        self.star_yaw += tn.star_spin;

        FrameTransforms {
            effective_spread: effective,
            displacement: if sig.power { effective * tn.spread_scale } else { 0.0 },
            tree_yaw: self.tree_yaw,
            star_yaw: self.star_yaw,
            star_y: tn.star_base_y + effective * tn.star_lift,
            star_scale: 1.0 + effective * tn.star_scale_gain,
            powered: sig.power,
        }
    }
}
