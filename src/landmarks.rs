//! Hand landmark wire format and per-frame sample extraction.

use serde::Deserialize;

/// Landmark indices per the MediaPipe hand convention (21 points per hand).
pub const LANDMARK_COUNT: usize = 21;
pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;

/// A single labeled point in normalized camera space. `z` is relative depth
/// (negative toward the camera), zero when the helper omits it.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// One NDJSON record from the tracking helper. `hands` is empty when no hand
/// is visible in the frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandFrame {
    #[serde(default)]
    pub timestamp_ms: u64,
    #[serde(default)]
    pub hands: Vec<Hand>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hand {
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

/// Per-frame digest consumed by the gesture state machine.
#[derive(Debug, Clone, Copy)]
pub struct HandSample {
    /// Horizontal wrist position, 0..1.
    pub wrist_x: f32,
    /// Depth of the index fingertip (wrist depth when unavailable).
    pub z: f32,
    /// Index-tip to thumb-tip distance in the image plane.
    pub openness: f32,
}

impl HandFrame {
    /// Digest the first hand (single-hand limit upstream). Returns `None`
    /// when no hand is present or the landmark list is incomplete.
    pub fn sample(&self) -> Option<HandSample> {
        let lm = &self.hands.first()?.landmarks;
        if lm.len() < LANDMARK_COUNT {
            return None;
        }
        let wrist = lm[WRIST];
        let index = lm[INDEX_TIP];
        let thumb = lm[THUMB_TIP];
        let openness = (index.x - thumb.x).hypot(index.y - thumb.y);
        let z = if index.z.is_finite() { index.z } else { wrist.z };
        Some(HandSample {
            wrist_x: wrist.x,
            z,
            openness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(wrist: Landmark, thumb: Landmark, index: Landmark) -> HandFrame {
        let mut lm = vec![Landmark::default(); LANDMARK_COUNT];
        lm[WRIST] = wrist;
        lm[THUMB_TIP] = thumb;
        lm[INDEX_TIP] = index;
        HandFrame {
            timestamp_ms: 0,
            hands: vec![Hand { landmarks: lm }],
        }
    }

    #[test]
    fn openness_is_planar_tip_distance() {
        let f = frame_with(
            Landmark { x: 0.5, y: 0.5, z: -0.02 },
            Landmark { x: 0.3, y: 0.4, z: 0.0 },
            Landmark { x: 0.6, y: 0.8, z: -0.2 },
        );
        let s = f.sample().unwrap();
        assert!((s.openness - (0.3f32.hypot(0.4))).abs() < 1e-6);
        assert_eq!(s.wrist_x, 0.5);
        assert_eq!(s.z, -0.2);
    }

    #[test]
    fn depth_falls_back_to_wrist() {
        let f = frame_with(
            Landmark { x: 0.5, y: 0.5, z: -0.07 },
            Landmark { x: 0.3, y: 0.4, z: 0.0 },
            Landmark { x: 0.6, y: 0.8, z: f32::NAN },
        );
        assert_eq!(f.sample().unwrap().z, -0.07);
    }

    #[test]
    fn incomplete_hand_yields_nothing() {
        let f = HandFrame {
            timestamp_ms: 0,
            hands: vec![Hand { landmarks: vec![Landmark::default(); 5] }],
        };
        assert!(f.sample().is_none());
        assert!(HandFrame::default().sample().is_none());
    }

    #[test]
    fn wire_format_parses() {
        let line = r#"{"timestamp_ms": 42, "hands": [{"landmarks": [{"x": 0.1, "y": 0.2, "z": -0.05}]}]}"#;
        let f: HandFrame = serde_json::from_str(line).unwrap();
        assert_eq!(f.timestamp_ms, 42);
        assert_eq!(f.hands.len(), 1);
        // z may be omitted on 2D-only helpers
        let line2d = r#"{"hands": [{"landmarks": [{"x": 0.1, "y": 0.2}]}]}"#;
        let f: HandFrame = serde_json::from_str(line2d).unwrap();
        assert_eq!(f.hands[0].landmarks[0].z, 0.0);
    }
}
