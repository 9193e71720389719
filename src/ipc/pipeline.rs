//! The frame pipeline: helper process → landmark samples → gesture signals.
//!
//! Runs on its own thread for the life of the daemon. Helper trouble is never
//! fatal: the signals see no-hand frames, the grace window powers the scene
//! down, and the helper is respawned after a backoff.

use anyhow::Result;
use log::{info, warn};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Profile;
use crate::signals::{GestureSignals, Phase};
use crate::source::HelperSource;

const RESPAWN_BACKOFF: Duration = Duration::from_secs(1);

pub fn run_pipeline(
    profile: Arc<Mutex<Profile>>,
    signals: Arc<Mutex<GestureSignals>>,
) -> Result<()> {
    let started = Instant::now();
    let mut last_phase = Phase::Standby;

    loop {
        let src_cfg = { profile.lock().unwrap().source.clone() };
        let mut source = match HelperSource::spawn(&src_cfg) {
            Ok(s) => {
                info!("tracking helper '{}' started", src_cfg.command);
                s
            }
            Err(e) => {
                warn!("tracking helper unavailable: {e}");
                // grace window still elapses while the camera is dark
                tick_absent(&profile, &signals, &started, &mut last_phase);
                thread::sleep(RESPAWN_BACKOFF);
                continue;
            }
        };

        while let Some(frame) = source.next_frame() {
            let th = { profile.lock().unwrap().thresholds.clone() };
            let sample = frame.sample();
            let now_ms = started.elapsed().as_millis() as u64;

            let phase = {
                let mut sig = signals.lock().unwrap();
                sig.on_sample(sample.as_ref(), now_ms, &th);
                sig.phase()
            };
            if phase != last_phase {
                info!("phase: {} -> {}", last_phase.as_str(), phase.as_str());
                last_phase = phase;
            }
        }

        warn!("tracking helper exited; respawning");
        tick_absent(&profile, &signals, &started, &mut last_phase);
        thread::sleep(RESPAWN_BACKOFF);
    }
}

fn tick_absent(
    profile: &Arc<Mutex<Profile>>,
    signals: &Arc<Mutex<GestureSignals>>,
    started: &Instant,
    last_phase: &mut Phase,
) {
    let th = { profile.lock().unwrap().thresholds.clone() };
    let now_ms = started.elapsed().as_millis() as u64;
    let phase = {
        let mut sig = signals.lock().unwrap();
        sig.on_sample(None, now_ms, &th);
        sig.phase()
    };
    if phase != *last_phase {
        info!("phase: {} -> {}", last_phase.as_str(), phase.as_str());
        *last_phase = phase;
    }
}
