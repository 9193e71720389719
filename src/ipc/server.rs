use anyhow::Result;
use log::{error, info, warn};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::{Arc, Mutex, mpsc},
    thread,
    time::{Duration, Instant},
};

use notify::{RecursiveMode, Watcher};
use signal_hook::{consts::{SIGINT, SIGTERM}, iterator::Signals};

use super::pipeline::run_pipeline;
use super::runtime::socket_path;
use crate::config::{DaemonConfigState, Profile};
use crate::scene::SceneState;
use crate::signals::GestureSignals;
use crate::wishes::WishDesk;

enum IpcMsg {
    Reload,
    UseProfile(String),
    Shutdown,
}

/// Everything a client handler needs, shared across threads.
#[derive(Clone)]
struct Shared {
    cfg: Arc<Mutex<DaemonConfigState>>,
    profile: Arc<Mutex<Profile>>,
    signals: Arc<Mutex<GestureSignals>>,
    desk: Arc<Mutex<WishDesk>>,
    scene: Arc<Mutex<SceneRoll>>,
    tx_req: mpsc::Sender<IpcMsg>,
}

/// Scene integration state for the polling renderer.
struct SceneRoll {
    scene: SceneState,
    last: Instant,
}

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let cfg = DaemonConfigState::load_or_install_default()?;
    info!("daemon: active profile '{}'", cfg.active_name);
    let profiles_dir = cfg.profiles_dir.clone();

    let profile = Arc::new(Mutex::new(cfg.profile.clone()));
    let cfg = Arc::new(Mutex::new(cfg));
    let signals = Arc::new(Mutex::new(GestureSignals::new()));
    let desk = Arc::new(Mutex::new(WishDesk::default()));
    let scene = Arc::new(Mutex::new(SceneRoll {
        scene: SceneState::new(),
        last: Instant::now(),
    }));

    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();

    // frame pipeline
    {
        let profile = profile.clone();
        let signals = signals.clone();
        thread::spawn(move || {
            if let Err(e) = run_pipeline(profile, signals) {
                error!("frame pipeline failed: {e}");
            }
        });
    }

    // clean shutdown on SIGINT/SIGTERM
    {
        let tx = tx_req.clone();
        let mut sigs = Signals::new([SIGINT, SIGTERM])?;
        thread::spawn(move || {
            if sigs.forever().next().is_some() {
                let _ = tx.send(IpcMsg::Shutdown);
            }
        });
    }

    // hot-reload on profile edits; watcher must outlive the loop
    let _watcher = {
        let tx = tx_req.clone();
        match notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_modify() || event.kind.is_create() {
                    let _ = tx.send(IpcMsg::Reload);
                }
            }
        }) {
            Ok(mut w) => match w.watch(&profiles_dir, RecursiveMode::NonRecursive) {
                Ok(()) => Some(w),
                Err(e) => {
                    warn!("profile watch unavailable: {e}");
                    None
                }
            },
            Err(e) => {
                warn!("profile watch unavailable: {e}");
                None
            }
        }
    };

    let shared = Shared {
        cfg,
        profile,
        signals,
        desk,
        scene,
        tx_req: tx_req.clone(),
    };

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _addr)) = listener.accept() {
            let sh = shared.clone();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, sh) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => {
                    let mut cfg = shared.cfg.lock().unwrap();
                    match cfg.reload() {
                        Ok(()) => {
                            *shared.profile.lock().unwrap() = cfg.profile.clone();
                            info!("profile reloaded");
                        }
                        Err(e) => error!("reload failed, keeping last good profile: {e}"),
                    }
                }
                IpcMsg::UseProfile(name) => {
                    let mut cfg = shared.cfg.lock().unwrap();
                    match cfg.set_active(&name) {
                        Ok(()) => {
                            *shared.profile.lock().unwrap() = cfg.profile.clone();
                            info!("switched active profile to {}", cfg.active_name);
                        }
                        Err(e) => error!("use profile failed: {e}"),
                    }
                }
                IpcMsg::Shutdown => {
                    info!("daemon: shutting down");
                    let _ = std::fs::remove_file(&sock);
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn handle_client(mut stream: UnixStream, sh: Shared) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => {
            let sig = sh.signals.lock().unwrap().clone();
            let cfg = sh.cfg.lock().unwrap();
            let desk = sh.desk.lock().unwrap();
            serde_json::json!({"ok": true, "data": {
                "phase": sig.phase().as_str(),
                "power": sig.power,
                "spread_pct": (sig.spread * 100.0).round() as u32,
                "rotation": sig.rotation,
                "exploded": sig.exploded,
                "active_profile": cfg.active_name,
                "socket": socket_path(),
                "helper": cfg.profile.source.command,
                "wish_status": desk.status().as_str(),
                "current_wish": desk.current().map(|w| w.title.clone()),
            }})
        }

        // one display frame of transforms for a polling renderer
        "scene" => {
            let sig = sh.signals.lock().unwrap().clone();
            let tuning = { sh.profile.lock().unwrap().scene.clone() };
            let mut roll = sh.scene.lock().unwrap();
            let dt = roll.last.elapsed().as_secs_f32().min(0.1);
            roll.last = Instant::now();
            let t = roll.scene.advance(&sig, dt, &tuning);
            serde_json::json!({"ok": true, "data": t})
        }

        "reload" => {
            let _ = sh.tx_req.send(IpcMsg::Reload);
            let active = sh.cfg.lock().unwrap().active_name.clone();
            serde_json::json!({"ok": true, "data": {"active_profile": active}})
        }

        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            let _ = sh.tx_req.send(IpcMsg::UseProfile(name.to_string()));
            serde_json::json!({"ok": true, "data": {"active_profile": name}})
        }

        "list" => {
            let cfg = sh.cfg.lock().unwrap();
            serde_json::json!({"ok": true, "data": {
                "profiles": cfg.list_profiles(),
                "active": cfg.active_name,
            }})
        }

        "doctor" => {
            let report = sh.cfg.lock().unwrap().doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }

        "wish" | "dismiss" | "send" => {
            let wishes_cfg = { sh.cfg.lock().unwrap().profile.wishes.clone() };
            super::dispatch::dispatch_wish_op(op, &req, &sh.desk, &wishes_cfg)
        }

        "shutdown" => {
            let _ = sh.tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }

        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    write!(stream, "{}\n", resp)?;
    Ok(())
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow::anyhow!(
            "treectl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
