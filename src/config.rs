use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::PathBuf,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub name: Option<String>,
}

/// Gesture tuning. The depth thresholds are empirical and sensor-dependent,
/// hence profile values rather than constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub open_dist: f32,
    pub push_z: f32,
    pub release_z: f32,
    pub idle_grace_ms: u64,
    pub spread_smooth: f32,
    pub spread_decay: f32,
    pub spread_gain: f32,
    pub spread_bias: f32,
    pub explode_hold_frames: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            open_dist: 0.12,
            push_z: -0.25,
            release_z: -0.1,
            idle_grace_ms: 800,
            spread_smooth: 0.15,
            spread_decay: 0.85,
            spread_gain: 3.0,
            spread_bias: 0.05,
            explode_hold_frames: 10,
        }
    }
}

/// Per-display-frame integration constants for the renderer-facing scene.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneTuning {
    pub explode_rise: f32,
    pub explode_fall: f32,
    pub spread_scale: f32,
    pub base_spin: f32,
    pub power_spin: f32,
    pub rotation_gain: f32,
    pub star_spin: f32,
    pub star_base_y: f32,
    pub star_lift: f32,
    pub star_scale_gain: f32,
}

impl Default for SceneTuning {
    fn default() -> Self {
        Self {
            explode_rise: 2.5,
            explode_fall: 4.0,
            spread_scale: 12.0,
            base_spin: 0.002,
            power_spin: 0.005,
            rotation_gain: 0.05,
            star_spin: 0.02,
            star_base_y: 4.2,
            star_lift: 6.0,
            star_scale_gain: 2.5,
        }
    }
}

/// Hand-tracking helper process and the camera/tracking options forwarded
/// to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub command: String,
    pub args: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub max_hands: u32,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            command: "treectl-hands".to_string(),
            args: vec![],
            width: 640,
            height: 480,
            max_hands: 1,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WishConfig {
    pub model: String,
    pub endpoint: String,
}

impl Default for WishConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-flash-preview".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub meta: Meta,
    pub thresholds: Thresholds,
    pub scene: SceneTuning,
    pub source: SourceConfig,
    pub wishes: WishConfig,
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new().unwrap().home_dir().to_path_buf();
    home.join(".config").join("treectl")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Reload the active profile; keeps the last good one on error.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let profile: Profile =
            toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let cmd = &self.profile.source.command;
        serde_json::json!({
            "helper_command": cmd,
            "helper_on_path": crate::source::helper_on_path(cmd),
            "api_key_present": std::env::var_os(crate::wishes::API_KEY_ENV).is_some(),
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "hints": {
                "helper": "install a hand-tracking helper that prints NDJSON frames and put it on PATH",
                "api_key": format!("export {}=<key> to enable the wish feature", crate::wishes::API_KEY_ENV),
            }
        })
    }
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if th.idle_grace_ms == 0 {
        return Err(anyhow!("thresholds.idle_grace_ms must be positive"));
    }
    if !(0.0..1.0).contains(&th.open_dist) || th.open_dist == 0.0 {
        return Err(anyhow!(
            "thresholds.open_dist must be in (0,1) normalized units"
        ));
    }
    if !(0.0..1.0).contains(&th.spread_smooth) || th.spread_smooth == 0.0 {
        return Err(anyhow!("thresholds.spread_smooth must be in (0,1)"));
    }
    if !(0.0..1.0).contains(&th.spread_decay) || th.spread_decay == 0.0 {
        return Err(anyhow!("thresholds.spread_decay must be in (0,1)"));
    }
    if th.push_z >= th.release_z {
        return Err(anyhow!(
            "thresholds.push_z must lie below thresholds.release_z"
        ));
    }
    if th.explode_hold_frames == 0 {
        return Err(anyhow!("thresholds.explode_hold_frames must be at least 1"));
    }

    let src = &p.source;
    if src.command.trim().is_empty() {
        return Err(anyhow!("source.command must not be empty"));
    }
    if src.max_hands == 0 {
        return Err(anyhow!("source.max_hands must be at least 1"));
    }
    for (name, v) in [
        ("min_detection_confidence", src.min_detection_confidence),
        ("min_tracking_confidence", src.min_tracking_confidence),
    ] {
        if !(0.0..=1.0).contains(&v) {
            return Err(anyhow!("source.{name} must be in [0,1]"));
        }
    }

    if p.wishes.model.trim().is_empty() || p.wishes.endpoint.trim().is_empty() {
        return Err(anyhow!("wishes.model and wishes.endpoint must not be empty"));
    }
    Ok(())
}
