use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Front-end preferences. Simulation rules are fixed and live in `FlowRules`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fps_cap: u32,
    pub enable_color: bool,
    pub report_interval_ms: u64,
    pub start_running: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 30,
            enable_color: true,
            report_interval_ms: 500,
            start_running: false,
        }
    }
}

impl Settings {
    pub fn frame_time(&self) -> Duration {
        let fps = self.fps_cap.clamp(10, 240);
        Duration::from_secs_f32(1.0 / fps as f32)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(50))
    }
}

pub struct Paths {
    pub settings_path: PathBuf,
    pub log_path: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "tankflow", "Tankflow")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating data directory {}", dir.display()))?;
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        log_path: dir.join("tankflow.log"),
    })
}

/// Falls back to defaults when the file is missing or unreadable.
pub fn load_settings(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(s) => match serde_json::from_str::<Settings>(&s) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("ignoring malformed settings {}: {e}", path.display());
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // rename over an existing file fails on Windows
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to).with_context(|| format!("replacing {}", to.display()))?;
    Ok(())
}
