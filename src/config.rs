// config.rs - viewer configuration
//
// Sources, later ones win:
// - defaults
// - JSON file: --config <path>, else VIDEO360_CONFIG, else
//   <exe_dir>/assets/video360.json, else ./assets/video360.json
// - CLI: --source <string>, --format <mono|lr|tb>, --stereo-preview

use crate::error::{ConfigError, MeshError};
use crate::mesh::{build_uv_sphere, MediaFormat, SphereMesh};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "VIDEO360_CONFIG";
const CONFIG_FILE: &str = "video360.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SphereConfig {
    pub radius: f32,
    pub latitudes: u32,
    pub longitudes: u32,
    pub vertical_fov: f32,
    pub horizontal_fov: f32,
    pub format: MediaFormat,
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self {
            radius: 50.0,
            latitudes: 50,
            longitudes: 50,
            vertical_fov: 180.0,
            horizontal_fov: 360.0,
            format: MediaFormat::Monoscopic,
        }
    }
}

impl SphereConfig {
    pub fn build(&self) -> Result<SphereMesh, MeshError> {
        build_uv_sphere(
            self.radius,
            self.latitudes,
            self.longitudes,
            self.vertical_fov,
            self.horizontal_fov,
            self.format,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub source: Option<String>,
    pub sphere: SphereConfig,
    /// Draw both eyes side by side instead of a single monoscopic view.
    pub stereo_preview: bool,
    pub vsync: bool,
    pub window: WindowConfig,
    /// env_logger filter, e.g. "info" or "video360=debug,wgpu=warn".
    pub log_filter: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            source: None,
            sphere: SphereConfig::default(),
            stereo_preview: false,
            vsync: true,
            window: WindowConfig::default(),
            log_filter: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text, path)
    }

    /// Loads the config file (if any) and applies CLI overrides.
    ///
    /// An explicitly named file that fails to load is an error; a missing
    /// default file just means defaults.
    pub fn load(args: &[String]) -> Result<Self, ConfigError> {
        let mut config = match explicit_config_path(args) {
            Some(path) => Self::load_file(&path)?,
            None => match find_config_file() {
                Some(path) => Self::load_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_args(args)?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        let mut it = args.iter();
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--source" => {
                    if let Some(v) = it.next() {
                        self.source = Some(v.clone());
                    }
                }
                "--format" => {
                    if let Some(v) = it.next() {
                        self.sphere.format = MediaFormat::parse(v)
                            .ok_or_else(|| ConfigError::UnknownFormat(v.clone()))?;
                    }
                }
                "--stereo-preview" => self.stereo_preview = true,
                _ => {}
            }
        }
        Ok(())
    }
}

fn explicit_config_path(args: &[String]) -> Option<PathBuf> {
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        if arg == "--config" {
            if let Some(v) = it.next() {
                return Some(PathBuf::from(v));
            }
        }
    }

    match std::env::var(CONFIG_ENV) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v)),
        _ => None,
    }
}

/// Find assets/video360.json by searching:
/// 1) <exe_dir>/assets/video360.json
/// 2) ./assets/video360.json
fn find_config_file() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("assets").join(CONFIG_FILE);
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("assets").join(CONFIG_FILE);
    if p.exists() {
        return Some(p);
    }

    None
}
