/// Runtime configuration
///
/// Everything has a default; environment variables override:
/// - `LEAF_SCAN_CAMERA_DEVICE` - camera device passed to ffmpeg `-i`
/// - `LEAF_SCAN_CAMERA_FORMAT` - ffmpeg input format (v4l2, avfoundation, dshow)
/// - `LEAF_SCAN_FFMPEG` - ffmpeg binary
/// - `LEAF_SCAN_PREVIEW_WIDTH` / `LEAF_SCAN_PREVIEW_HEIGHT` - live preview size
/// - `LEAF_SCAN_CAMERA_TIMEOUT_MS` - how long to wait for the first frame
/// - `LEAF_SCAN_STUB_DELAY_MS` - simulated classification latency
use std::time::Duration;

/// Raster surface size used for captured frames (320x240, like a default HTML canvas)
pub const RASTER_WIDTH: u32 = 320;
pub const RASTER_HEIGHT: u32 = 240;

/// Default simulated inference latency
pub const DEFAULT_STUB_DELAY: Duration = Duration::from_millis(2000);

/// Camera settings
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub ffmpeg: String,
    pub input_format: String,
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub ready_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let (input_format, device) = platform_camera();
        Self {
            ffmpeg: "ffmpeg".to_string(),
            input_format: input_format.to_string(),
            device: device.to_string(),
            width: 640,
            height: 480,
            ready_timeout: Duration::from_millis(5000),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub camera: CameraConfig,
    pub raster_width: u32,
    pub raster_height: u32,
    pub stub_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            raster_width: RASTER_WIDTH,
            raster_height: RASTER_HEIGHT,
            stub_delay: DEFAULT_STUB_DELAY,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup (used by tests)
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse_u32 = |key: &str, fallback: u32| {
            lookup(key)
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(fallback)
        };
        let parse_ms = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        let camera = CameraConfig {
            ffmpeg: lookup("LEAF_SCAN_FFMPEG").unwrap_or(defaults.camera.ffmpeg),
            input_format: lookup("LEAF_SCAN_CAMERA_FORMAT")
                .unwrap_or(defaults.camera.input_format),
            device: lookup("LEAF_SCAN_CAMERA_DEVICE").unwrap_or(defaults.camera.device),
            width: parse_u32("LEAF_SCAN_PREVIEW_WIDTH", defaults.camera.width),
            height: parse_u32("LEAF_SCAN_PREVIEW_HEIGHT", defaults.camera.height),
            ready_timeout: parse_ms("LEAF_SCAN_CAMERA_TIMEOUT_MS", defaults.camera.ready_timeout),
        };

        Self {
            camera,
            raster_width: defaults.raster_width,
            raster_height: defaults.raster_height,
            stub_delay: parse_ms("LEAF_SCAN_STUB_DELAY_MS", defaults.stub_delay),
        }
    }
}

/// ffmpeg input format and default device for the current OS
fn platform_camera() -> (&'static str, &'static str) {
    if cfg!(target_os = "macos") {
        ("avfoundation", "0")
    } else if cfg!(target_os = "windows") {
        ("dshow", "video=Integrated Camera")
    } else {
        ("v4l2", "/dev/video0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.stub_delay, Duration::from_millis(2000));
        assert_eq!((config.raster_width, config.raster_height), (320, 240));
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let env: HashMap<&str, &str> = [
            ("LEAF_SCAN_CAMERA_DEVICE", "/dev/video2"),
            ("LEAF_SCAN_STUB_DELAY_MS", "50"),
            ("LEAF_SCAN_PREVIEW_WIDTH", "0"),
            ("LEAF_SCAN_PREVIEW_HEIGHT", "tall"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.camera.device, "/dev/video2");
        assert_eq!(config.stub_delay, Duration::from_millis(50));
        // Invalid sizes fall back to defaults
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
    }
}
