/// ffmpeg-backed camera
///
/// Spawns `ffmpeg` reading the platform camera device and writing raw RGBA
/// frames to stdout. A reader thread keeps only the most recent frame; the UI
/// polls it for the live preview and the capture button snapshots it.
use async_trait::async_trait;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{CameraSource, CameraStream, Frame};
use crate::config::CameraConfig;
use crate::error::{PanelError, Result};

/// Camera source that shells out to ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegCamera {
    config: CameraConfig,
}

impl FfmpegCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    /// Full ffmpeg argument list for the configured device
    fn args(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            c.input_format.clone(),
            "-framerate".into(),
            "30".into(),
            "-i".into(),
            c.device.clone(),
            "-an".into(),
            "-vf".into(),
            format!("scale={}:{}", c.width, c.height),
            "-pix_fmt".into(),
            "rgba".into(),
            "-f".into(),
            "rawvideo".into(),
            "-".into(),
        ]
    }
}

#[async_trait]
impl CameraSource for FfmpegCamera {
    async fn open(&self) -> Result<Box<dyn CameraStream>> {
        info!(
            "📷 Opening camera {} ({}) via {}",
            self.config.device, self.config.input_format, self.config.ffmpeg
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let config = self.config.clone();
        let args = self.args();

        // Process spawn blocks, keep it off the async executor
        let stream = tokio::task::spawn_blocking(move || FfmpegStream::start(&config, args, ready_tx))
            .await
            .map_err(|e| PanelError::CameraAccess(format!("Task join error: {}", e)))??;

        // The first frame is the "surface ready" signal
        match tokio::time::timeout(self.config.ready_timeout, ready_rx).await {
            Ok(Ok(())) => {
                info!("✅ Camera started");
                Ok(Box::new(stream))
            }
            Ok(Err(_)) => {
                stream.stop();
                let reason = stream
                    .failure()
                    .unwrap_or_else(|| "ffmpeg exited before producing a frame".to_string());
                Err(PanelError::CameraAccess(reason))
            }
            Err(_) => {
                stream.stop();
                Err(PanelError::CameraAccess(format!(
                    "no frame within {} ms",
                    self.config.ready_timeout.as_millis()
                )))
            }
        }
    }
}

/// Longest stderr chunk kept per line; longer output is split
const MAX_STDERR_LINE: u64 = 512;

/// A running ffmpeg capture process
pub struct FfmpegStream {
    child: Mutex<Option<Child>>,
    latest: Arc<Mutex<Option<Frame>>>,
    failure: Arc<Mutex<Option<String>>>,
    running: Arc<AtomicBool>,
}

impl FfmpegStream {
    /// Spawn ffmpeg and its pipe readers (blocking)
    fn start(config: &CameraConfig, args: Vec<String>, ready_tx: oneshot::Sender<()>) -> Result<Self> {
        let mut child = Command::new(&config.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PanelError::CameraAccess(format!("failed to start {}: {}", config.ffmpeg, e))
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PanelError::CameraAccess("ffmpeg pipes unavailable".to_string()));
            }
        };
        debug!("ffmpeg running as pid {}", child.id());

        let stream = Self {
            child: Mutex::new(Some(child)),
            latest: Arc::new(Mutex::new(None)),
            failure: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(true)),
        };
        let drain = stream.spawn_stderr_drain(stderr);
        stream.spawn_reader(stdout, drain, config.width, config.height, ready_tx);
        Ok(stream)
    }

    /// Drain stderr for the whole life of the process so ffmpeg never blocks on it.
    /// The last non-empty line is kept as the failure reason.
    fn spawn_stderr_drain(&self, stderr: ChildStderr) -> JoinHandle<()> {
        let failure = self.failure.clone();

        thread::spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut line = Vec::new();

            loop {
                line.clear();
                match (&mut reader).take(MAX_STDERR_LINE).read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("ffmpeg stderr closed: {}", e);
                        break;
                    }
                }

                let text = String::from_utf8_lossy(&line);
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                warn!("ffmpeg: {}", text);
                if let Ok(mut slot) = failure.lock() {
                    *slot = Some(text.to_string());
                }
            }
        })
    }

    /// Read fixed-size RGBA frames until EOF or stop
    fn spawn_reader(
        &self,
        mut stdout: ChildStdout,
        drain: JoinHandle<()>,
        width: u32,
        height: u32,
        ready_tx: oneshot::Sender<()>,
    ) {
        let latest = self.latest.clone();
        let running = self.running.clone();

        thread::spawn(move || {
            let frame_len = Frame::expected_len(width, height);
            let mut ready_tx = Some(ready_tx);
            let mut frames: u64 = 0;

            while running.load(Ordering::SeqCst) {
                let mut buf = vec![0u8; frame_len];
                if let Err(e) = stdout.read_exact(&mut buf) {
                    debug!("Camera pipe closed after {} frames: {}", frames, e);
                    break;
                }

                // Checked under the lock so a stopped stream never gets a late frame
                match latest.lock() {
                    Ok(mut slot) if running.load(Ordering::SeqCst) => {
                        *slot = Some(Frame::new(width, height, buf));
                    }
                    _ => break,
                }
                frames += 1;

                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(());
                }
            }

            if ready_tx.is_some() {
                // No frame: let stderr finish so the failure reason is in place
                // before the opener sees the dropped sender
                let _ = drain.join();
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|f| f.clone())
    }
}

impl CameraStream for FfmpegStream {
    fn latest_frame(&self) -> Option<Frame> {
        self.latest.lock().ok().and_then(|f| f.clone())
    }

    fn stop(&self) {
        let latest = self.latest.lock();
        self.running.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = latest {
            *slot = None;
        }

        let child = self.child.lock().ok().and_then(|mut c| c.take());
        if let Some(mut child) = child {
            if let Err(e) = child.kill() {
                debug!("ffmpeg already exited: {}", e);
            }
            // Reap off the caller's thread
            thread::spawn(move || {
                if let Ok(status) = child.wait() {
                    debug!("ffmpeg exited: {}", status);
                }
            });
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.stop();
    }
}
