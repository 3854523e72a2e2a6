//! Microphone level meter for the listening indicator.
//!
//! The speech listener writes its energy meter to an IPC file (one
//! `Energy:  cur=<value> thresh=<value>` line per update). The level shown on
//! the faceplate is the current value normalised against a running peak,
//! scaled to 0..=10.

use crate::Result;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Highest level published by the meter.
pub const MAX_MIC_LEVEL: u8 = 10;

const INITIAL_PEAK: f32 = 0.001;
const SHORT_NORMALIZE: f32 = 1.0 / 32768.0;

/// Parses one meter line and returns its `cur` value.
pub fn parse_meter_line(line: &str) -> Option<f32> {
    let mut parts = line.rsplit('=');
    let thresh = parts.next()?;
    let cur = parts.next()?;
    // threshold is not used, but a line without one is malformed
    thresh.trim().parse::<f32>().ok()?;
    cur.split(' ').next()?.trim().parse::<f32>().ok()
}

/// Reads the file from byte `offset` and returns the last `cur` value, if any.
pub async fn read_level_from(path: &Path, offset: usize) -> Result<Option<f32>> {
    let content = tokio::fs::read_to_string(path).await?;
    let tail = content.get(offset..).unwrap_or("");
    Ok(tail.lines().filter_map(parse_meter_line).last())
}

/// RMS amplitude of a block of little-endian 16-bit samples, normalised to 0..=1.
pub fn rms(block: &[u8]) -> f32 {
    let samples = block.chunks_exact(2);
    let count = samples.len();
    if count == 0 {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .map(|b| {
            let n = f32::from(i16::from_le_bytes([b[0], b[1]])) * SHORT_NORMALIZE;
            n * n
        })
        .sum();
    (sum_squares / count as f32).sqrt()
}

/// Normalises raw meter values against the loudest value seen so far.
#[derive(Debug, Clone)]
pub struct LevelMeter {
    peak: f32,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self { peak: INITIAL_PEAK }
    }
}

impl LevelMeter {
    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn normalize(&mut self, cur: f32) -> u8 {
        if !cur.is_finite() || cur <= 0.0 {
            return 0;
        }
        if cur > self.peak {
            self.peak = cur;
        }
        ((cur / self.peak) * f32::from(MAX_MIC_LEVEL)).floor() as u8
    }

    /// Called when listening starts, so a loud noise does not pin the meter low.
    pub fn halve_peak(&mut self) {
        if self.peak > INITIAL_PEAK {
            self.peak /= 2.0;
        }
    }
}

/// Identifies one version of the level file: its mtime plus, on unix, its ctime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    changed: (i64, i64),
}

impl FileStamp {
    fn of(meta: &Metadata) -> std::io::Result<Self> {
        #[cfg(unix)]
        let changed = {
            use std::os::unix::fs::MetadataExt;
            (meta.ctime(), meta.ctime_nsec())
        };
        #[cfg(not(unix))]
        let changed = (0, 0);
        Ok(Self {
            modified: meta.modified()?,
            changed,
        })
    }
}

/// Polls the listener's level file while listening and publishes normalised levels.
#[derive(Debug, Clone)]
pub struct MicLevelMonitor {
    meter: Arc<Mutex<LevelMeter>>,
    rx: watch::Receiver<u8>,
    listening: Arc<watch::Sender<bool>>,
}

impl MicLevelMonitor {
    /// Starts the poller task. It stays idle until [`listening_started`]
    /// and goes idle again on [`listening_ended`]. The file is only re-read
    /// when its mtime or ctime changes; a missing file produces no updates.
    ///
    /// [`listening_started`]: MicLevelMonitor::listening_started
    /// [`listening_ended`]: MicLevelMonitor::listening_ended
    pub fn spawn(path: PathBuf, interval: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = watch::channel(0u8);
        let (listening_tx, mut listening_rx) = watch::channel(false);
        let meter = Arc::new(Mutex::new(LevelMeter::default()));
        let poll_meter = meter.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_stamp: Option<FileStamp> = None;
            tracing::info!("🎙️ Mic level file {}", path.display());
            loop {
                let listening = *listening_rx.borrow_and_update();
                if !listening {
                    tracing::debug!("Mic level polling paused");
                    // Err: the monitor was dropped
                    let gate = listening_rx.wait_for(|on| *on).await.map(|_| ());
                    if gate.is_err() {
                        break;
                    }
                    tracing::debug!("Mic level polling resumed");
                    ticker.reset_immediately();
                }

                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                let still_listening = *listening_rx.borrow();
                if !still_listening {
                    continue;
                }

                let stamp = match tokio::fs::metadata(&path).await.and_then(|m| FileStamp::of(&m)) {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                if last_stamp == Some(stamp) {
                    continue;
                }
                last_stamp = Some(stamp);

                match read_level_from(&path, 0).await {
                    Ok(Some(cur)) => {
                        let level = match poll_meter.lock() {
                            Ok(mut m) => m.normalize(cur),
                            Err(_) => continue,
                        };
                        tx.send_if_modified(|current| {
                            let changed = *current != level;
                            *current = level;
                            changed
                        });
                    }
                    Ok(None) => {}
                    Err(e) => tracing::error!("Failed to read mic level: {}", e),
                }
            }
        });

        let monitor = Self {
            meter,
            rx,
            listening: Arc::new(listening_tx),
        };
        (monitor, handle)
    }

    /// Latest published level, 0..=10.
    pub fn level(&self) -> u8 {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.rx.clone()
    }

    /// Current peak of the meter.
    pub fn peak(&self) -> f32 {
        self.meter.lock().map(|m| m.peak()).unwrap_or(INITIAL_PEAK)
    }

    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
    }

    /// Recording began: halve the peak and start polling.
    pub fn listening_started(&self) {
        if let Ok(mut m) = self.meter.lock() {
            m.halve_peak();
        }
        self.listening.send_replace(true);
    }

    /// Recording ended: stop polling. The last level stays published.
    pub fn listening_ended(&self) {
        self.listening.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_energy_line() {
        assert_eq!(parse_meter_line("Energy:  cur=4 thresh=1.5"), Some(4.0));
        assert_eq!(parse_meter_line("Energy:  cur=0.25 thresh=1.5\n"), Some(0.25));
        assert_eq!(parse_meter_line("garbage"), None);
        assert_eq!(parse_meter_line("Energy: cur=4 thresh=x"), None);
    }

    #[test]
    fn rms_of_silence_and_full_scale() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0, 0, 0, 0]), 0.0);
        let full = i16::MIN.to_le_bytes();
        assert_eq!(rms(&[full[0], full[1], full[0], full[1]]), 1.0);
    }

    #[test]
    fn meter_tracks_peak() {
        let mut m = LevelMeter::default();
        assert_eq!(m.normalize(4.0), 10);
        assert_eq!(m.normalize(2.0), 5);
        assert_eq!(m.normalize(0.0), 0);
        m.halve_peak();
        assert_eq!(m.peak(), 2.0);
        assert_eq!(m.normalize(1.0), 5);
    }

    #[test]
    fn halving_stops_at_initial_peak() {
        let mut m = LevelMeter::default();
        m.halve_peak();
        assert_eq!(m.peak(), INITIAL_PEAK);
    }

    #[tokio::test]
    async fn reads_last_value_from_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic_level");
        std::fs::write(&path, "Energy:  cur=1 thresh=1.5\nEnergy:  cur=3 thresh=1.5\n").unwrap();
        assert_eq!(read_level_from(&path, 0).await.unwrap(), Some(3.0));
        assert_eq!(read_level_from(&path, 10_000).await.unwrap(), None);
    }

    async fn wait_for_level(rx: &mut watch::Receiver<u8>) -> u8 {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        *rx.borrow_and_update()
    }

    fn write_level(path: &Path, cur: f32) {
        std::fs::write(path, format!("Energy:  cur={} thresh=1.5\n", cur)).unwrap();
    }

    #[tokio::test]
    async fn monitor_is_idle_until_listening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic_level");
        write_level(&path, 2.0);

        let (monitor, handle) = MicLevelMonitor::spawn(path, Duration::from_millis(10));
        let mut rx = monitor.subscribe();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!rx.has_changed().unwrap());
        assert!(!monitor.is_listening());

        monitor.listening_started();
        assert_eq!(wait_for_level(&mut rx).await, 10);
        handle.abort();
    }

    #[tokio::test]
    async fn no_level_after_listening_ended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic_level");
        write_level(&path, 2.0);

        let (monitor, handle) = MicLevelMonitor::spawn(path.clone(), Duration::from_millis(10));
        let mut rx = monitor.subscribe();
        monitor.listening_started();
        assert_eq!(wait_for_level(&mut rx).await, 10);

        monitor.listening_ended();
        tokio::time::sleep(Duration::from_millis(30)).await;
        write_level(&path, 1.0);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(monitor.level(), 10);
        handle.abort();
    }

    #[tokio::test]
    async fn unchanged_file_is_not_reread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic_level");
        write_level(&path, 2.0);

        let (monitor, handle) = MicLevelMonitor::spawn(path, Duration::from_millis(10));
        let mut rx = monitor.subscribe();
        monitor.listening_started();
        assert_eq!(wait_for_level(&mut rx).await, 10);
        assert_eq!(monitor.peak(), 2.0);

        // a re-read of cur=2 would push the peak back up to 2
        monitor.listening_started();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(monitor.peak(), 1.0);
        handle.abort();
    }

    #[tokio::test]
    async fn ctime_change_triggers_reread_with_same_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic_level");
        write_level(&path, 2.0);

        let (monitor, handle) = MicLevelMonitor::spawn(path.clone(), Duration::from_millis(10));
        let mut rx = monitor.subscribe();
        monitor.listening_started();
        assert_eq!(wait_for_level(&mut rx).await, 10);

        monitor.listening_ended();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        write_level(&path, 0.5);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime);

        // peak halves to 1.0, so cur=0.5 reads as 5
        monitor.listening_started();
        assert_eq!(wait_for_level(&mut rx).await, 5);
        handle.abort();
    }
}
