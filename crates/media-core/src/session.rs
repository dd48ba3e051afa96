//! Live capture session
//!
//! A single process-wide [`CaptureSessionManager`] tracks the one capture
//! that may run at a time. `Idle -> Capturing` happens in
//! [`CaptureSessionManager::start`], `Capturing -> Idle` in
//! [`CaptureSessionManager::stop`]. Stopping an idle manager does nothing.
//! Packet acquisition is delegated to a [`CaptureBackend`].

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

static GLOBAL: Lazy<CaptureSessionManager> = Lazy::new(CaptureSessionManager::new);

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Starts packet acquisition
pub trait CaptureBackend: Send + Sync {
    /// Begin writing packets from `interface` to `output`
    fn start(&self, interface: &str, output: &Path) -> Result<Box<dyn CaptureHandle>>;
}

/// A running acquisition
pub trait CaptureHandle: Send {
    /// Stop acquisition and flush the output file
    fn stop(&mut self) -> Result<()>;
}

/// Description of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub interface: String,
    pub output: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// A session after `stop`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedSession {
    pub info: SessionInfo,
    pub stopped_at: DateTime<Utc>,
}

enum SessionState {
    Idle,
    Capturing {
        info: SessionInfo,
        handle: Box<dyn CaptureHandle>,
    },
}

/// Owner of the active capture session
pub struct CaptureSessionManager {
    state: Mutex<SessionState>,
}

impl Default for CaptureSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSessionManager {
    /// A standalone manager; the process-wide one is [`Self::global`]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
        }
    }

    /// The process-wide manager
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Start capturing
    ///
    /// # Errors
    ///
    /// [`Error::SessionAlreadyActive`] while another session runs; backend
    /// errors leave the manager idle.
    pub fn start(
        &self,
        backend: &dyn CaptureBackend,
        interface: &str,
        output: impl Into<PathBuf>,
    ) -> Result<SessionInfo> {
        let mut state = self.state.lock();
        if let SessionState::Capturing { info, .. } = &*state {
            return Err(Error::SessionAlreadyActive {
                interface: info.interface.clone(),
            });
        }

        let output = output.into();
        let handle = backend.start(interface, &output)?;
        let info = SessionInfo {
            interface: interface.to_string(),
            output,
            started_at: Utc::now(),
        };
        info!("Capture started on {} -> {}", info.interface, info.output.display());
        *state = SessionState::Capturing {
            info: info.clone(),
            handle,
        };
        Ok(info)
    }

    /// Stop the active session; `None` when idle
    ///
    /// The manager is idle afterwards even if the backend fails to stop.
    pub fn stop(&self) -> Result<Option<CompletedSession>> {
        let previous = std::mem::replace(&mut *self.state.lock(), SessionState::Idle);
        let SessionState::Capturing { info, mut handle } = previous else {
            debug!("Stop requested with no active capture");
            return Ok(None);
        };

        handle.stop()?;
        info!("Capture on {} stopped", info.interface);
        Ok(Some(CompletedSession {
            info,
            stopped_at: Utc::now(),
        }))
    }

    /// The active session, if any
    pub fn status(&self) -> Option<SessionInfo> {
        match &*self.state.lock() {
            SessionState::Idle => None,
            SessionState::Capturing { info, .. } => Some(info.clone()),
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(*self.state.lock(), SessionState::Capturing { .. })
    }
}

/// How long a capture process gets to exit after SIGTERM before it is killed
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Captures with `tshark -i <interface> -w <output> -F pcap`
///
/// Stopping sends SIGTERM so tshark can flush and close the capture file;
/// the process is killed only if it outlives the grace period.
#[derive(Debug, Clone)]
pub struct TsharkBackend {
    program: String,
    stop_grace: Duration,
}

impl Default for TsharkBackend {
    fn default() -> Self {
        Self::new("tshark")
    }
}

impl TsharkBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Arguments passed to the program
    pub fn args(interface: &str, output: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            interface.to_string(),
            "-w".to_string(),
            output.display().to_string(),
            "-F".to_string(),
            "pcap".to_string(),
        ]
    }
}

impl CaptureBackend for TsharkBackend {
    fn start(&self, interface: &str, output: &Path) -> Result<Box<dyn CaptureHandle>> {
        let child = Command::new(&self.program)
            .args(Self::args(interface, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Backend(format!("failed to start {}: {}", self.program, e)))?;
        debug!("Spawned {} (pid {})", self.program, child.id());
        Ok(Box::new(ChildHandle::new(child, self.stop_grace)))
    }
}

/// A spawned capture process
struct ChildHandle {
    child: Option<Child>,
    grace: Duration,
}

impl ChildHandle {
    fn new(child: Child, grace: Duration) -> Self {
        Self {
            child: Some(child),
            grace,
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM)
        .map_err(|e| Error::Backend(format!("failed to signal capture process: {}", e)))
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<()> {
    child
        .kill()
        .map_err(|e| Error::Backend(format!("failed to stop capture process: {}", e)))
}

/// Poll until the child exits or `deadline` passes
fn wait_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() < deadline => thread::sleep(STOP_POLL_INTERVAL),
            Ok(None) => return Ok(None),
            Err(e) => return Err(Error::Backend(format!("failed to reap capture process: {}", e))),
        }
    }
}

impl CaptureHandle for ChildHandle {
    fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if let Ok(Some(status)) = child.try_wait() {
            warn!("Capture process had already exited with {}", status);
            return Ok(());
        }

        match terminate(&mut child) {
            Ok(()) => {
                if let Some(status) = wait_until(&mut child, Instant::now() + self.grace)? {
                    debug!("Capture process exited with {}", status);
                    return Ok(());
                }
            }
            Err(e) => warn!("{}", e),
        }

        warn!("Capture process still running {:?} after stop request, killing it", self.grace);
        child
            .kill()
            .map_err(|e| Error::Backend(format!("failed to kill capture process: {}", e)))?;
        child
            .wait()
            .map_err(|e| Error::Backend(format!("failed to reap capture process: {}", e)))?;
        Ok(())
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        started: AtomicUsize,
        stopped: Arc<AtomicUsize>,
    }

    struct RecorderHandle(Arc<AtomicUsize>);

    impl CaptureHandle for RecorderHandle {
        fn stop(&mut self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl CaptureBackend for Recorder {
        fn start(&self, _interface: &str, _output: &Path) -> Result<Box<dyn CaptureHandle>> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecorderHandle(Arc::clone(&self.stopped))))
        }
    }

    struct Failing;

    impl CaptureBackend for Failing {
        fn start(&self, _interface: &str, _output: &Path) -> Result<Box<dyn CaptureHandle>> {
            Err(Error::Backend("no such device".into()))
        }
    }

    #[test]
    fn test_lifecycle() {
        let manager = CaptureSessionManager::new();
        let backend = Recorder::default();
        assert!(manager.stop().unwrap().is_none());

        let info = manager.start(&backend, "eth0", "/tmp/a.pcap").unwrap();
        assert_eq!(info.interface, "eth0");
        assert!(manager.is_capturing());

        let err = manager.start(&backend, "eth1", "/tmp/b.pcap").unwrap_err();
        assert!(matches!(err, Error::SessionAlreadyActive { ref interface } if interface == "eth0"));
        assert_eq!(backend.started.load(Ordering::SeqCst), 1);

        let done = manager.stop().unwrap().unwrap();
        assert_eq!(done.info, info);
        assert_eq!(backend.stopped.load(Ordering::SeqCst), 1);
        assert!(manager.stop().unwrap().is_none());
        assert_eq!(backend.stopped.load(Ordering::SeqCst), 1);
        assert!(manager.status().is_none());
    }

    #[test]
    fn test_backend_failure_leaves_manager_idle() {
        let manager = CaptureSessionManager::new();
        assert!(matches!(manager.start(&Failing, "eth0", "x.pcap"), Err(Error::Backend(_))));
        assert!(!manager.is_capturing());
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(CaptureSessionManager::global(), CaptureSessionManager::global()));
    }

    /// Backend running a shell script with the output path as `$1`
    #[cfg(unix)]
    struct Script {
        body: &'static str,
        grace: Duration,
    }

    #[cfg(unix)]
    impl CaptureBackend for Script {
        fn start(&self, _interface: &str, output: &Path) -> Result<Box<dyn CaptureHandle>> {
            let child = Command::new("sh")
                .arg("-c")
                .arg(self.body)
                .arg("sh")
                .arg(output)
                .spawn()
                .map_err(|e| Error::Backend(e.to_string()))?;
            Ok(Box::new(ChildHandle::new(child, self.grace)))
        }
    }

    #[cfg(unix)]
    fn wait_for(path: &Path) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !path.exists() {
            assert!(Instant::now() < deadline, "{} never appeared", path.display());
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_lets_capture_process_flush() {
        let dir = temp_dir::TempDir::new().unwrap();
        let output = dir.path().join("live.pcap");
        let backend = Script {
            body: r#"trap 'echo flushed > "$1"; exit 0' TERM; touch "$1.ready"; while true; do sleep 0.05; done"#,
            grace: Duration::from_secs(5),
        };

        let manager = CaptureSessionManager::new();
        manager.start(&backend, "lo", output.clone()).unwrap();
        wait_for(&output.with_extension("pcap.ready"));

        let done = manager.stop().unwrap().unwrap();
        assert_eq!(done.info.output, output);
        assert_eq!(std::fs::read_to_string(&output).unwrap().trim(), "flushed");
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_kills_process_ignoring_term() {
        let dir = temp_dir::TempDir::new().unwrap();
        let output = dir.path().join("stubborn.pcap");
        let backend = Script {
            body: r#"trap '' TERM; touch "$1.ready"; while true; do sleep 0.05; done"#,
            grace: Duration::from_millis(200),
        };

        let manager = CaptureSessionManager::new();
        manager.start(&backend, "lo", output.clone()).unwrap();
        wait_for(&output.with_extension("pcap.ready"));

        let started = Instant::now();
        assert!(manager.stop().unwrap().is_some());
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(!manager.is_capturing());
    }

    #[test]
    fn test_tshark_args() {
        let args = TsharkBackend::args("any", Path::new("/tmp/out.pcap"));
        assert_eq!(args, vec!["-i", "any", "-w", "/tmp/out.pcap", "-F", "pcap"]);
    }

    #[test]
    fn test_stop_grace_is_configurable() {
        let backend = TsharkBackend::default();
        assert_eq!(backend.stop_grace, DEFAULT_STOP_GRACE);
        let backend = backend.with_stop_grace(Duration::from_millis(500));
        assert_eq!(backend.stop_grace, Duration::from_millis(500));
    }
}
