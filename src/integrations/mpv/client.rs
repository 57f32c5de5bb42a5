// src/integrations/mpv/client.rs
//
// mpv process + JSON IPC over a Unix socket
//
// mpv is launched idle with `--input-ipc-server=<socket>`. Each command opens
// a short-lived connection, writes one newline-terminated JSON request and
// reads lines until the reply carrying the same `request_id` arrives
// (asynchronous event lines are skipped).
//
// RULES:
// - No domain state here; this is transport only
// - Every failure is an `AppError::Engine`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::MpvConfig;
use crate::error::{AppError, AppResult};

const IO_TIMEOUT: Duration = Duration::from_secs(2);

/// MPV IPC command envelope
#[derive(Debug, Serialize)]
struct MpvCommand<'a> {
    command: &'a [Value],
    request_id: u64,
}

/// MPV IPC response envelope
#[derive(Debug, Deserialize)]
struct MpvResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    request_id: Option<u64>,
    #[serde(default)]
    event: Option<String>,
}

fn engine_error(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Engine(format!("{}: {}", context, e))
}

/// Parse one reply line. `None` for lines that are not the reply to `request_id`.
fn parse_reply(line: &str, request_id: u64) -> AppResult<Option<Option<Value>>> {
    let response: MpvResponse =
        serde_json::from_str(line.trim()).map_err(|e| engine_error("invalid IPC reply", e))?;

    if response.event.is_some() || response.request_id != Some(request_id) {
        return Ok(None);
    }

    match response.error.as_deref() {
        Some("success") | None => Ok(Some(response.data)),
        Some(error) => Err(AppError::Engine(format!("mpv: {}", error))),
    }
}

pub struct MpvClient {
    binary: String,
    socket_path: PathBuf,
    startup_timeout: Duration,
    process: Mutex<Option<Child>>,
    next_request_id: AtomicU64,
}

impl MpvClient {
    pub fn new(config: &MpvConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            socket_path: config.socket_path(),
            startup_timeout: Duration::from_secs(config.startup_timeout_secs),
            process: Mutex::new(None),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn process(&self) -> MutexGuard<'_, Option<Child>> {
        self.process.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start an idle mpv instance if none is running, then wait for its socket
    pub fn launch(&self) -> AppResult<()> {
        if self.is_running() {
            return Ok(());
        }

        // A stale socket from a crashed instance would accept no connections
        let _ = std::fs::remove_file(&self.socket_path);

        let child = Command::new(&self.binary)
            .arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .arg("--idle=yes")
            .arg("--force-window=yes")
            .arg("--keep-open=yes")
            .arg("--no-terminal")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| engine_error("failed to spawn mpv", e))?;

        *self.process() = Some(child);
        log::info!("mpv launched, IPC at {:?}", self.socket_path);

        let deadline = Instant::now() + self.startup_timeout;
        while Instant::now() < deadline {
            if UnixStream::connect(&self.socket_path).is_ok() {
                return Ok(());
            }
            if !self.is_running() {
                return Err(AppError::Engine("mpv exited during startup".to_string()));
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        self.stop();
        Err(AppError::Engine(format!(
            "mpv IPC socket {:?} did not appear",
            self.socket_path
        )))
    }

    /// Quit mpv and reap the process
    pub fn stop(&self) {
        if self.is_running() {
            let _ = self.command(&[Value::from("quit")]);
        }

        if let Some(mut child) = self.process().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }

    pub fn is_running(&self) -> bool {
        let mut process = self.process();
        match process.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                *process = None;
                false
            }
            None => false,
        }
    }

    /// Send one command and return its `data`
    pub fn command(&self, command: &[Value]) -> AppResult<Option<Value>> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let mut payload = serde_json::to_string(&MpvCommand {
            command,
            request_id,
        })?;
        payload.push('\n');

        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| engine_error("IPC connection failed", e))?;
        stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|_| stream.set_write_timeout(Some(IO_TIMEOUT)))
            .map_err(|e| engine_error("IPC setup failed", e))?;
        stream
            .write_all(payload.as_bytes())
            .map_err(|e| engine_error("IPC write failed", e))?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| engine_error("IPC read failed", e))?;
            if read == 0 {
                return Err(AppError::Engine("IPC connection closed".to_string()));
            }
            if let Some(data) = parse_reply(&line, request_id)? {
                return Ok(data);
            }
        }
    }

    pub fn get_property(&self, name: &str) -> AppResult<Option<Value>> {
        self.command(&[Value::from("get_property"), Value::from(name)])
    }

    /// Like `get_property`, but "property unavailable" reads as `None`
    pub fn get_property_opt(&self, name: &str) -> Option<Value> {
        match self.get_property(name) {
            Ok(value) => value,
            Err(e) => {
                log::trace!("mpv property {} unavailable: {}", name, e);
                None
            }
        }
    }

    pub fn set_property(&self, name: &str, value: Value) -> AppResult<()> {
        self.command(&[Value::from("set_property"), Value::from(name), value])?;
        Ok(())
    }
}

impl Drop for MpvClient {
    fn drop(&mut self) {
        self.stop();
    }
}
