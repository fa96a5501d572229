//! services/watcher/src/adapters/browser.rs
//!
//! This module contains the adapter that shows the stream in a browser process.
//! It implements the `StreamSession` port from the `core` crate.

use async_trait::async_trait;
use owl_watcher_core::ports::{PortError, PortResult, StreamSession};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StreamSession` by running a browser as a child process.
///
/// Closing the session kills the child, so the browser command must stay in the
/// foreground for as long as the stream is shown.
pub struct BrowserSessionAdapter {
    command: Vec<String>,
    stream_url: String,
    mute_command: Option<Vec<String>>,
    child: Mutex<Option<Child>>,
}

impl BrowserSessionAdapter {
    /// Creates a new `BrowserSessionAdapter`. `command` must not be empty.
    pub fn new(
        command: Vec<String>,
        stream_url: String,
        mute_command: Option<Vec<String>>,
    ) -> Self {
        Self {
            command,
            stream_url,
            mute_command,
            child: Mutex::new(None),
        }
    }

    pub async fn is_open(&self) -> bool {
        self.child.lock().await.is_some()
    }
}

/// Builds the session for this platform, honouring `BROWSER_COMMAND` when set.
pub fn new_session(config: &Config) -> Arc<dyn StreamSession> {
    let command = config
        .browser_command
        .clone()
        .unwrap_or_else(default_browser_command);
    Arc::new(BrowserSessionAdapter::new(
        command,
        config.stream_url.clone(),
        config.mute_command.clone(),
    ))
}

fn default_browser_command() -> Vec<String> {
    let program = if cfg!(target_os = "macos") {
        "/Applications/Firefox.app/Contents/MacOS/firefox"
    } else if cfg!(target_os = "windows") {
        "firefox.exe"
    } else {
        "firefox"
    };
    vec![program.to_string(), "--new-instance".to_string()]
}

fn command_from(parts: &[String]) -> PortResult<Command> {
    let (program, args) = parts
        .split_first()
        .ok_or_else(|| PortError::Session("browser command is empty".to_string()))?;
    let mut command = Command::new(program);
    command.args(args);
    Ok(command)
}

//=========================================================================================
// `StreamSession` Trait Implementation
//=========================================================================================

#[async_trait]
impl StreamSession for BrowserSessionAdapter {
    async fn open(&self) -> PortResult<()> {
        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Err(PortError::Session("session is already open".to_string()));
        }

        let child = command_from(&self.command)?
            .arg(&self.stream_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PortError::Session(format!("Failed to start {}: {}", self.command[0], e))
            })?;

        info!("Browser started (pid {:?}) on {}", child.id(), self.stream_url);
        *guard = Some(child);
        Ok(())
    }

    async fn close(&self) -> PortResult<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            debug!("Close requested with no browser running.");
            return Ok(());
        };

        child
            .kill()
            .await
            .map_err(|e| PortError::Session(format!("Failed to stop browser: {}", e)))?;
        info!("Browser stopped.");
        Ok(())
    }

    async fn mute(&self) -> PortResult<()> {
        let Some(parts) = &self.mute_command else {
            return Err(PortError::Unsupported("no MUTE_COMMAND configured".to_string()));
        };

        let status = command_from(parts)?
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| PortError::Session(format!("Failed to run mute command: {}", e)))?;
        if !status.success() {
            return Err(PortError::Session(format!("mute command exited with {}", status)));
        }
        Ok(())
    }
}
