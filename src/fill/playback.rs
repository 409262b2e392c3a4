// Inline playback - hands the current track to the system's default player
// We never decode audio here, just spawn the OS opener and keep its handle around

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{FillError, TrackPath};

/// Host family, picks which opener gets spawned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Posix,
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Posix,
        }
    }

    pub fn open_command(&self, path: &Path) -> OpenCommand {
        let path = path.to_string_lossy().into_owned();
        match self {
            Platform::MacOs => OpenCommand::Program {
                program: "open".to_string(),
                args: vec![path],
            },
            // `start` is a cmd builtin, so this one has to go through the shell
            Platform::Windows => OpenCommand::Shell(format!("start \"\" \"{path}\"")),
            Platform::Posix => OpenCommand::Program {
                program: "xdg-open".to_string(),
                args: vec![path],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenCommand {
    Program { program: String, args: Vec<String> },
    Shell(String),
}

pub trait PlaybackProcess {
    /// Non-blocking liveness poll
    fn is_running(&mut self) -> bool;

    fn terminate(&mut self) -> std::io::Result<()>;

    /// Wait for exit, giving up after `timeout`
    fn wait_for_exit(&mut self, timeout: Duration) -> bool;
}

pub trait Launcher {
    type Process: PlaybackProcess;

    fn spawn(&mut self, command: &OpenCommand) -> std::io::Result<Self::Process>;
}

/// Spawns real child processes with stdout/stderr sent to null
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    type Process = Child;

    fn spawn(&mut self, command: &OpenCommand) -> std::io::Result<Child> {
        let mut cmd = match command {
            OpenCommand::Program { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            OpenCommand::Shell(line) => shell_command(line),
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    use std::os::windows::process::CommandExt;

    let mut cmd = Command::new("cmd");
    cmd.arg("/C").raw_arg(line);
    cmd
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

impl PlaybackProcess for Child {
    fn is_running(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        self.kill()
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_wait() {
                Ok(Some(_)) | Err(_) => return true,
                Ok(None) if Instant::now() >= deadline => return false,
                Ok(None) => thread::sleep(Duration::from_millis(10)),
            }
        }
    }
}

/// Owns at most one playback process at a time
pub struct PlaybackController<L: Launcher> {
    launcher: L,
    platform: Platform,
    stop_timeout: Duration,
    current: Option<L::Process>,
}

impl<L: Launcher> PlaybackController<L> {
    pub fn new(launcher: L, platform: Platform, stop_timeout: Duration) -> Self {
        Self {
            launcher,
            platform,
            stop_timeout,
            current: None,
        }
    }

    /// Start playing `path`, stopping whatever was playing before.
    ///
    /// On failure the controller keeps no handle for this attempt; the error
    /// is for the caller to report, never to abort on.
    pub fn play(&mut self, path: &TrackPath) -> Result<(), FillError> {
        self.stop();

        let file_path = path.to_path_buf()?;
        let command = self.platform.open_command(&file_path);
        debug!("Launching player: {:?}", command);

        let process = self
            .launcher
            .spawn(&command)
            .map_err(|e| FillError::PlaybackLaunch(e.to_string()))?;
        self.current = Some(process);
        Ok(())
    }

    /// Stop the active process if it is still alive. Returns true if one was terminated.
    pub fn stop(&mut self) -> bool {
        let Some(mut process) = self.current.take() else {
            return false;
        };

        // The opener may well have exited on its own by now
        if !process.is_running() {
            return false;
        }

        if let Err(e) = process.terminate() {
            warn!("Failed to terminate playback process: {}", e);
            return false;
        }
        if !process.wait_for_exit(self.stop_timeout) {
            warn!("Playback process did not exit within {:?}", self.stop_timeout);
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }
}
