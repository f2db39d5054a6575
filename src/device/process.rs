//! Foreign display process control
//!
//! The display process is not ours. We only know its PID file, and we pause,
//! resume or kill it with signals around our use of the console. The PID is
//! re-read before every signal so a restarted process is targeted correctly.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidError {
    #[error("failed to read PID file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("PID file {path} holds {content:?}, expected a positive integer")]
    Invalid { path: PathBuf, content: String },
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Pid(#[from] PidError),

    #[error("failed to send {signal} to PID {pid}: {source}")]
    Signal {
        pid: i32,
        signal: ProcessSignal,
        source: io::Error,
    },
}

/// Signals used on the display process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Stop,
    Continue,
    Kill,
}

impl ProcessSignal {
    pub fn number(self) -> libc::c_int {
        match self {
            ProcessSignal::Stop => libc::SIGSTOP,
            ProcessSignal::Continue => libc::SIGCONT,
            ProcessSignal::Kill => libc::SIGKILL,
        }
    }
}

impl fmt::Display for ProcessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessSignal::Stop => "SIGSTOP",
            ProcessSignal::Continue => "SIGCONT",
            ProcessSignal::Kill => "SIGKILL",
        };
        f.write_str(name)
    }
}

/// Pause/resume/terminate control over the display process
pub trait ProcessController {
    fn pause(&self) -> Result<(), ProcessError>;
    fn resume(&self) -> Result<(), ProcessError>;
    fn terminate(&self) -> Result<(), ProcessError>;
}

/// Delivers a signal to a PID
pub trait SignalSender {
    fn send(&self, pid: i32, signal: ProcessSignal) -> io::Result<()>;
}

/// `kill(2)`
#[derive(Debug, Clone, Copy, Default)]
pub struct KillSender;

impl SignalSender for KillSender {
    fn send(&self, pid: i32, signal: ProcessSignal) -> io::Result<()> {
        // SAFETY: kill has no memory-safety preconditions; pid is validated positive
        let ret = unsafe { libc::kill(pid, signal.number()) };
        if ret == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Process identified by a PID file
#[derive(Debug, Clone)]
pub struct PidFileProcess<S = KillSender> {
    pid_file: PathBuf,
    sender: S,
}

impl PidFileProcess<KillSender> {
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self::with_sender(pid_file, KillSender)
    }
}

impl<S: SignalSender> PidFileProcess<S> {
    pub fn with_sender(pid_file: impl Into<PathBuf>, sender: S) -> Self {
        Self {
            pid_file: pid_file.into(),
            sender,
        }
    }

    /// Resolve the PID and deliver `signal`
    pub fn signal(&self, signal: ProcessSignal) -> Result<(), ProcessError> {
        let pid = read_pid(&self.pid_file)?;
        log::debug!("Sending {} to PID {}", signal, pid);
        self.sender
            .send(pid, signal)
            .map_err(|source| ProcessError::Signal {
                pid,
                signal,
                source,
            })
    }
}

impl<S: SignalSender> ProcessController for PidFileProcess<S> {
    fn pause(&self) -> Result<(), ProcessError> {
        self.signal(ProcessSignal::Stop)
    }

    fn resume(&self) -> Result<(), ProcessError> {
        self.signal(ProcessSignal::Continue)
    }

    fn terminate(&self) -> Result<(), ProcessError> {
        self.signal(ProcessSignal::Kill)
    }
}

/// Read a PID file. Zero and negative values would address process groups,
/// so they are rejected.
pub fn read_pid(path: &Path) -> Result<i32, PidError> {
    let content = fs::read_to_string(path).map_err(|source| PidError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match content.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(PidError::Invalid {
            path: path.to_path_buf(),
            content,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(i32, ProcessSignal)>>>);

    impl SignalSender for Recorder {
        fn send(&self, pid: i32, signal: ProcessSignal) -> io::Result<()> {
            self.0.lock().unwrap().push((pid, signal));
            Ok(())
        }
    }

    #[test]
    fn test_read_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("PADD.pid");
        fs::write(&path, "1234\n").unwrap();
        assert_eq!(read_pid(&path).unwrap(), 1234);
    }

    #[test]
    fn test_group_pids_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("PADD.pid");
        for content in ["0\n", "-1\n", "padd\n", ""] {
            fs::write(&path, content).unwrap();
            assert!(matches!(read_pid(&path), Err(PidError::Invalid { .. })));
        }
    }

    #[test]
    fn test_pid_resolved_before_every_signal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("PADD.pid");
        let recorder = Recorder::default();
        let process = PidFileProcess::with_sender(&path, recorder.clone());

        fs::write(&path, "1234\n").unwrap();
        process.pause().unwrap();
        // Display restarted by its supervisor in between
        fs::write(&path, "5678\n").unwrap();
        process.resume().unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![(1234, ProcessSignal::Stop), (5678, ProcessSignal::Continue)]
        );
    }

    #[test]
    fn test_missing_pid_file_sends_nothing() {
        let dir = tempdir().unwrap();
        let recorder = Recorder::default();
        let process = PidFileProcess::with_sender(dir.path().join("PADD.pid"), recorder.clone());

        assert!(matches!(
            process.terminate(),
            Err(ProcessError::Pid(PidError::Read { .. }))
        ));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_signal_numbers() {
        assert_eq!(ProcessSignal::Stop.number(), libc::SIGSTOP);
        assert_eq!(ProcessSignal::Continue.number(), libc::SIGCONT);
        assert_eq!(ProcessSignal::Kill.number(), libc::SIGKILL);
        assert_eq!(ProcessSignal::Kill.to_string(), "SIGKILL");
    }
}
