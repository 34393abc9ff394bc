//! Host environment: action inputs, log commands and step outputs
//!
//! [`GitHubActions`] speaks the GitHub Actions workflow-command protocol on
//! stdout and appends outputs to the `GITHUB_OUTPUT` file. [`RecordingHost`]
//! keeps everything in memory for tests.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Calling environment of the runner
pub trait Host {
    /// Named input, trimmed; `None` when unset or empty
    fn input(&self, name: &str) -> Option<String>;

    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);

    /// Hide a value from all further log output
    fn mask(&self, value: &str);

    fn set_output(&self, name: &str, value: &str) -> io::Result<()>;

    /// Mark the step as failed
    fn set_failed(&self, message: &str);
}

/// GitHub Actions runner host
pub struct GitHubActions {
    out: Mutex<Box<dyn Write + Send>>,
    output_file: Option<PathBuf>,
    failed: AtomicBool,
}

impl GitHubActions {
    /// Host writing commands to stdout and outputs to `$GITHUB_OUTPUT`
    pub fn from_env() -> Self {
        let output_file = std::env::var_os("GITHUB_OUTPUT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::with_writer(Box::new(io::stdout()), output_file)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, output_file: Option<PathBuf>) -> Self {
        Self {
            out: Mutex::new(out),
            output_file,
            failed: AtomicBool::new(false),
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    fn emit(&self, line: &str) {
        // A poisoned lock only means an earlier write panicked; keep logging
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }

    fn command(&self, name: &str, message: &str) {
        self.emit(&format!("::{name}::{}", escape_data(message)));
    }
}

impl Host for GitHubActions {
    fn input(&self, name: &str) -> Option<String> {
        let key = format!("INPUT_{}", name.replace(' ', "_").to_uppercase());
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn debug(&self, message: &str) {
        self.command("debug", message);
    }

    fn info(&self, message: &str) {
        self.emit(message);
    }

    fn warning(&self, message: &str) {
        self.command("warning", message);
    }

    fn error(&self, message: &str) {
        self.command("error", message);
    }

    fn mask(&self, value: &str) {
        if !value.is_empty() {
            self.command("add-mask", value);
        }
    }

    fn set_output(&self, name: &str, value: &str) -> io::Result<()> {
        match &self.output_file {
            Some(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(file_command(name, value).as_bytes())?;
                file.flush()
            }
            None => {
                self.emit(&format!(
                    "::set-output name={}::{}",
                    escape_property(name),
                    escape_data(value)
                ));
                Ok(())
            }
        }
    }

    fn set_failed(&self, message: &str) {
        self.failed.store(true, Ordering::Relaxed);
        self.error(message);
    }
}

/// Heredoc entry for a GitHub file command (`GITHUB_OUTPUT`, `GITHUB_ENV`)
pub fn file_command(key: &str, value: &str) -> String {
    let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
    format!("{key}<<{delimiter}\n{value}\n{delimiter}\n")
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

/// Log record captured by [`RecordingHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Debug(String),
    Info(String),
    Warning(String),
    Error(String),
}

/// In-memory host for tests and dry runs
#[derive(Default)]
pub struct RecordingHost {
    inputs: HashMap<String, String>,
    logs: Mutex<Vec<LogEntry>>,
    masked: Mutex<Vec<String>>,
    outputs: Mutex<Vec<(String, String)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: &str, value: &str) -> Self {
        self.inputs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        lock(&self.logs).clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.logs()
            .into_iter()
            .filter_map(|e| match e {
                LogEntry::Warning(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn masked(&self) -> Vec<String> {
        lock(&self.masked).clone()
    }

    pub fn outputs(&self) -> Vec<(String, String)> {
        lock(&self.outputs).clone()
    }

    pub fn failure(&self) -> Option<String> {
        lock(&self.failure).clone()
    }

    fn log(&self, entry: LogEntry) {
        lock(&self.logs).push(entry);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Host for RecordingHost {
    fn input(&self, name: &str) -> Option<String> {
        self.inputs
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn debug(&self, message: &str) {
        self.log(LogEntry::Debug(message.to_string()));
    }

    fn info(&self, message: &str) {
        self.log(LogEntry::Info(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.log(LogEntry::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.log(LogEntry::Error(message.to_string()));
    }

    fn mask(&self, value: &str) {
        lock(&self.masked).push(value.to_string());
    }

    fn set_output(&self, name: &str, value: &str) -> io::Result<()> {
        lock(&self.outputs).push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn set_failed(&self, message: &str) {
        self.error(message);
        *lock(&self.failure) = Some(message.to_string());
    }
}
