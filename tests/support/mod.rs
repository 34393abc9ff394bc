//! Shared fixtures: a scripted local HTTP server, a fake toolchain and
//! shell-script artifacts.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sm_action_runner::artifact::build_output_path;
use sm_action_runner::error::RunnerError;
use sm_action_runner::platform::TargetTriple;
use sm_action_runner::toolchain::Toolchain;

/// What the test server answers for one request
pub enum Reply {
    Status(u16, &'static str),
    Redirect(u16, String),
    RedirectWithoutLocation,
    Body(Vec<u8>),
    /// Announce `declared` bytes but send only `body`, then hang up
    Truncated { body: Vec<u8>, declared: usize },
    /// Send headers and a little body, then stall
    Stall(Duration),
}

pub struct TestServer {
    pub base: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a minimal HTTP server; `route` gets the request path and base URL
pub fn serve<F>(route: F) -> TestServer
where
    F: Fn(&str, &str) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");
    let hits = Arc::new(AtomicUsize::new(0));

    let thread_base = base.clone();
    let thread_hits = hits.clone();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            thread_hits.fetch_add(1, Ordering::SeqCst);

            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            let path = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/")
                .to_string();

            match route(&path, &thread_base) {
                Reply::Status(code, reason) => {
                    let response = format!(
                        "HTTP/1.1 {code} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
                Reply::Redirect(code, location) => {
                    let response = format!(
                        "HTTP/1.1 {code} Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
                Reply::RedirectWithoutLocation => {
                    let _ = stream.write_all(
                        b"HTTP/1.1 302 Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    );
                }
                Reply::Body(body) => {
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = stream.write_all(head.as_bytes());
                    let _ = stream.write_all(&body);
                }
                Reply::Truncated { body, declared } => {
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
                    );
                    let _ = stream.write_all(head.as_bytes());
                    let _ = stream.write_all(&body);
                }
                Reply::Stall(duration) => {
                    let _ = stream.write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\nConnection: close\r\n\r\npartial",
                    );
                    let _ = stream.flush();
                    thread::sleep(duration);
                }
            }
            let _ = stream.flush();
        }
    });

    TestServer { base, hits }
}

/// How the fake toolchain's release build behaves
#[derive(Clone)]
pub enum BuildBehavior {
    /// Write these bytes at the expected output path
    Produce(Vec<u8>),
    /// Report a non-zero exit
    Fail,
    /// Report success without producing anything
    NoOutput,
}

pub struct FakeToolchain {
    pub available: bool,
    pub installed: String,
    pub behavior: BuildBehavior,
    calls: Mutex<Vec<String>>,
}

impl FakeToolchain {
    pub fn new(behavior: BuildBehavior) -> Self {
        Self {
            available: true,
            installed: String::new(),
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_installed(mut self, listing: &str) -> Self {
        self.installed = listing.to_string();
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Toolchain for FakeToolchain {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn installed_targets(&self) -> Result<String, RunnerError> {
        self.record("list".to_string());
        Ok(self.installed.clone())
    }

    async fn add_target(&self, triple: TargetTriple) -> Result<(), RunnerError> {
        self.record(format!("add {triple}"));
        Ok(())
    }

    async fn build_release(&self, triple: TargetTriple, project_dir: &Path) -> Result<(), RunnerError> {
        self.record(format!("build {triple}"));
        match &self.behavior {
            BuildBehavior::Produce(bytes) => {
                let output = build_output_path(project_dir, triple);
                std::fs::create_dir_all(output.parent().unwrap()).unwrap();
                std::fs::write(&output, bytes).unwrap();
                Ok(())
            }
            BuildBehavior::Fail => Err(RunnerError::Build(format!(
                "cargo build --release --target {triple} exited with exit status: 101"
            ))),
            BuildBehavior::NoOutput => Ok(()),
        }
    }
}

pub fn triple(arch: &str, os: &str) -> TargetTriple {
    TargetTriple::from_host(arch, os).unwrap()
}

/// Write a `/bin/sh` script (not yet executable) at `path`
pub fn write_script(path: &Path, body: &str) -> PathBuf {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    path.to_path_buf()
}
