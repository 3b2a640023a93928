//! Host boundary for program execution
//!
//! Every side effect a Forge program can cause goes through [`Host`]. The
//! evaluator calls these methods synchronously; a blocking call is the
//! point where a script waits for the outside world.
//!
//! [`SystemHost`] talks to the real machine. [`MemoryHost`] is fully
//! scripted and deterministic, for tests and embedding.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::Command;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub type HostResult<T> = Result<T, HostError>;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Random source failure")]
    Random,

    #[error("Unsupported by this host: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/plain".to_string()),
            body: body.into().into_bytes(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub size: u64,
    pub is_file: bool,
    pub is_dir: bool,
    /// Milliseconds since the Unix epoch, when known
    pub modified: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    pub cores: usize,
    pub cpu_usage: f32,
    pub cpu_model: String,
    pub os_name: String,
    pub os_version: String,
    pub arch: String,
    pub total_memory: u64,
}

/// Side effects available to a running program
pub trait Host {
    fn write_out(&mut self, line: &str);
    fn write_err(&mut self, line: &str);
    /// Show `prompt` and read one line; `None` at end of input
    fn read_line(&mut self, prompt: &str) -> HostResult<Option<String>>;

    fn read_file(&mut self, path: &str) -> HostResult<String>;
    fn write_file(&mut self, path: &str, content: &str, append: bool) -> HostResult<()>;
    /// Returns false when there was nothing to delete
    fn delete_file(&mut self, path: &str) -> HostResult<bool>;
    fn exists(&mut self, path: &str) -> bool;
    fn file_info(&mut self, path: &str) -> HostResult<FileInfo>;
    fn copy_file(&mut self, from: &str, to: &str) -> HostResult<()>;
    fn move_file(&mut self, from: &str, to: &str) -> HostResult<()>;
    fn create_dir(&mut self, path: &str) -> HostResult<()>;
    fn list_dir(&mut self, path: &str) -> HostResult<Vec<String>>;

    fn http(&mut self, request: &HttpRequest) -> HostResult<HttpResponse>;

    fn exec(&mut self, command: &str) -> HostResult<ExecOutput>;
    /// Start a command without waiting; failures are logged, never returned
    fn exec_detached(&mut self, command: &str);
    fn pid(&self) -> u32;
    fn kill(&mut self, pid: u32) -> HostResult<bool>;
    fn system_info(&mut self) -> SystemInfo;

    fn random_bytes(&mut self, buf: &mut [u8]) -> HostResult<()>;
    fn sleep(&mut self, ms: u64);
    fn now_ms(&self) -> i64;
}

//==============================================================================
// SystemHost
//==============================================================================

/// Host backed by the real process, filesystem and network
pub struct SystemHost {
    rng: SystemRandom,
    system: Option<sysinfo::System>,
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
            system: None,
        }
    }
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

fn run_shell(command: &str) -> HostResult<ExecOutput> {
    let output = shell(command).output()?;
    Ok(ExecOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn epoch_ms(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as i64)
}

fn ureq_error(err: ureq::Error) -> HostError {
    HostError::Http(err.to_string())
}

impl Host for SystemHost {
    fn write_out(&mut self, line: &str) {
        println!("{}", line);
    }

    fn write_err(&mut self, line: &str) {
        eprintln!("{}", line);
    }

    fn read_line(&mut self, prompt: &str) -> HostResult<Option<String>> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn read_file(&mut self, path: &str) -> HostResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write_file(&mut self, path: &str, content: &str, append: bool) -> HostResult<()> {
        if append {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            file.write_all(content.as_bytes())?;
        } else {
            std::fs::write(path, content)?;
        }
        Ok(())
    }

    fn delete_file(&mut self, path: &str) -> HostResult<bool> {
        let target = Path::new(path);
        if !target.exists() {
            return Ok(false);
        }
        if target.is_dir() {
            std::fs::remove_dir_all(target)?;
        } else {
            std::fs::remove_file(target)?;
        }
        Ok(true)
    }

    fn exists(&mut self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn file_info(&mut self, path: &str) -> HostResult<FileInfo> {
        let meta = std::fs::metadata(path)?;
        Ok(FileInfo {
            size: meta.len(),
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            modified: meta.modified().ok().and_then(epoch_ms),
        })
    }

    fn copy_file(&mut self, from: &str, to: &str) -> HostResult<()> {
        std::fs::copy(from, to)?;
        Ok(())
    }

    fn move_file(&mut self, from: &str, to: &str) -> HostResult<()> {
        std::fs::rename(from, to)?;
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> HostResult<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    fn list_dir(&mut self, path: &str) -> HostResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn http(&mut self, request: &HttpRequest) -> HostResult<HttpResponse> {
        let result = match request.method {
            HttpMethod::Get => ureq::get(&request.url).call(),
            HttpMethod::Head => ureq::head(&request.url).call(),
            HttpMethod::Post => {
                let content_type = request
                    .content_type
                    .as_deref()
                    .unwrap_or("application/octet-stream");
                let body = request.body.clone().unwrap_or_default();
                ureq::post(&request.url)
                    .header("Content-Type", content_type)
                    .send(&body[..])
            }
        };
        let mut response = result.map_err(ureq_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = if request.method == HttpMethod::Head {
            Vec::new()
        } else {
            response.body_mut().read_to_vec().map_err(ureq_error)?
        };
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }

    fn exec(&mut self, command: &str) -> HostResult<ExecOutput> {
        run_shell(command)
    }

    fn exec_detached(&mut self, command: &str) {
        let command = command.to_string();
        std::thread::spawn(move || match run_shell(&command) {
            Ok(out) if out.status != 0 => {
                warn!(%command, status = out.status, stderr = %out.stderr.trim(), "background command failed");
            }
            Ok(_) => {}
            Err(err) => warn!(%command, error = %err, "background command could not start"),
        });
    }

    fn pid(&self) -> u32 {
        std::process::id()
    }

    fn kill(&mut self, pid: u32) -> HostResult<bool> {
        let status = if cfg!(windows) {
            Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F"])
                .status()?
        } else {
            Command::new("kill").arg(pid.to_string()).status()?
        };
        Ok(status.success())
    }

    fn system_info(&mut self) -> SystemInfo {
        let system = self.system.get_or_insert_with(sysinfo::System::new);
        system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_all();
        system.refresh_memory();
        let cores = match system.cpus().len() {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        SystemInfo {
            cores,
            cpu_usage: system.global_cpu_usage(),
            cpu_model: system
                .cpus()
                .first()
                .map(|c| c.brand().trim().to_string())
                .unwrap_or_default(),
            os_name: sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: sysinfo::System::os_version().unwrap_or_default(),
            arch: std::env::consts::ARCH.to_string(),
            total_memory: system.total_memory(),
        }
    }

    fn random_bytes(&mut self, buf: &mut [u8]) -> HostResult<()> {
        self.rng.fill(buf).map_err(|_| HostError::Random)
    }

    fn sleep(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn now_ms(&self) -> i64 {
        epoch_ms(SystemTime::now()).unwrap_or(0)
    }
}

//==============================================================================
// MemoryHost
//==============================================================================

/// Scripted host: canned input, captured output, in-memory files
#[derive(Debug, Clone)]
pub struct MemoryHost {
    pub input: VecDeque<String>,
    pub output: Vec<String>,
    pub errors: Vec<String>,
    pub prompts: Vec<String>,
    pub files: BTreeMap<String, String>,
    pub dirs: BTreeSet<String>,
    pub responses: HashMap<String, HttpResponse>,
    pub requests: Vec<HttpRequest>,
    pub commands: HashMap<String, ExecOutput>,
    pub executed: Vec<String>,
    pub killed: Vec<u32>,
    pub sleeps: Vec<u64>,
    pub system: SystemInfo,
    clock_ms: i64,
    rng_state: u64,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Clock start: 2023-11-14T22:13:20Z
    pub const EPOCH_MS: i64 = 1_700_000_000_000;

    pub fn new() -> Self {
        Self {
            input: VecDeque::new(),
            output: Vec::new(),
            errors: Vec::new(),
            prompts: Vec::new(),
            files: BTreeMap::new(),
            dirs: BTreeSet::new(),
            responses: HashMap::new(),
            requests: Vec::new(),
            commands: HashMap::new(),
            executed: Vec::new(),
            killed: Vec::new(),
            sleeps: Vec::new(),
            system: SystemInfo {
                cores: 4,
                cpu_usage: 12.5,
                cpu_model: "Memory CPU".to_string(),
                os_name: "MemoryOS".to_string(),
                os_version: "1.0".to_string(),
                arch: "x86_64".to_string(),
                total_memory: 8 * 1024 * 1024 * 1024,
            },
            clock_ms: Self::EPOCH_MS,
            rng_state: 0x9E37_79B9_7F4A_7C15,
        }
    }

    pub fn with_input<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn with_response(mut self, url: &str, response: HttpResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn with_command(mut self, command: &str, output: ExecOutput) -> Self {
        self.commands.insert(command.to_string(), output);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_state = seed.max(1);
        self
    }

    fn next_random(&mut self) -> u64 {
        // xorshift64
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        x
    }

    fn parent_dir(path: &str) -> Option<&str> {
        path.rfind('/').map(|i| &path[..i]).filter(|p| !p.is_empty())
    }
}

impl Host for MemoryHost {
    fn write_out(&mut self, line: &str) {
        self.output.push(line.to_string());
    }

    fn write_err(&mut self, line: &str) {
        self.errors.push(line.to_string());
    }

    fn read_line(&mut self, prompt: &str) -> HostResult<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.input.pop_front())
    }

    fn read_file(&mut self, path: &str) -> HostResult<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.to_string()))
    }

    fn write_file(&mut self, path: &str, content: &str, append: bool) -> HostResult<()> {
        let entry = self.files.entry(path.to_string()).or_default();
        if !append {
            entry.clear();
        }
        entry.push_str(content);
        Ok(())
    }

    fn delete_file(&mut self, path: &str) -> HostResult<bool> {
        Ok(self.files.remove(path).is_some() || self.dirs.remove(path))
    }

    fn exists(&mut self, path: &str) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path)
    }

    fn file_info(&mut self, path: &str) -> HostResult<FileInfo> {
        if let Some(content) = self.files.get(path) {
            return Ok(FileInfo {
                size: content.len() as u64,
                is_file: true,
                is_dir: false,
                modified: Some(self.clock_ms),
            });
        }
        if self.dirs.contains(path) {
            return Ok(FileInfo {
                size: 0,
                is_file: false,
                is_dir: true,
                modified: Some(self.clock_ms),
            });
        }
        Err(HostError::NotFound(path.to_string()))
    }

    fn copy_file(&mut self, from: &str, to: &str) -> HostResult<()> {
        let content = self.read_file(from)?;
        self.files.insert(to.to_string(), content);
        Ok(())
    }

    fn move_file(&mut self, from: &str, to: &str) -> HostResult<()> {
        let content = self
            .files
            .remove(from)
            .ok_or_else(|| HostError::NotFound(from.to_string()))?;
        self.files.insert(to.to_string(), content);
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> HostResult<()> {
        let mut current = Some(path.trim_end_matches('/'));
        while let Some(dir) = current {
            self.dirs.insert(dir.to_string());
            current = Self::parent_dir(dir);
        }
        Ok(())
    }

    fn list_dir(&mut self, path: &str) -> HostResult<Vec<String>> {
        let dir = path.trim_end_matches('/');
        if !self.dirs.contains(dir) {
            return Err(HostError::NotFound(path.to_string()));
        }
        let prefix = format!("{}/", dir);
        let mut names: BTreeSet<String> = BTreeSet::new();
        for key in self.files.keys().chain(self.dirs.iter()) {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if let Some(name) = rest.split('/').next().filter(|n| !n.is_empty()) {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    fn http(&mut self, request: &HttpRequest) -> HostResult<HttpResponse> {
        self.requests.push(request.clone());
        self.responses
            .get(&request.url)
            .cloned()
            .ok_or_else(|| HostError::Http(format!("no route to {}", request.url)))
    }

    fn exec(&mut self, command: &str) -> HostResult<ExecOutput> {
        self.executed.push(command.to_string());
        self.commands
            .get(command)
            .cloned()
            .ok_or_else(|| HostError::Process(format!("unknown command: {}", command)))
    }

    fn exec_detached(&mut self, command: &str) {
        self.executed.push(command.to_string());
        if !self.commands.contains_key(command) {
            warn!(%command, "background command could not start");
        }
    }

    fn pid(&self) -> u32 {
        4242
    }

    fn kill(&mut self, pid: u32) -> HostResult<bool> {
        self.killed.push(pid);
        Ok(true)
    }

    fn system_info(&mut self) -> SystemInfo {
        self.system.clone()
    }

    fn random_bytes(&mut self, buf: &mut [u8]) -> HostResult<()> {
        for chunk in buf.chunks_mut(8) {
            let bytes = self.next_random().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
        Ok(())
    }

    fn sleep(&mut self, ms: u64) {
        self.sleeps.push(ms);
        self.clock_ms += ms as i64;
    }

    fn now_ms(&self) -> i64 {
        self.clock_ms
    }
}
