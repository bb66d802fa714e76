//! Built-in diagnostic commands.
//!
//! `status`, `thread` and `file` report on the server process itself using
//! `/proc/self`. On hosts without procfs they fail, which the dispatcher
//! turns into an `Error: ...` response.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::dispatcher::CommandDispatcher;
use crate::error::RegistryError;

/// Clock ticks per second used by `/proc/<pid>/stat` time fields.
const USER_HZ: u64 = 100;

/// Register `echo`, `status`, `thread` and `file`.
pub fn register_default_commands(dispatcher: &mut CommandDispatcher) -> Result<(), RegistryError> {
    dispatcher.register("echo", echo)?;
    dispatcher.register("status", status)?;
    dispatcher.register("thread", thread)?;
    dispatcher.register("file", file)?;
    Ok(())
}

/// Liveness probe.
pub fn echo() -> Result<String, Infallible> {
    trace!(command = "echo", "running built-in command");
    Ok("Echo".to_string())
}

/// Peak resident memory and total CPU time of the server process.
pub fn status() -> io::Result<String> {
    trace!(command = "status", "running built-in command");

    let proc_status = read_proc("/proc/self/status")?;
    let peak_kib = status_field_kib(&proc_status, "VmHWM")
        .or_else(|| status_field_kib(&proc_status, "VmRSS"))
        .ok_or_else(|| invalid_data("/proc/self/status has no VmHWM field"))?;

    let stat = read_proc("/proc/self/stat")?;
    let task = TaskStat::parse(&stat).ok_or_else(|| invalid_data("unparsable /proc/self/stat"))?;

    let mut out = String::new();
    let _ = writeln!(out, "PeakWorkingSet: {}", group_thousands(peak_kib * 1024));
    let _ = writeln!(
        out,
        "TotalProcessorTime: {}",
        format_cpu_time(task.cpu_ticks())
    );
    Ok(out)
}

/// Every thread of the server process with its CPU time and state.
pub fn thread() -> io::Result<String> {
    trace!(command = "thread", "running built-in command");

    let mut tasks = Vec::new();
    for entry in std::fs::read_dir("/proc/self/task")? {
        let entry = entry?;
        // Threads may exit between listing and reading.
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        if let Some(task) = TaskStat::parse(&stat) {
            tasks.push(task);
        }
    }
    tasks.sort_by_key(|task| task.id);

    let mut out = String::new();
    let _ = writeln!(out, "Threads: {}", tasks.len());
    for task in &tasks {
        let _ = writeln!(
            out,
            "- Id:{}, Name:{}, TotalProcessorTime:{}, State:{}",
            task.id,
            task.name,
            format_cpu_time(task.cpu_ticks()),
            state_name(task.state)
        );
    }
    Ok(out)
}

/// The server executable and the shared objects mapped into it.
pub fn file() -> io::Result<String> {
    trace!(command = "file", "running built-in command");

    let mut paths = mapped_libraries(&read_proc("/proc/self/maps")?);
    paths.insert(std::env::current_exe()?);

    let mut entries: Vec<(String, PathBuf)> = paths
        .into_iter()
        .map(|path| (display_name(&path), path))
        .collect();
    entries.sort();

    let mut out = String::new();
    for (name, path) in entries {
        let _ = writeln!(out, "{name} ({})", path.display());
    }
    Ok(out)
}

fn read_proc(path: &str) -> io::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|err| io::Error::new(err.kind(), format!("{path}: {err}")))
}

fn invalid_data(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Value of a `Key:   1234 kB` line in `/proc/<pid>/status`.
fn status_field_kib(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let value = line.strip_prefix(key)?.strip_prefix(':')?;
        value.split_whitespace().next()?.parse().ok()
    })
}

/// The fields of `/proc/<pid>/task/<tid>/stat` the commands report.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TaskStat {
    id: u32,
    name: String,
    state: char,
    utime: u64,
    stime: u64,
}

impl TaskStat {
    /// Parse a stat line. The name is enclosed in the first `(` and the
    /// last `)`, since it may itself contain parentheses or spaces.
    fn parse(line: &str) -> Option<Self> {
        let open = line.find('(')?;
        let close = line.rfind(')')?;
        let id = line[..open].trim().parse().ok()?;
        let name = line.get(open + 1..close)?.to_string();

        // Fields after the name start at field 3 (state); utime and stime
        // are fields 14 and 15.
        let rest: Vec<&str> = line[close + 1..].split_whitespace().collect();
        let state = rest.first()?.chars().next()?;
        let utime = rest.get(11)?.parse().ok()?;
        let stime = rest.get(12)?.parse().ok()?;

        Some(Self {
            id,
            name,
            state,
            utime,
            stime,
        })
    }

    fn cpu_ticks(&self) -> u64 {
        self.utime + self.stime
    }
}

fn state_name(state: char) -> &'static str {
    match state {
        'R' => "Running",
        'S' => "Sleeping",
        'D' => "Waiting",
        'Z' => "Zombie",
        'T' => "Stopped",
        't' => "TracingStop",
        'X' | 'x' => "Dead",
        'I' => "Idle",
        _ => "Unknown",
    }
}

/// `12345678` → `12,345,678`.
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Clock ticks → `hh:mm:ss.fff`.
fn format_cpu_time(ticks: u64) -> String {
    let millis = ticks * 1000 / USER_HZ;
    let secs = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60,
        millis % 1000
    )
}

/// Shared objects named in a `/proc/<pid>/maps` listing.
fn mapped_libraries(maps: &str) -> BTreeSet<PathBuf> {
    maps.lines()
        .filter_map(|line| {
            // address perms offset dev inode pathname
            let path = line.splitn(6, char::is_whitespace).nth(5)?.trim();
            path.starts_with('/').then_some(path)
        })
        .filter(|path| is_shared_object(Path::new(path)))
        .map(PathBuf::from)
        .collect()
}

fn is_shared_object(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".so") || name.contains(".so."))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
