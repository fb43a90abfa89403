//! Read-only facts about the machine and the process environment.

use std::env;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::error::{Result, RuntimeError};

const FALLBACK_PAGE_SIZE: usize = 4096;

pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            FALLBACK_PAGE_SIZE
        }
    })
}

pub fn cpu_count() -> usize {
    match sys_info::cpu_num() {
        Ok(n) if n > 0 => n as usize,
        _ => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

pub fn memory_info() -> Result<MemoryInfo> {
    let info = sys_info::mem_info()
        .map_err(|e| RuntimeError::Config(format!("Failed to query memory info: {}", e)))?;
    // sys-info reports KiB
    Ok(MemoryInfo {
        total_bytes: info.total * 1024,
        available_bytes: info.avail * 1024,
    })
}

/// Non-empty value of an environment variable.
pub fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| RuntimeError::Config(format!("Invalid value '{}' for {}", raw, name))),
        None => Ok(None),
    }
}

/// Accepts `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(raw) = env_var(name) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(RuntimeError::Config(format!(
            "Invalid boolean '{}' for {}",
            raw, name
        ))),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimingReport {
    pub title: String,
    pub runs: Vec<Duration>,
}

impl TimingReport {
    pub fn median(&self) -> Duration {
        let mut sorted = self.runs.clone();
        sorted.sort();
        match sorted.len() {
            0 => Duration::ZERO,
            n if n % 2 == 1 => sorted[n / 2],
            n => (sorted[n / 2 - 1] + sorted[n / 2]) / 2,
        }
    }

    pub fn min(&self) -> Duration {
        self.runs.iter().min().copied().unwrap_or_default()
    }
}

/// Runs `f` `reps` times (at least once) and returns the last result with the timings.
pub fn time_reps<R>(title: &str, reps: usize, mut f: impl FnMut() -> R) -> (R, TimingReport) {
    let reps = reps.max(1);
    let mut runs = Vec::with_capacity(reps);

    let mut timed = || {
        let start = Instant::now();
        let result = f();
        runs.push(start.elapsed());
        result
    };
    let mut last = timed();
    for _ in 1..reps {
        last = timed();
    }

    let report = TimingReport {
        title: title.to_string(),
        runs,
    };
    tracing::info!(
        title,
        reps,
        median_us = report.median().as_micros() as u64,
        min_us = report.min().as_micros() as u64,
        "timing"
    );

    (last, report)
}
