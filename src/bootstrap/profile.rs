// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Diagnostic capture for a run
//!
//! Each session is a guard: dropping it stops the capture and flushes what
//! was recorded, so early returns and error paths are covered too.

use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysinfo::{
    get_current_pid, Pid, ProcessRefreshKind, ProcessesToUpdate, System,
    MINIMUM_CPU_UPDATE_INTERVAL,
};
use tracing::subscriber::DefaultGuard;
use tracing::warn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::errors::{DriverError, DriverResult, ProfileKind};

/// Interval between CPU samples
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Serialize)]
struct CpuSample {
    elapsed_ms: u64,
    cpu_percent: f32,
    rss_bytes: u64,
}

#[derive(Debug, Serialize)]
struct HeapSnapshot {
    pid: u32,
    resident_bytes: u64,
    virtual_bytes: u64,
}

fn current_pid() -> io::Result<Pid> {
    get_current_pid().map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

fn refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().with_cpu().with_memory()
}

/// Background sampler writing one JSON line per sample
pub struct CpuProfile {
    path: PathBuf,
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<io::Result<()>>>,
}

impl CpuProfile {
    pub fn start(path: &Path, interval: Duration) -> DriverResult<Self> {
        let open_error = |source| DriverError::OpenProfile {
            kind: ProfileKind::Cpu,
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(open_error)?;
        let (tx, rx) = mpsc::channel();
        let interval = interval.max(MINIMUM_CPU_UPDATE_INTERVAL);

        let handle = thread::Builder::new()
            .name("cpuprofile".into())
            .spawn(move || sample(file, rx, interval))
            .map_err(open_error)?;

        Ok(Self {
            path: path.to_path_buf(),
            stop: Some(tx),
            handle: Some(handle),
        })
    }

    /// Stop sampling and report any write failure
    pub fn stop(mut self) -> DriverResult<()> {
        self.finish()
    }

    fn finish(&mut self) -> DriverResult<()> {
        drop(self.stop.take());
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let result = handle.join().unwrap_or_else(|_| {
            Err(io::Error::new(io::ErrorKind::Other, "sampler thread panicked"))
        });
        result.map_err(|source| DriverError::WriteProfile {
            kind: ProfileKind::Cpu,
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for CpuProfile {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(error = %e, "CPU profile is incomplete");
        }
    }
}

fn sample(file: File, stop: mpsc::Receiver<()>, interval: Duration) -> io::Result<()> {
    let mut out = BufWriter::new(file);
    let pid = current_pid()?;
    let mut system = System::new();
    let started = Instant::now();

    loop {
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh_kind());
        if let Some(process) = system.process(pid) {
            let sample = CpuSample {
                elapsed_ms: started.elapsed().as_millis() as u64,
                cpu_percent: process.cpu_usage(),
                rss_bytes: process.memory(),
            };
            serde_json::to_writer(&mut out, &sample)?;
            out.write_all(b"\n")?;
        }

        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    out.flush()
}

/// Scoped subscriber that also records span timings into a trace file
pub struct TraceSession {
    _guard: DefaultGuard,
}

impl TraceSession {
    pub fn start(path: &Path, console_filter: &str) -> DriverResult<Self> {
        let file = File::create(path).map_err(|source| DriverError::OpenProfile {
            kind: ProfileKind::Trace,
            path: path.to_path_buf(),
            source,
        })?;

        let trace_layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(EnvFilter::new("stagegen=trace"));

        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(io::stderr)
            .with_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(console_filter)),
            );

        let subscriber = tracing_subscriber::registry()
            .with(trace_layer)
            .with(console_layer);

        Ok(Self {
            _guard: tracing::subscriber::set_default(subscriber),
        })
    }
}

/// Write a single snapshot of the process's memory use
pub fn write_heap_profile(path: &Path) -> DriverResult<()> {
    let file = File::create(path).map_err(|source| DriverError::OpenProfile {
        kind: ProfileKind::Memory,
        path: path.to_path_buf(),
        source,
    })?;

    let write_error = |source| DriverError::WriteProfile {
        kind: ProfileKind::Memory,
        path: path.to_path_buf(),
        source,
    };

    let pid = current_pid().map_err(write_error)?;
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh_kind());

    let snapshot = system
        .process(pid)
        .map(|p| HeapSnapshot {
            pid: pid.as_u32(),
            resident_bytes: p.memory(),
            virtual_bytes: p.virtual_memory(),
        })
        .unwrap_or(HeapSnapshot {
            pid: pid.as_u32(),
            resident_bytes: 0,
            virtual_bytes: 0,
        });

    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &snapshot)
        .map_err(io::Error::from)
        .and_then(|_| out.write_all(b"\n"))
        .and_then(|_| out.flush())
        .map_err(write_error)
}
