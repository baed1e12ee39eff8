// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Fatal error reporting
//!
//! The only place a driver error reaches the user. Batches of graph errors
//! are printed one per line with a colored category prefix; everything else
//! is printed as a single message.

use colored::Colorize;
use miette::Diagnostic;
use std::io::{self, Write};

use super::DriverError;

/// Render an error report into `out`
pub fn write_report(err: &DriverError, out: &mut dyn Write) -> io::Result<()> {
    match err {
        DriverError::Graph { errors, .. } => {
            for error in errors {
                let prefix = if error.is_expected() {
                    "error:"
                } else {
                    "internal error:"
                };
                writeln!(out, "{} {}", prefix.red(), error)?;
            }
        }
        other => {
            writeln!(out, "{}", other)?;
            if let Some(help) = other.help() {
                writeln!(out, "  {} {}", "help:".dimmed(), help)?;
            }
        }
    }

    Ok(())
}

/// Report `err` on stderr and terminate the process with a failure status
pub fn fatal(err: &DriverError) -> ! {
    let stderr = io::stderr();
    let mut lock = stderr.lock();
    // Nothing left to report to if stderr itself is gone.
    let _ = write_report(err, &mut lock);
    let _ = lock.flush();
    std::process::exit(1)
}
