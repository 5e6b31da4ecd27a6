//! `unfsd` — the reference NFSv3 server daemon built on top of the
//! `nfs-mamont` library crate.
//!
//! Wires a concrete [`LocalFilesystem`] backend, the parsed exports table,
//! and the [`lifecycle`] supervisor together. Mirrors unfs3 `main()`'s
//! overall shape (see SPEC_FULL.md §4.5): parse options, daemonize if
//! requested, then hand off to the supervisor for the rest of the startup
//! sequence and the event loop.
//!
//! Forking happens here, in a plain synchronous `fn main`, deliberately
//! before any tokio runtime is built — see [`nfs_mamont::lifecycle::daemonize`]
//! for why that ordering matters.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use nfs_mamont::exports::ExportTable;
use nfs_mamont::local_fs::LocalFilesystem;
use nfs_mamont::{config, lifecycle};

fn main() -> ExitCode {
    let config = match config::parse(std::env::args()) {
        Ok(config) => config,
        Err(code) => return ExitCode::from(code.0 as u8),
    };

    if config.detach {
        // SAFETY: fork() is called before any other thread (tokio's
        // runtime included) exists in this process.
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            eprintln!("unfsd: fork failed: {}", std::io::Error::last_os_error());
            return ExitCode::FAILURE;
        }
        if pid > 0 {
            // Parent exits immediately; the child carries on as the daemon.
            return ExitCode::SUCCESS;
        }
        if let Err(e) = lifecycle::daemonize() {
            eprintln!("unfsd: daemonize failed: {e:?}");
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("unfsd: failed to start the async runtime: {e:?}");
            return ExitCode::FAILURE;
        }
    };

    lifecycle::install_logging(config.detach);

    let result = runtime.block_on(async move {
        let exports = if config.exports_file.exists() {
            Arc::new(ExportTable::parse(&config.exports_file)?)
        } else {
            Arc::new(ExportTable::empty())
        };
        let fs = LocalFilesystem::new(PathBuf::from("/"), exports.clone())?;
        lifecycle::run(config, fs, exports).await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("unfsd exiting: {e:?}");
            ExitCode::FAILURE
        }
    }
}
