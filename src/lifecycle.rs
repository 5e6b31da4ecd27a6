//! Startup, signal handling, and shutdown: the lifecycle supervisor.
//!
//! Grounded in unfs3 `daemon.c`'s `main()` and `daemon_exit()`. The
//! supervisor owns the sequence described there: parse options, open
//! logging, create transports, register with the portmapper, daemonize,
//! install signal handlers, then run until a terminating signal arrives.
//! `daemonize()` is deliberately synchronous and kept separate from
//! [`run`] — see its doc comment for why.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::cache::{FdCache, FhCache};
use crate::config::Configuration;
use crate::exports::ExportTable;
use crate::protocol::rpc::ServerShared;
use crate::protocol::xdr::nfs3;
use crate::protocol::xdr::portmap::{IPPROTO_TCP, IPPROTO_UDP};
use crate::registration::{self, ServiceBinding};
use crate::tcp::{NFSTcp, NFSTcpListener};
use crate::udp::NFSUdpListener;
use crate::vfs::NFSFileSystem;

/// Process-wide state the signal handlers need a back-reference to,
/// matching unfs3's reliance on file-scope globals (`exports_opts`,
/// `fh_cache`, `fd_cache`) from within `daemon_exit()`. Built once during
/// startup and shared (via `Arc`) with the signal-handling tasks spawned
/// by [`install_signal_handlers`].
pub struct Supervisor {
    pub exports: Arc<ExportTable>,
    pub fh_cache: Arc<FhCache>,
    pub fd_cache: Arc<FdCache>,
    pub exports_file: std::path::PathBuf,
    pub expire_writers: bool,
    pub registered_bindings: std::sync::Mutex<Vec<ServiceBinding>>,
    vfs: Arc<dyn NFSFileSystem + Send + Sync>,
}

impl Supervisor {
    /// Takes the already-constructed export table rather than parsing its
    /// own, so the caller can hand the same `Arc<ExportTable>` to both the
    /// VFS backend and the supervisor: a SIGHUP reload must be visible to
    /// both the READDIR removable-media fallback and the MOUNT/EXPORT
    /// handlers, which only holds if they share one table instance.
    ///
    /// Also takes a handle to the backend so `shutdown()` can tear it down;
    /// the caller passes the same `Arc` it handed to the transports, so
    /// there is exactly one live backend instance per process.
    fn new(
        config: &Configuration,
        exports: Arc<ExportTable>,
        vfs: Arc<dyn NFSFileSystem + Send + Sync>,
    ) -> Self {
        Self {
            exports,
            fh_cache: Arc::new(FhCache::new()),
            fd_cache: Arc::new(FdCache::new()),
            exports_file: config.exports_file.clone(),
            expire_writers: config.expire_writers,
            registered_bindings: std::sync::Mutex::new(Vec::new()),
            vfs,
        }
    }

    /// SIGHUP: re-read the exports file in place. Matches unfs3's
    /// `daemon_exit(SIGHUP)` arm, which re-parses exports and squash ids
    /// and returns without touching any in-flight call (safe only because
    /// dispatch is otherwise single-threaded per connection and no call
    /// observes a half-updated table).
    fn reload(&self) {
        match self.exports.reload(&self.exports_file) {
            Ok(()) => info!("SIGHUP: reloaded exports from {:?}", self.exports_file),
            Err(e) => error!("SIGHUP: failed to reload exports from {:?}: {:?}", self.exports_file, e),
        }
    }

    /// SIGUSR1: log file-handle-cache and open-fd-cache diagnostics.
    fn log_stats(&self) {
        let fh = self.fh_cache.stats();
        let (readers, writers) = self.fd_cache.counts();
        info!(
            "cache stats: fh_cache max={} used={} hits={} misses={}; fd_cache readers={} writers={}",
            fh.max, fh.used, fh.hits, fh.misses, readers, writers
        );
    }

    /// Graceful teardown shared by SIGTERM/SIGINT/SIGQUIT and, after an
    /// emergency log line, by SIGSEGV. Idempotent: safe to call more than
    /// once if a second fatal signal arrives mid-teardown (unfs3's own
    /// `daemon_exit` has no re-entry guard either, but its teardown steps
    /// are all individually safe to repeat).
    async fn shutdown(&self) {
        let bindings = self.registered_bindings.lock().expect("bindings lock poisoned").clone();
        if !bindings.is_empty() {
            registration::unregister_all(&bindings).await;
        }
        self.fd_cache.purge();
        self.vfs.shutdown().await;
        info!("shutdown complete");
    }
}

/// Installs a `tracing` subscriber. When the daemon is about to detach
/// (`!config.detach` is false, i.e. the common case), log lines go out
/// line-buffered the way syslog would render them since this crate avoids
/// a `syslog` crate dependency (see DESIGN.md); in the foreground
/// (`-d`), output goes to stdout exactly as-is, matching unfs3's
/// `logmsg()` sink selection.
pub fn install_logging(detach: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if detach {
        builder.with_ansi(false).compact().init();
    } else {
        builder.init();
    }
}

/// Performs the daemonizing syscalls unfs3's `main()` runs right after
/// `fork()`: `setsid()` to drop the controlling terminal, `chdir("/")` so
/// the daemon doesn't pin whatever directory it was launched from, and
/// `umask(0)` so file modes created later aren't silently masked.
///
/// Deliberately synchronous and separate from [`run`]: `fork()` itself
/// must happen before a tokio runtime exists (forking a multi-threaded
/// process is unsafe once other threads, including the runtime's worker
/// threads, are running), so the binary entry point calls `fork()` and
/// this function from a plain `fn main()`, and only builds/enters the
/// tokio runtime afterward, in the child.
///
/// # Safety
/// Must be called after `fork()`, in the child, before any other thread
/// exists in the process.
pub fn daemonize() -> anyhow::Result<()> {
    // SAFETY: called immediately after fork() in the child, before any
    // tokio runtime or other threads exist.
    unsafe {
        if libc::setsid() < 0 {
            anyhow::bail!("setsid() failed: {}", std::io::Error::last_os_error());
        }
        if libc::chdir(c"/".as_ptr()) != 0 {
            anyhow::bail!("chdir(\"/\") failed: {}", std::io::Error::last_os_error());
        }
        libc::umask(0);

        // Detach standard streams from the original controlling terminal.
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
        if devnull >= 0 {
            libc::dup2(devnull, libc::STDIN_FILENO);
            libc::dup2(devnull, libc::STDOUT_FILENO);
            libc::dup2(devnull, libc::STDERR_FILENO);
            if devnull > libc::STDERR_FILENO {
                libc::close(devnull);
            }
        }
    }
    Ok(())
}

/// One pair of transports (TCP + UDP unless `tcp_only`) serving NFS3, and
/// a second pair serving MOUNT — reusing the NFS pair when the two
/// programs' ports coincide, matching §3.5's invariant.
struct Transports<T: NFSFileSystem + Send + Sync + 'static> {
    nfs_tcp: NFSTcpListener<T>,
    nfs_udp: Option<NFSUdpListener<T>>,
    mount_tcp: Option<NFSTcpListener<T>>,
    mount_udp: Option<NFSUdpListener<T>>,
    nfs_port: u16,
    mount_port: u16,
}

/// Creates the NFS and (if distinct) MOUNT transports per §4.1/§4.5 step
/// 5. Bind failure on an explicit port is fatal, matching unfs3's
/// `create_tcp_transport`/`create_udp_transport` failure paths.
async fn create_transports<T: NFSFileSystem + Send + Sync + 'static>(
    config: &Configuration,
    fs: T,
    exports: Arc<ExportTable>,
    write_verifier: nfs3::writeverf3,
) -> anyhow::Result<Transports<T>> {
    let bind_ip = config.bind_addr.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let nfs_addr = format!("{}:{}", bind_ip, config.nfs_port);
    let mut nfs_tcp = NFSTcpListener::bind(&nfs_addr, fs).await?;
    nfs_tcp.with_exports(exports.clone());
    nfs_tcp.with_write_verifier(write_verifier);
    let nfs_port = nfs_tcp.get_listen_port();

    let nfs_udp = if config.tcp_only {
        None
    } else {
        let udp_addr = format!("{}:{}", bind_ip, nfs_port);
        Some(NFSUdpListener::bind(&udp_addr, nfs_tcp.shared()).await?)
    };

    // When the resolved mount port equals the resolved NFS port, reuse the
    // NFS pair of transports instead of binding a second pair on the same
    // (protocol, port): the portmapper refuses to register two different
    // programs on one (protocol, port) unless they share a transport.
    let reuse_mount = config.mount_port != 0 && config.mount_port == config.nfs_port;
    let (mount_tcp, mount_udp, mount_port) = if reuse_mount {
        (None, None, nfs_port)
    } else {
        let mount_tcp =
            NFSTcpListener::bind_shared(&bind_ip.to_string(), config.mount_port, nfs_tcp.shared())
                .await?;
        let mount_port = mount_tcp.get_listen_port();
        let mount_udp = if config.tcp_only {
            None
        } else {
            let udp_addr = format!("{}:{}", bind_ip, mount_port);
            Some(NFSUdpListener::bind(&udp_addr, mount_tcp.shared()).await?)
        };
        (Some(mount_tcp), mount_udp, mount_port)
    };

    Ok(Transports { nfs_tcp, nfs_udp, mount_tcp, mount_udp, nfs_port, mount_port })
}

/// Builds the full set of (program, version, protocol, port) bindings
/// this daemon needs registered, for both TCP and UDP.
fn bindings_for(nfs_port: u16, mount_port: u16, tcp_only: bool) -> Vec<ServiceBinding> {
    let mut bindings = registration::service_bindings(IPPROTO_TCP, nfs_port, mount_port);
    if !tcp_only {
        bindings.extend(registration::service_bindings(IPPROTO_UDP, nfs_port, mount_port));
    }
    bindings
}

/// Installs the signal handlers described in §4.5: SIGHUP reloads,
/// SIGUSR1 logs cache stats, SIGTERM/SIGINT/SIGQUIT perform graceful
/// shutdown, SIGSEGV logs an emergency line then does the same teardown,
/// and SIGPIPE/SIGUSR2/SIGALRM are ignored. One `tokio::select!` arm per
/// signal rather than unfs3's single `daemon_exit(int sig)` switch,
/// matching SPEC_FULL.md's resolved Open Question: Rust's signal streams
/// are already split per signal number, so there is no reason to funnel
/// them back through one dispatch function.
async fn run_signal_loop(supervisor: Arc<Supervisor>) -> anyhow::Result<()> {
    let mut hup = signal(SignalKind::hangup())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut segv = signal(SignalKind::from_raw(libc::SIGSEGV))?;
    // Ignored signals: register streams so the default disposition (which
    // would otherwise terminate the process for some of these) is
    // replaced, but never act on receipt.
    let mut pipe = signal(SignalKind::pipe())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut alrm = signal(SignalKind::alarm())?;

    loop {
        tokio::select! {
            _ = hup.recv() => {
                info!("SIGHUP received, reloading exports");
                supervisor.reload();
            }
            _ = usr1.recv() => {
                supervisor.log_stats();
            }
            _ = term.recv() => {
                info!("SIGTERM received, shutting down");
                supervisor.shutdown().await;
                return Ok(());
            }
            _ = int.recv() => {
                info!("SIGINT received, shutting down");
                supervisor.shutdown().await;
                return Ok(());
            }
            _ = quit.recv() => {
                info!("SIGQUIT received, shutting down");
                supervisor.shutdown().await;
                return Ok(());
            }
            _ = segv.recv() => {
                error!("SIGSEGV received, emergency shutdown");
                supervisor.shutdown().await;
                return Ok(());
            }
            _ = pipe.recv() => {}
            _ = usr2.recv() => {}
            _ = alrm.recv() => {}
        }
    }
}

/// Runs the lifecycle supervisor to completion: creates transports,
/// registers with the portmapper, installs signal handlers, and serves
/// forever until a terminating signal is delivered. Must run inside a
/// tokio runtime already built in the (possibly daemonized) process —
/// see [`daemonize`] for why forking happens earlier.
pub async fn run<T: NFSFileSystem + Send + Sync + 'static>(
    config: Configuration,
    fs: T,
    exports: Arc<ExportTable>,
) -> anyhow::Result<()> {
    let write_verifier = crate::write_verifier::regenerate();

    if config.single_user {
        // SAFETY: getuid() has no preconditions.
        if unsafe { libc::geteuid() } == 0 {
            warn!("running as root in single-user mode");
        }
    }

    let transports = create_transports(&config, fs, exports.clone(), write_verifier).await?;
    let vfs = transports.nfs_tcp.shared().vfs.clone();
    let supervisor = Arc::new(Supervisor::new(&config, exports, vfs));

    if config.portmapper_register {
        let bindings = bindings_for(transports.nfs_port, transports.mount_port, config.tcp_only);
        registration::register_all(&bindings).await?;
        *supervisor.registered_bindings.lock().expect("bindings lock poisoned") = bindings;
    } else {
        info!("skipping portmapper registration (-p)");
    }

    if supervisor.expire_writers {
        let fd_cache = supervisor.fd_cache.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(crate::cache::WRITER_IDLE_TIMEOUT).await;
                fd_cache.purge();
            }
        });
    }

    let signal_loop = tokio::spawn(run_signal_loop(supervisor.clone()));

    let Transports { nfs_tcp, nfs_udp, mount_tcp, mount_udp, .. } = transports;
    let mut serve_tasks = Vec::new();
    serve_tasks.push(tokio::spawn(async move { nfs_tcp.handle_forever().await }));
    if let Some(udp) = nfs_udp {
        serve_tasks.push(tokio::spawn(async move { udp.handle_forever().await }));
    }
    if let Some(tcp) = mount_tcp {
        serve_tasks.push(tokio::spawn(async move { tcp.handle_forever().await }));
    }
    if let Some(udp) = mount_udp {
        serve_tasks.push(tokio::spawn(async move { udp.handle_forever().await }));
    }

    tokio::select! {
        res = signal_loop => {
            res??;
        }
        res = futures::future::select_all(serve_tasks) => {
            let (result, _, _) = res;
            result??;
            anyhow::bail!("event loop returned unexpectedly");
        }
    }
    Ok(())
}
