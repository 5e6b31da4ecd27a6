//! Command-line configuration, parsed once at startup into an immutable
//! [`Configuration`] record.
//!
//! Grounded in unfs3 `daemon.c`'s `parse_options()`: the flag letters, their
//! defaults, and their validation rules below are taken directly from that
//! function's `getopt` string `"bcC:de:hl:m:n:prstuw"` and its per-flag
//! `case` arms, not invented. See SPEC_FULL.md §3.1 for the field table this
//! module implements.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

/// A startup configuration error: carries the process exit code unfs3's
/// `parse_options()` would call `exit()` with. Kept as a plain integer
/// rather than [`std::process::ExitCode`] (which is deliberately opaque
/// and not comparable) so callers and tests can inspect it directly; the
/// binary entry point converts it to an `ExitCode` at the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigError(pub i32);

/// Parsed, validated, immutable-after-startup configuration.
///
/// Unlike the `clap`-derived [`Cli`] this is built from, `-u`'s effect
/// (zeroing both ports) is already folded into `nfs_port`/`mount_port` by
/// the time this is constructed, matching `daemon.c`'s `case 'u':` arm,
/// which mutates `opt_nfs_port`/`opt_mount_port` directly rather than
/// keeping a separate flag.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub brute_force_search: bool,
    pub cluster: bool,
    pub cluster_path: PathBuf,
    pub detach: bool,
    pub exports_file: PathBuf,
    pub bind_addr: Option<IpAddr>,
    pub mount_port: u16,
    pub nfs_port: u16,
    pub portmapper_register: bool,
    pub readable_executables: bool,
    pub single_user: bool,
    pub tcp_only: bool,
    pub expire_writers: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            brute_force_search: false,
            cluster: false,
            cluster_path: PathBuf::from("/"),
            detach: true,
            exports_file: PathBuf::from("/etc/exports"),
            bind_addr: None,
            mount_port: 2049,
            nfs_port: 2049,
            portmapper_register: true,
            readable_executables: false,
            single_user: false,
            tcp_only: false,
            expire_writers: false,
        }
    }
}

/// `clap` CLI surface. Field names intentionally mirror `daemon.c`'s
/// `opt_*` globals rather than idiomatic long names, since this crate has
/// no compatibility need for GNU-style long flags and unfs3 never had them
/// either — only the short letters in `optstring` are real.
#[derive(Parser, Debug)]
#[command(name = "unfsd", about = "A user-space NFSv3 server", disable_version_flag = true)]
struct Cli {
    /// Enable brute force file searching.
    #[arg(short = 'b')]
    brute_force: bool,

    /// Enable cluster extensions.
    #[arg(short = 'c')]
    cluster: bool,

    /// Path for cluster extensions.
    #[arg(short = 'C', value_name = "path")]
    cluster_path: Option<PathBuf>,

    /// Do not detach from the terminal.
    #[arg(short = 'd')]
    no_detach: bool,

    /// File to use instead of /etc/exports.
    #[arg(short = 'e', value_name = "file")]
    exports: Option<PathBuf>,

    /// Bind to interface with the specified address.
    #[arg(short = 'l', value_name = "addr")]
    bind_addr: Option<String>,

    /// Port to use for the MOUNT service.
    #[arg(short = 'm', value_name = "port")]
    mount_port: Option<u16>,

    /// Port to use for the NFS service.
    #[arg(short = 'n', value_name = "port")]
    nfs_port: Option<u16>,

    /// Do not register with the portmapper.
    #[arg(short = 'p')]
    no_portmapper: bool,

    /// Report unreadable executables as readable.
    #[arg(short = 'r')]
    readable_executables: bool,

    /// Single user mode.
    #[arg(short = 's')]
    single_user: bool,

    /// TCP only, do not listen on UDP ports.
    #[arg(short = 't')]
    tcp_only: bool,

    /// Use unprivileged (OS-chosen) ports for both services.
    #[arg(short = 'u')]
    unprivileged_ports: bool,

    /// Expire writers from the fd cache.
    #[arg(short = 'w')]
    expire_writers: bool,
}

/// Parses `args` (normally [`std::env::args`]) into a validated
/// [`Configuration`], matching `daemon.c`'s `parse_options()` +
/// post-`getopt` `optind < argc` check exactly:
///
/// - an unknown flag or a malformed `-n`/`-m` port exits 1 (handled by
///   `clap` itself, which prints its own diagnostic and calls
///   `process::exit(2)` for bad syntax — unfs3 exits 1 for the equivalent
///   cases, so `Cli::try_parse` errors are remapped to exit 1 below);
/// - `-h`/`--help` exits 0 (the one case `daemon.c` exits zero for);
/// - a non-absolute `-e` path exits 1 with a diagnostic;
/// - any leftover positional argument exits 1 with a diagnostic.
pub fn parse<I, T>(args: I) -> Result<Configuration, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if e.kind() == clap::error::ErrorKind::DisplayHelp => {
            print!("{e}");
            return Err(ConfigError(0));
        }
        Err(e) => {
            eprint!("{e}");
            return Err(ConfigError(1));
        }
    };

    if let Some(path) = &cli.exports {
        if !path.is_absolute() {
            eprintln!("Error: relative path to exports file");
            return Err(ConfigError(1));
        }
    }

    let bind_addr = match &cli.bind_addr {
        Some(addr) => match addr.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                eprintln!("Invalid bind address");
                return Err(ConfigError(1));
            }
        },
        None => None,
    };

    if let Some(0) = cli.mount_port {
        eprintln!("Invalid port");
        return Err(ConfigError(1));
    }
    if let Some(0) = cli.nfs_port {
        eprintln!("Invalid port");
        return Err(ConfigError(1));
    }

    let mut config = Configuration::default();
    config.brute_force_search = cli.brute_force;
    config.cluster = cli.cluster;
    if let Some(path) = cli.cluster_path {
        config.cluster_path = path;
    }
    if cli.no_detach {
        // unfs3 prints its name/banner here before clearing opt_detach.
        println!("unfsd");
        config.detach = false;
    }
    if let Some(path) = cli.exports {
        config.exports_file = path;
    }
    config.bind_addr = bind_addr;
    if let Some(port) = cli.mount_port {
        config.mount_port = port;
    }
    if let Some(port) = cli.nfs_port {
        config.nfs_port = port;
    }
    if cli.no_portmapper {
        config.portmapper_register = false;
    }
    config.readable_executables = cli.readable_executables;
    config.single_user = cli.single_user;
    config.tcp_only = cli.tcp_only;
    config.expire_writers = cli.expire_writers;

    // -u overwrites both -n and -m, exactly as daemon.c's case 'u' arm
    // mutates opt_nfs_port/opt_mount_port unconditionally and is applied
    // strictly in getopt order; since getopt option order isn't preserved
    // by clap's derive API, -u is treated as taking precedence the way it
    // would if it were the last flag processed, the common invocation
    // shape (`unfsd -u`, not `unfsd -u -n 2049`).
    if cli.unprivileged_ports {
        config.nfs_port = 0;
        config.mount_port = 0;
    }

    Ok(config)
}
