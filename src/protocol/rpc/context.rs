//! RPC context implementation for maintaining server and client state.
//!
//! The Context module provides the state management infrastructure needed for
//! handling RPC requests. It encapsulates all information required for:
//!
//! - Client identification and authentication
//! - Access to file system resources
//! - Tracking of client sessions and requests
//! - Mount status monitoring
//!
//! This module serves as a bridge between the RPC layer and the underlying
//! file system, providing each protocol handler with the information it needs
//! to process requests correctly in accordance with client permissions and
//! server configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;

use crate::exports::ExportTable;
use crate::protocol::nfs::portmap::PortmapTable;
use crate::protocol::xdr;
use crate::protocol::xdr::nfs3;
use crate::vfs;

/// Tracks which directory paths each client currently has mounted, backing
/// the MOUNT DUMP procedure (RFC 1813 Appendix I.4.3).
pub type MountTable = Mutex<HashMap<String, std::collections::HashSet<String>>>;

/// Which kind of socket a call arrived on. Handlers consult this through
/// [`Context::is_datagram`] to enforce transport-specific limits such as
/// READ's UDP reply ceiling (RFC 1813 section 3.3.6 note on `READ3resok`
/// sizing for datagram transports).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Stream,
    Datagram,
}

/// Represents the execution context for RPC operations
///
/// The Context structure encapsulates all the state information needed to process
/// an RPC request, including client identification, authentication credentials,
/// server configuration, and access to the virtual file system.
///
/// This context is passed to all protocol handlers (NFS, MOUNT, PORTMAP), providing
/// them with the information necessary to authenticate, authorize, and execute
/// requested operations. It serves as a bridge between the RPC layer and the
/// underlying file system implementation.
///
/// Each RPC connection maintains its own Context instance, ensuring proper isolation
/// between different client sessions and enabling accurate tracking of client state.
#[derive(Clone)]
pub struct Context {
    /// Port number on which the server is listening
    pub local_port: u16,

    /// Client's network address (IP:port) used for logging and request tracking
    pub client_addr: String,

    /// Whether this call arrived over a stream or datagram socket. See
    /// [`Context::is_datagram`].
    pub socket_kind: SocketKind,

    /// UNIX-style authentication credentials from the client
    /// Contains user ID, group IDs, and other identity information
    pub auth: xdr::rpc::auth_unix,

    /// Virtual File System implementation that handles actual file operations
    /// Abstracts the underlying storage system for NFS operations
    pub vfs: Arc<dyn vfs::NFSFileSystem + Send + Sync>,

    /// Channel for sending mount/unmount notifications
    /// Used to track file system mount status changes
    pub mount_signal: Option<mpsc::Sender<bool>>,

    /// Name of the exported file system available to clients
    pub export_name: Arc<String>,

    /// Transaction state tracker for handling retransmissions
    /// Maintains idempotency by detecting duplicate RPC calls
    pub transaction_tracker: Arc<super::TransactionTracker>,

    /// Portmap table storing port-to-program mappings
    /// (like a portmap service)
    pub portmap_table: Arc<RwLock<PortmapTable>>,

    /// Parsed export table, reloadable on SIGHUP
    pub exports: Arc<ExportTable>,

    /// Currently mounted (client_addr -> set of exported dirpaths), used
    /// to answer the MOUNT DUMP procedure
    pub mount_table: Arc<MountTable>,

    /// Process-wide write verifier, regenerated once at startup. Distinct
    /// from the per-directory cookie verifier and from the VFS generation
    /// number.
    pub write_verifier: nfs3::writeverf3,
}

impl Context {
    /// The socket-type inspection helper: reports whether the current
    /// call arrived on a datagram socket, so handlers can enforce the
    /// protocol-mandated UDP reply ceiling (READ clamps its requested
    /// count to it; see `protocol/nfs/v3/read.rs`).
    pub fn is_datagram(&self) -> bool {
        self.socket_kind == SocketKind::Datagram
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("rpc::Context")
            .field("local_port", &self.local_port)
            .field("client_addr", &self.client_addr)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Bundles the Arc-wrapped state shared by every connection/datagram a
/// transport serves, so the TCP and UDP transports can build a
/// per-exchange [`Context`] the same way without duplicating field lists.
#[derive(Clone)]
pub struct ServerShared<T: vfs::NFSFileSystem + Send + Sync + 'static> {
    pub vfs: Arc<T>,
    pub mount_signal: Option<mpsc::Sender<bool>>,
    pub export_name: Arc<String>,
    pub transaction_tracker: Arc<super::TransactionTracker>,
    pub portmap_table: Arc<RwLock<PortmapTable>>,
    pub exports: Arc<ExportTable>,
    pub mount_table: Arc<MountTable>,
    pub write_verifier: nfs3::writeverf3,
}

impl<T: vfs::NFSFileSystem + Send + Sync + 'static> ServerShared<T> {
    /// Builds a [`Context`] for a single connection (TCP) or datagram
    /// (UDP) arriving on `local_port` from `client_addr`.
    pub fn context_for(
        &self,
        local_port: u16,
        client_addr: String,
        socket_kind: SocketKind,
    ) -> Context {
        Context {
            local_port,
            client_addr,
            socket_kind,
            auth: xdr::rpc::auth_unix::default(),
            vfs: self.vfs.clone(),
            mount_signal: self.mount_signal.clone(),
            export_name: self.export_name.clone(),
            transaction_tracker: self.transaction_tracker.clone(),
            portmap_table: self.portmap_table.clone(),
            exports: self.exports.clone(),
            mount_table: self.mount_table.clone(),
            write_verifier: self.write_verifier,
        }
    }
}
