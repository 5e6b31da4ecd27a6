//! Portmapper *registration client*.
//!
//! `protocol::nfs::portmap` answers portmap queries as a server (useful when
//! nothing else on the host is listening on port 111). This module is the
//! other half: on startup the daemon dials the system's real rpcbind/portmap
//! service at `127.0.0.1:111` and registers itself, exactly as unfs3's
//! `register_nfs_service`/`register_mount_service` do via `pmap_unset`
//! followed by `pmap_set`. It reuses the same RPC call/reply codec the
//! dispatcher itself serves (`protocol::xdr::rpc`, `protocol::xdr::portmap`)
//! in a client role.

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::protocol::xdr::portmap::{self, mapping, PortmapProgram};
use crate::protocol::xdr::rpc::{
    accept_body, call_body, opaque_auth, reply_body, rpc_body, rpc_msg,
};
use crate::protocol::xdr::{deserialize, Serialize};

/// Well-known port the system rpcbind/portmapper listens on.
const PORTMAPPER_PORT: u16 = 111;

/// How long to wait for a portmapper reply before treating it as
/// unreachable (no system rpcbind running).
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// One (program, version, protocol, port) tuple this daemon answers for and
/// wants registered with the system portmapper.
#[derive(Debug, Clone, Copy)]
pub struct ServiceBinding {
    pub prog: u32,
    pub vers: u32,
    pub prot: u32,
    pub port: u16,
}

impl ServiceBinding {
    fn mapping(&self) -> mapping {
        mapping { prog: self.prog, vers: self.vers, prot: self.prot, port: self.port as u32 }
    }
}

/// Builds the full set of bindings this daemon needs registered for one
/// transport protocol (`IPPROTO_TCP` or `IPPROTO_UDP`), given the port the
/// NFS3 program and the port the MOUNT program are reachable on for that
/// protocol. MOUNT is registered under both version 1 and 3, matching
/// unfs3's `register_mount_service` (some clients still probe MOUNT v1).
pub fn service_bindings(prot: u32, nfs_port: u16, mount_port: u16) -> Vec<ServiceBinding> {
    vec![
        ServiceBinding {
            prog: crate::protocol::xdr::nfs3::PROGRAM,
            vers: crate::protocol::xdr::nfs3::VERSION,
            prot,
            port: nfs_port,
        },
        ServiceBinding {
            prog: crate::protocol::xdr::mount::PROGRAM,
            vers: 1,
            prot,
            port: mount_port,
        },
        ServiceBinding {
            prog: crate::protocol::xdr::mount::PROGRAM,
            vers: crate::protocol::xdr::mount::VERSION,
            prot,
            port: mount_port,
        },
    ]
}

/// Registers every binding with the system portmapper: `pmap_unset` first
/// to clear a stale registration left by a crashed previous instance, then
/// `pmap_set`. Returns an error on the first binding that cannot be
/// registered (an unreachable or refusing portmapper is always fatal here;
/// the caller decides whether to skip calling this function entirely when
/// running without portmapper support).
pub async fn register_all(bindings: &[ServiceBinding]) -> anyhow::Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let portmapper: SocketAddr = (std::net::Ipv4Addr::LOCALHOST, PORTMAPPER_PORT).into();
    socket.connect(portmapper).await?;

    for binding in bindings {
        let map = binding.mapping();
        let _ = call(&socket, PortmapProgram::PMAPPROC_UNSET, map, 1).await;
        let set_xid = 2;
        let registered = call(&socket, PortmapProgram::PMAPPROC_SET, map, set_xid).await?;
        if !registered {
            anyhow::bail!(
                "portmapper refused to register program {} version {} protocol {} port {}",
                binding.prog,
                binding.vers,
                binding.prot,
                binding.port
            );
        }
        info!(
            "registered program {} version {} protocol {} on port {} with the portmapper",
            binding.prog, binding.vers, binding.prot, binding.port
        );
    }
    Ok(())
}

/// Best-effort teardown counterpart to [`register_all`], called during
/// graceful shutdown. Failures are logged, never fatal: the process is
/// already on its way out.
pub async fn unregister_all(bindings: &[ServiceBinding]) {
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
        warn!("could not open a socket to unregister from the portmapper");
        return;
    };
    let portmapper: SocketAddr = (std::net::Ipv4Addr::LOCALHOST, PORTMAPPER_PORT).into();
    if socket.connect(portmapper).await.is_err() {
        warn!("portmapper unreachable during shutdown, leaving stale registrations");
        return;
    }
    for binding in bindings {
        let map = binding.mapping();
        if let Err(e) = call(&socket, PortmapProgram::PMAPPROC_UNSET, map, 1).await {
            warn!(
                "failed to unregister program {} version {} from the portmapper: {:?}",
                binding.prog, binding.vers, e
            );
        }
    }
}

/// Sends one portmap call and decodes the boolean result that
/// PMAPPROC_SET/PMAPPROC_UNSET both return.
async fn call(
    socket: &UdpSocket,
    proc: PortmapProgram,
    map: mapping,
    xid: u32,
) -> anyhow::Result<bool> {
    let call = call_body {
        rpcvers: 2,
        prog: portmap::PROGRAM,
        vers: portmap::VERSION,
        proc: proc as u32,
        cred: opaque_auth::default(),
        verf: opaque_auth::default(),
    };
    let msg = rpc_msg { xid, body: rpc_body::CALL(call) };
    let mut buf = Vec::new();
    msg.serialize(&mut buf)?;
    map.serialize(&mut buf)?;

    socket.send(&buf).await?;

    let mut recv_buf = [0u8; 256];
    let n = timeout(REPLY_TIMEOUT, socket.recv(&mut recv_buf)).await??;
    let mut cursor = Cursor::new(&recv_buf[..n]);
    let reply = deserialize::<rpc_msg>(&mut cursor)?;
    let rpc_body::REPLY(reply_body::MSG_ACCEPTED(accepted)) = reply.body else {
        anyhow::bail!("portmapper rejected the call");
    };
    if !matches!(accepted.reply_data, accept_body::SUCCESS) {
        anyhow::bail!("portmapper call failed: {:?}", accepted.reply_data);
    }
    let result = deserialize::<bool>(&mut cursor)?;
    Ok(result)
}
