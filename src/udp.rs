//! The UDP module provides functionality for handling NFS protocol communications over UDP.
//!
//! Unlike TCP, UDP carries no record-marking framing (RFC 5531 §10 applies to
//! stream transports only): each datagram is one complete RPC call, and the
//! dispatcher sends exactly one reply datagram back to the sender. This
//! mirrors unfs3's `create_udp_transport`/`svcudp_bufcreate`, including the
//! large receive buffer needed for jumbo NFS READDIR/READ replies that still
//! fit under the historical NFSv3-over-UDP reply ceiling.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::Duration;
use std::{io, net::IpAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::exports::ExportTable;
use crate::protocol::nfs::portmap::PortmapTable;
use crate::protocol::rpc::{MountTable, ServerShared};
use crate::protocol::xdr::nfs3;
use crate::protocol::rpc;
use crate::vfs::NFSFileSystem;

/// Matches unfs3's `NFS_MAX_UDP_PACKET`: large enough for a full-size
/// READDIR/READ reply, comfortably under the historical 64KiB UDP datagram
/// ceiling used by NFSv3-over-UDP clients.
const NFS_MAX_UDP_PACKET: usize = 9000;

/// NFS UDP listener that answers one datagram at a time with no connection
/// state, no record marking, and no cross-datagram ordering guarantee
/// beyond "receive, dispatch, reply" being strictly sequential.
pub struct NFSUdpListener<T: NFSFileSystem + Send + Sync + 'static> {
    socket: UdpSocket,
    port: u16,
    shared: ServerShared<T>,
}

impl<T: NFSFileSystem + Send + Sync + 'static> NFSUdpListener<T> {
    /// Binds a UDP socket to the specified IP address and port, reusing the
    /// caller's [`ServerShared`] state (typically cloned from an already
    /// bound [`crate::tcp::NFSTcpListener`]) so TCP and UDP transports
    /// answer with the same exports, write verifier and portmap table.
    pub async fn bind(
        ipstr: &str,
        shared: ServerShared<T>,
    ) -> io::Result<NFSUdpListener<T>> {
        let (ip, port) = ipstr.split_once(':').ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "IP Address must be of form ip:port")
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "Port not in range 0..=65535")
        })?;
        Self::bind_internal(ip, port, shared).await
    }

    /// Creates a standalone listener with a fresh, empty [`ServerShared`]
    /// state, for embedding scenarios that only need UDP.
    pub async fn bind_fresh(ipstr: &str, fs: T) -> io::Result<NFSUdpListener<T>> {
        let shared = ServerShared {
            vfs: std::sync::Arc::new(fs),
            mount_signal: None,
            export_name: std::sync::Arc::from("/".to_string()),
            transaction_tracker: std::sync::Arc::new(rpc::TransactionTracker::new(
                Duration::from_secs(60),
            )),
            portmap_table: std::sync::Arc::from(RwLock::from(PortmapTable::default())),
            exports: std::sync::Arc::new(ExportTable::empty()),
            mount_table: std::sync::Arc::new(MountTable::default()),
            write_verifier: crate::write_verifier::regenerate(),
        };
        Self::bind(ipstr, shared).await
    }

    /// Binds the socket itself. Sets `SO_REUSEADDR` before binding an
    /// explicit port so a restarted daemon can rebind immediately without
    /// waiting out `TIME_WAIT`, matching `tcp.rs`'s `bind_shared` and
    /// unfs3's `create_udp_transport`. An ephemeral port (`0`) binds
    /// directly; the OS-assigned port is read back afterwards.
    async fn bind_internal(
        ip: &str,
        port: u16,
        shared: ServerShared<T>,
    ) -> io::Result<NFSUdpListener<T>> {
        let ipstr = format!("{ip}:{port}");
        let addr: SocketAddr = ipstr
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::AddrNotAvailable, "invalid bind address"))?;
        let socket = if port == 0 {
            UdpSocket::bind(&ipstr).await?
        } else {
            let domain = if addr.is_ipv4() { socket2::Domain::IPV4 } else { socket2::Domain::IPV6 };
            let raw = socket2::Socket::new(domain, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
            raw.set_reuse_address(true)?;
            raw.set_nonblocking(true)?;
            raw.bind(&addr.into())?;
            UdpSocket::from_std(raw.into())?
        };
        info!("Listening on {:?} (UDP)", &ipstr);
        let port = socket.local_addr()?.port();
        Ok(NFSUdpListener { socket, port, shared })
    }

    /// Returns the shared per-exchange state, so a TCP listener created
    /// alongside this one can answer for the same exports/state.
    pub fn shared(&self) -> ServerShared<T> {
        self.shared.clone()
    }
}

#[async_trait]
impl<T: NFSFileSystem + Send + Sync + 'static> crate::tcp::NFSTcp for NFSUdpListener<T> {
    fn get_listen_port(&self) -> u16 {
        self.port
    }

    fn get_listen_ip(&self) -> IpAddr {
        self.socket.local_addr().map(|a| a.ip()).unwrap_or(IpAddr::from([0, 0, 0, 0]))
    }

    fn set_mount_listener(&mut self, signal: mpsc::Sender<bool>) {
        self.shared.mount_signal = Some(signal);
    }

    /// Receives datagrams forever, dispatching each one through the same
    /// `handle_rpc` the TCP transport uses and sending back exactly one
    /// reply datagram per request, with no framing.
    async fn handle_forever(&self) -> io::Result<()> {
        let mut recv_buf = vec![0u8; NFS_MAX_UDP_PACKET];
        loop {
            let (n, peer) = self.socket.recv_from(&mut recv_buf).await?;
            let context =
                self.shared.context_for(self.port, peer.to_string(), rpc::SocketKind::Datagram);
            debug!("Received {} byte UDP datagram from {}", n, peer);

            let mut input = Cursor::new(&recv_buf[..n]);
            let mut output = Vec::with_capacity(NFS_MAX_UDP_PACKET.min(8192));
            match rpc::handle_rpc(&mut input, &mut output, context).await {
                Ok(true) => {
                    if let Err(e) = self.socket.send_to(&output, peer).await {
                        error!("Failed to send UDP reply to {}: {:?}", peer, e);
                    }
                }
                Ok(false) => {
                    // Retransmission: no reply to send.
                }
                Err(e) => {
                    // xid is unknown on a hard decode failure, so there is
                    // nothing meaningful to reply with; the datagram is
                    // simply dropped, matching unfs3's handling of
                    // unparsable UDP calls.
                    error!("UDP datagram from {} failed to process: {:?}", peer, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::NFSFileSystem;

    #[derive(Default)]
    struct EmptyFs;

    #[async_trait]
    impl NFSFileSystem for EmptyFs {
        fn generation(&self) -> u64 {
            0
        }
        fn capabilities(&self) -> crate::vfs::Capabilities {
            crate::vfs::Capabilities::ReadOnly
        }
        fn root_dir(&self) -> nfs3::fileid3 {
            1
        }
        async fn lookup(
            &self,
            _dirid: nfs3::fileid3,
            _filename: &nfs3::filename3,
        ) -> Result<nfs3::fileid3, nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_NOENT)
        }
        async fn getattr(&self, _id: nfs3::fileid3) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_NOENT)
        }
        async fn setattr(
            &self,
            _id: nfs3::fileid3,
            _setattr: nfs3::sattr3,
        ) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn read(
            &self,
            _id: nfs3::fileid3,
            _offset: u64,
            _count: u32,
        ) -> Result<(Vec<u8>, bool), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_NOENT)
        }
        async fn write(
            &self,
            _id: nfs3::fileid3,
            _offset: u64,
            _data: &[u8],
            _stable: nfs3::file::stable_how,
        ) -> Result<(nfs3::fattr3, nfs3::file::stable_how, nfs3::count3), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn create(
            &self,
            _dirid: nfs3::fileid3,
            _filename: &nfs3::filename3,
            _attr: nfs3::sattr3,
        ) -> Result<(nfs3::fileid3, nfs3::fattr3), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn create_exclusive(
            &self,
            _dirid: nfs3::fileid3,
            _filename: &nfs3::filename3,
            _verifier: nfs3::createverf3,
        ) -> Result<nfs3::fileid3, nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn mkdir(
            &self,
            _dirid: nfs3::fileid3,
            _dirname: &nfs3::filename3,
        ) -> Result<(nfs3::fileid3, nfs3::fattr3), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn remove(
            &self,
            _dirid: nfs3::fileid3,
            _filename: &nfs3::filename3,
        ) -> Result<(), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn rename(
            &self,
            _from_dirid: nfs3::fileid3,
            _from_filename: &nfs3::filename3,
            _to_dirid: nfs3::fileid3,
            _to_filename: &nfs3::filename3,
        ) -> Result<(), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn readdir(
            &self,
            _dirid: nfs3::fileid3,
            _start_after: nfs3::fileid3,
            _max_entries: usize,
        ) -> Result<crate::vfs::ReadDirResult, nfs3::nfsstat3> {
            Ok(crate::vfs::ReadDirResult::default())
        }
        async fn symlink(
            &self,
            _dirid: nfs3::fileid3,
            _linkname: &nfs3::filename3,
            _symlink: &nfs3::nfspath3,
            _attr: &nfs3::sattr3,
        ) -> Result<(nfs3::fileid3, nfs3::fattr3), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn readlink(&self, _id: nfs3::fileid3) -> Result<nfs3::nfspath3, nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_NOENT)
        }
        async fn link(
            &self,
            _file_id: nfs3::fileid3,
            _link_dir_id: nfs3::fileid3,
            _link_name: &nfs3::filename3,
        ) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn mknod(
            &self,
            _dir_id: nfs3::fileid3,
            _name: &nfs3::filename3,
            _ftype: nfs3::ftype3,
            _specdata: nfs3::specdata3,
            _attrs: &nfs3::sattr3,
        ) -> Result<(nfs3::fileid3, nfs3::fattr3), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
        async fn commit(
            &self,
            _file_id: nfs3::fileid3,
            _offset: u64,
            _count: u32,
        ) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_ROFS)
        }
    }

    #[tokio::test]
    async fn binds_to_ephemeral_port() {
        let listener = NFSUdpListener::bind_fresh("127.0.0.1:0", EmptyFs).await.unwrap();
        assert_ne!(listener.get_listen_port(), 0);
    }
}
