//! Implementation of the DUMP procedure (procedure 2) for MOUNT version 3 protocol
//! as defined in RFC 1813 Appendix I section I.4.3.
//!
//! DUMP returns the list of directories this server currently has mounted on
//! behalf of any client, each paired with the client's address. Takes no
//! arguments.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::mount::mountbody;
use crate::protocol::xdr::{self, Serialize};

/// Handles MOUNT protocol DUMP procedure (procedure 2)
///
/// Walks the server's mount table (populated by MNT, drained by
/// UMNT/UMNTALL) and returns one `mountbody` entry per client/directory
/// pair currently mounted.
pub fn mountproc3_dump(
    xid: u32,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    debug!("mountproc3_dump({:?}) ", xid);
    let entries: Vec<(String, String)> = {
        let mounts = context.mount_table.lock().expect("mount table lock poisoned");
        mounts
            .iter()
            .flat_map(|(client, dirs)| dirs.iter().map(move |dir| (client.clone(), dir.clone())))
            .collect()
    };

    let mut list_head: Option<mountbody> = None;
    for (hostname, directory) in entries.into_iter().rev() {
        list_head = Some(mountbody {
            hostname: hostname.into_bytes(),
            directory: directory.into_bytes(),
            next: Box::new(list_head),
        });
    }

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    list_head.serialize(output)?;
    Ok(())
}
