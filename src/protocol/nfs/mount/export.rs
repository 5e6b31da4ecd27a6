//! Implementation of the EXPORT procedure (procedure 5) for MOUNT version 3 protocol
//! as defined in RFC 1813 Appendix I section I.4.5.
//!
//! The EXPORT procedure provides a list of all exported file systems and their
//! associated access control lists. This is typically used by clients to discover
//! available mount points on the server.
//!
//! EXPORT takes no arguments and returns a list of exported file systems.
//! Each export entry includes a directory path and optional access groups list.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, Serialize};

/// Handles MOUNT protocol EXPORT procedure (procedure 5)
///
/// EXPORT retrieves a list of exported file systems.
/// Takes no arguments and returns every entry of the server's export table,
/// each with an empty access-group list (`ex_groups`): this server doesn't
/// restrict exports by client group membership.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `_` - Unused input stream
/// * `output` - Output stream for writing the response
/// * `context` - Server context containing export information
///
/// # Returns
///
/// * `Result<(), anyhow::Error>` - Ok(()) on success or an error
pub fn mountproc3_export(
    xid: u32,
    _: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    debug!("mountproc3_export({:?}) ", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    for export in context.exports.all() {
        // another exportnode follows
        true.serialize(output)?;
        export.path.to_string_lossy().into_owned().into_bytes().serialize(output)?;
        // ex_groups: empty
        false.serialize(output)?;
    }
    // ex_next: none
    false.serialize(output)?;
    Ok(())
}
