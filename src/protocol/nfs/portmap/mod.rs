//! PORTMAP protocol implementation as specified in RFC 1057 A.1 and A.2 sections.
//! https://datatracker.ietf.org/doc/rfc1057/

use std::collections::HashMap;
use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::error;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, portmap, Serialize};

mod dump;
mod get_port;
mod null;
mod set_port;
mod unset_port;

use dump::pmapproc_dump;
use get_port::pmapproc_getport;
use null::pmapproc_null;
use set_port::pmapproc_setport;
use unset_port::pmapproc_unsetport;

/// Key identifying one registered RPC service: program, version and
/// transport protocol (`IPPROTO_TCP`/`IPPROTO_UDP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortmapKey {
    pub prog: u32,
    pub vers: u32,
    pub prot: u32,
}

/// In-memory registration table backing PMAPPROC_SET/UNSET/GETPORT/DUMP.
/// Populated by this process's own transports at startup (see
/// `crate::registration`) and by any other local RPC service that chooses
/// to register against this portmapper.
#[derive(Debug, Default)]
pub struct PortmapTable {
    pub table: HashMap<PortmapKey, u16>,
}

/// Main handler for PORTMAP protocol
///
/// # Arguments
///
/// * `xid` - RPC transaction ID from the client
/// * `call` - The RPC call body containing program, version, and procedure numbers
/// * `input` - Input stream for reading procedure arguments
/// * `output` - Output stream for writing procedure results
/// * `context` - Server context containing port information
///
/// # Returns
///
/// * `Result<(), anyhow::Error>` - Ok(()) on success or an error
pub fn handle_portmap(
    xid: u32,
    call: &xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &mut rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != portmap::VERSION {
        error!("Invalid Portmap Version number {} != {}", call.vers, portmap::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, portmap::VERSION).serialize(output)?;
        return Ok(());
    }
    let prog =
        portmap::PortmapProgram::from_u32(call.proc).unwrap_or(portmap::PortmapProgram::INVALID);

    match prog {
        portmap::PortmapProgram::PMAPPROC_NULL => pmapproc_null(xid, input, output)?,
        portmap::PortmapProgram::PMAPPROC_GETPORT => pmapproc_getport(xid, input, output, context)?,
        portmap::PortmapProgram::PMAPPROC_SET => pmapproc_setport(xid, input, output, context)?,
        portmap::PortmapProgram::PMAPPROC_UNSET => pmapproc_unsetport(xid, input, output, context)?,
        portmap::PortmapProgram::PMAPPROC_DUMP => pmapproc_dump(xid, output, context)?,
        _ => {
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
