//! Implementation of the READ procedure (procedure 6) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.6.
//!
//! The READ procedure retrieves data from a regular file. It may be used to read
//! whole or partial files at any offset. The client specifies:
//! - The file handle of the file to read
//! - The offset in the file to start reading
//! - The amount of data to read
//!
//! On successful return, the server provides:
//! - The file attributes after the read
//! - The actual number of bytes read
//! - An EOF flag indicating whether the read reached the end of file
//! - The data read from the file

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::rpc;
use crate::protocol::xdr::{self, decode_args, nfs3, Serialize};

/// Historical ceiling on a single NFSv3-over-UDP reply's data payload.
/// Clients that mount over UDP size their read buffers assuming no server
/// ever exceeds this, so a datagram-socket READ clamps its requested
/// count down to it rather than risk a reply the client can't reassemble.
/// TCP has no such ceiling; it streams.
const UDP_READ_CEILING: u32 = 32 * 1024;

/// Clamps a client-requested READ count to the UDP reply ceiling when the
/// call arrived on a datagram socket; passes it through unchanged for a
/// stream socket.
fn effective_read_count(requested: nfs3::count3, is_datagram: bool) -> nfs3::count3 {
    if is_datagram {
        requested.min(UDP_READ_CEILING)
    } else {
        requested
    }
}

/// Handles NFSv3 READ procedure (procedure 6)
///
/// READ retrieves data from a file.
/// It takes file handle, offset and byte count to read.
/// Returns file attributes, read data and EOF indicator.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the READ arguments
/// * `output` - Output stream for writing the response
/// * `context` - Server context containing VFS
///
/// # Returns
///
/// * `Result<(), anyhow::Error>` - Ok(()) on success or an error
pub async fn nfsproc3_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = decode_args::<nfs3::file::READ3args>(input)?;
    debug!("nfsproc3_read({:?},{:?}) ", xid, args);

    let id = context.vfs.fh_to_id(&args.file);
    if let Err(stat) = id {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        stat.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        return Ok(());
    }
    let id = id.unwrap();

    let obj_attr = match context.vfs.getattr(id).await {
        Ok(v) => nfs3::post_op_attr::attributes(v),
        Err(_) => nfs3::post_op_attr::Void,
    };
    let count = effective_read_count(args.count, context.is_datagram());
    match context.vfs.read(id, args.offset, count).await {
        Ok((bytes, eof)) => {
            let res = nfs3::file::READ3resok {
                file_attributes: obj_attr,
                count: bytes.len() as u32,
                eof,
                data: bytes,
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_read error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            obj_attr.serialize(output)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_read_is_never_clamped() {
        assert_eq!(effective_read_count(1_000_000, false), 1_000_000);
    }

    #[test]
    fn udp_read_is_clamped_to_the_ceiling() {
        assert_eq!(effective_read_count(1_000_000, true), UDP_READ_CEILING);
    }

    #[test]
    fn udp_read_below_the_ceiling_is_unaffected() {
        assert_eq!(effective_read_count(1024, true), 1024);
    }
}
