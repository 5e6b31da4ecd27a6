//! Implementation of the `READDIR` procedure (procedure 16) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.16.
//!
//! The `READDIR` procedure retrieves a variable number of entries from a directory.
//! This procedure is used by clients to browse through a directory to discover
//! the filenames stored within.
//!
//! The client specifies:
//! - The file handle of the directory to read
//! - A cookie indicating where to start reading in the directory
//! - A cookie verifier to validate the cookie
//! - The maximum size of directory information to return
//!
//! On successful return, the server provides:
//! - The directory attributes
//! - A list of directory entries, each containing:
//!   * The file identifier (fileid)
//!   * The filename
//!   * A cookie for retrieving the next batch of entries
//! - A flag indicating whether the end of the directory was reached
//!
//! The cursor/verifier protocol implemented here (not just a thin syscall
//! translation) is described in detail in [`super::dircursor`].

use std::io::{Read, Write};

use tracing::{debug, error};

use super::dircursor;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, decode_args, nfs3, Serialize};

/// Handles `NFSv3` ``READDIR`` procedure (procedure 16)
///
/// `READDIR` retrieves a variable number of entries from a directory.
/// It takes directory handle, cookie, cookie verifier and directory count limit.
/// Returns directory entries including file ID, name and cookie for each entry.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `READDIR` arguments
/// * `output` - Output stream for writing the response
/// * `context` - Server context containing VFS
///
/// # Returns
///
/// * `Result<(), anyhow::Error>` - Ok(()) on success or an error
pub async fn nfsproc3_readdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = decode_args::<nfs3::dir::READDIR3args>(input)?;
    debug!("nfsproc3_readdir({:?},{:?}) ", xid, args);

    let dirid = match context.vfs.fh_to_id(&args.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let dir_attr_maybe = context.vfs.getattr(dirid).await;
    let dir_attr = dir_attr_maybe.ok();

    match dircursor::check_verifier(dir_attr.as_ref(), args.cookie, &args.cookieverf) {
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_attr.serialize(output)?;
            return Ok(());
        }
        Ok(dirversion) => {
            let count_limit = dircursor::entries_byte_budget(args.dircount);
            match context.vfs.readdir_window(dirid, args.cookie, count_limit).await {
                Ok(window) => {
                    xdr::rpc::make_success_reply(xid).serialize(output)?;
                    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
                    dir_attr.serialize(output)?;
                    dirversion.serialize(output)?;
                    for entry in &window.entries {
                        true.serialize(output)?;
                        let wire = nfs3::dir::entry3 {
                            fileid: entry.fileid,
                            name: entry.name.clone(),
                            cookie: entry.cookie,
                        };
                        wire.serialize(output)?;
                    }
                    false.serialize(output)?;
                    window.eof.serialize(output)?;
                    debug!(
                        "readdir {}, start at {}, emitted {} entries, eof {}",
                        dirid,
                        args.cookie,
                        window.entries.len(),
                        window.eof
                    );
                }
                Err(stat) => {
                    error!("readdir error {:?} --> {:?} ", xid, stat);
                    xdr::rpc::make_success_reply(xid).serialize(output)?;
                    stat.serialize(output)?;
                    dir_attr.serialize(output)?;
                }
            }
        }
    }

    Ok(())
}
