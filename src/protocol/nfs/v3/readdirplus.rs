//! Implementation of the `READDIRPLUS` procedure (procedure 17) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.17.
//!
//! The `READDIRPLUS` procedure is an extended version of READDIR that returns
//! file handles and attributes in addition to directory entries. This procedure
//! is intended to eliminate separate LOOKUP calls for clients that want to
//! get attributes and file handles for directory entries.
//!
//! The client specifies:
//! - The file handle of the directory to read
//! - A cookie indicating where to start reading in the directory
//! - A cookie verifier to validate the cookie
//! - The maximum size of directory information to return
//! - The maximum size of attribute information to return
//!
//! On successful return, the server provides:
//! - The directory attributes
//! - A list of entries, each containing:
//!   * The file identifier (fileid)
//!   * The filename
//!   * A cookie for retrieving the next batch of entries
//!   * The file attributes
//!   * The file handle
//! - A flag indicating whether the end of the directory was reached
//!
//! Shares the cursor/verifier engine described in [`super::dircursor`] with
//! plain READDIR, but prices each entry through
//! [`crate::vfs::NFSFileSystem::readdirplus_window`] rather than
//! `readdir_window`, since each entry also carries its attributes and file
//! handle on the wire (the window already fetched both eagerly).

use std::io::{Read, Write};

use tracing::{debug, error};

use super::dircursor;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, decode_args, nfs3, Serialize};

/// Handles `NFSv3` `READDIRPLUS` procedure (procedure 17)
///
/// `READDIRPLUS` retrieves directory entries with their attributes and file handles.
/// Takes directory handle, cookie, cookie verifier, and maximum size limits.
/// Returns directory entries with file attributes and file handles for each entry.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `READDIRPLUS` arguments
/// * `output` - Output stream for writing the response
/// * `context` - Server context containing VFS
///
/// # Returns
///
/// * `Result<(), anyhow::Error>` - Ok(()) on success or an error
pub async fn nfsproc3_readdirplus(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = decode_args::<nfs3::dir::READDIRPLUS3args>(input)?;
    debug!("nfsproc3_readdirplus({:?},{:?}) ", xid, args);

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
            // maxcount bounds the whole reply (entries + attributes + handles),
            // which is the tighter of the two limits the client supplies.
            let count_limit = dircursor::entries_byte_budget(args.maxcount);
            match context.vfs.readdirplus_window(dirid, args.cookie, count_limit).await {
                Ok(window) => {
                    xdr::rpc::make_success_reply(xid).serialize(output)?;
                    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
                    dir_attr.serialize(output)?;
                    dirversion.serialize(output)?;
                    for entry in &window.entries {
                        true.serialize(output)?;
                        let handle = nfs3::post_op_fh3::Some(context.vfs.id_to_fh(entry.fileid));
                        let wire = nfs3::dir::entryplus3 {
                            fileid: entry.fileid,
                            name: entry.name.clone(),
                            cookie: entry.cookie,
                            name_attributes: nfs3::post_op_attr::Some(entry.attr),
                            name_handle: handle,
                        };
                        wire.serialize(output)?;
                    }
                    false.serialize(output)?;
                    window.eof.serialize(output)?;
                    debug!(
                        "readdirplus {}, start at {}, emitted {} entries, eof {}",
                        dirid,
                        args.cookie,
                        window.entries.len(),
                        window.eof
                    );
                }
                Err(stat) => {
                    error!("readdirplus error {:?} --> {:?} ", xid, stat);
                    xdr::rpc::make_success_reply(xid).serialize(output)?;
                    stat.serialize(output)?;
                    dir_attr.serialize(output)?;
                }
            }
        }
    }
    Ok(())
}
