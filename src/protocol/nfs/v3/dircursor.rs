//! Shared machinery behind the READDIR/READDIRPLUS cookie/verifier protocol.
//!
//! This is the one NFSv3 procedure whose semantics go materially beyond a
//! direct syscall translation: it must stream a directory in bounded-size
//! windows, survive concurrent mutation of the directory, and produce
//! stable-enough cursors without relying on the host's directory position
//! primitives (`telldir`/`seekdir` values do not survive a `closedir`, and
//! the directory can be reopened by another caller at any time).
//!
//! Grounded in unfs3's `readdir.c` `read_dir()`: a cookie is the number of
//! entries to skip from the start of a fresh directory scan, and the
//! cookie verifier is the directory's modification time at the moment of
//! the call. [`crate::vfs::NFSFileSystem::readdir_window`] performs the
//! actual bounded-window scan (byte accounting, the 143-entry cap, and the
//! progress guarantee); this module holds the verifier check and the
//! count-to-byte-budget translation shared by both procedures.

use crate::protocol::xdr::nfs3;

/// The protocol never asks a server to account for more than one 4096-byte
/// page of entries in a single reply, matching unfs3's `read_dir()`
/// (`if (count > 4096) count = 4096;`).
const MAX_COUNT: usize = 4096;

/// Translates a client-supplied `count`/`dircount`/`maxcount` field into the
/// byte budget available for the entries themselves, after capping it to
/// the protocol ceiling and reserving [`crate::vfs::READDIR_RESOK_SIZE`] for
/// the header/eof overhead that [`crate::vfs::NFSFileSystem::readdir_window`]
/// already accounts for internally.
pub fn entries_byte_budget(requested: nfs3::count3) -> usize {
    (requested as usize).min(MAX_COUNT)
}

/// Validates a READDIR/READDIRPLUS cookie verifier against the directory's
/// current modification time, and returns the verifier to echo back.
///
/// A verifier is only checked on continuation calls (`cookie != 0`); the
/// first call of a scan always supplies an all-zero verifier and is
/// accepted unconditionally. This mirrors unfs3's `cookie_check()`: any
/// directory mutation that could reorder entries also updates the mtime,
/// so a verifier mismatch means the client must restart its scan from the
/// beginning.
pub fn check_verifier(
    dir_attr: Option<&nfs3::fattr3>,
    cookie: nfs3::cookie3,
    supplied: &nfs3::cookieverf3,
) -> Result<nfs3::cookieverf3, nfs3::nfsstat3> {
    let Some(dir_attr) = dir_attr else {
        return Err(nfs3::nfsstat3::NFS3ERR_IO);
    };
    let current = mtime_verifier(dir_attr);
    if cookie != 0 && *supplied != current {
        return Err(nfs3::nfsstat3::NFS3ERR_BAD_COOKIE);
    }
    Ok(current)
}

/// Encodes a directory's modification time as an 8-byte cookie verifier.
fn mtime_verifier(dir_attr: &nfs3::fattr3) -> nfs3::cookieverf3 {
    let cvf_version = ((dir_attr.mtime.seconds as u64) << 32) | (dir_attr.mtime.nseconds as u64);
    cvf_version.to_be_bytes()
}
