//! Directory renames with stronger guarantees than `std::fs::rename`.
//!
//! On Linux (glibc) these use `renameat2`: `RENAME_NOREPLACE` refuses to
//! clobber an existing target and `RENAME_EXCHANGE` swaps two directories
//! in one step. Elsewhere, or on filesystems without support, callers fall
//! back to check-then-rename.

use std::io;
use std::path::Path;

/// Rename `from` to `to`, failing with `ErrorKind::AlreadyExists` when `to`
/// is already present.
pub(crate) fn rename_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    match sys::renameat2(from, to, libc::RENAME_NOREPLACE) {
        Err(err) if sys::unsupported(&err) => {}
        other => return other,
    }

    if to.exists() {
        return Err(already_exists(to));
    }
    std::fs::rename(from, to).map_err(|err| {
        // A non-empty directory appeared between the check and the rename.
        if to.exists() {
            already_exists(to)
        } else {
            err
        }
    })
}

/// Atomically swap `a` and `b`, both of which must exist. Returns `false`
/// when the platform or filesystem cannot do this in one step.
pub(crate) fn exchange(a: &Path, b: &Path) -> io::Result<bool> {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    match sys::renameat2(a, b, libc::RENAME_EXCHANGE) {
        Ok(()) => return Ok(true),
        Err(err) if sys::unsupported(&err) => {}
        Err(err) => return Err(err),
    }

    let _ = (a, b);
    Ok(false)
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} already exists", path.display()),
    )
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod sys {
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    pub(super) fn renameat2(from: &Path, to: &Path, flags: libc::c_uint) -> io::Result<()> {
        let from = CString::new(from.as_os_str().as_bytes())?;
        let to = CString::new(to.as_os_str().as_bytes())?;
        // SAFETY: both pointers are NUL-terminated strings that outlive the call.
        let rc = unsafe {
            libc::renameat2(
                libc::AT_FDCWD,
                from.as_ptr(),
                libc::AT_FDCWD,
                to.as_ptr(),
                flags,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Kernel or filesystem without `renameat2` flag support.
    pub(super) fn unsupported(err: &io::Error) -> bool {
        matches!(err.raw_os_error(), Some(libc::EINVAL) | Some(libc::ENOSYS))
    }
}
