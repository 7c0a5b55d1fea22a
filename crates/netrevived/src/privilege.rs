//! Administrator rights detection.
//!
//! Toggling adapters and rebooting both need elevated rights; without
//! them every remediation would fail silently forever.

/// Whether the process runs with administrator / root rights.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Whether the process runs with administrator / root rights.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    // Raw disk handles are only handed out to elevated processes.
    std::fs::File::open(r"\\.\PHYSICALDRIVE0").is_ok()
}
