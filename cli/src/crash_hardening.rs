//! Keep connection tokens out of core dumps and crash reports.

#[cfg(windows)]
use anyhow::bail;
use anyhow::{Context, Result};
use std::env;
#[cfg(unix)]
use std::io;

const ALLOW_COREDUMPS_ENV: &str = "SONARLINK_ALLOW_COREDUMPS";

pub fn apply() -> Result<()> {
    if env::var(ALLOW_COREDUMPS_ENV).is_ok_and(|raw| is_enabled(&raw)) {
        tracing::warn!(
            env_var = ALLOW_COREDUMPS_ENV,
            "Core dumps left enabled; credentials may end up on disk after a crash"
        );
        return Ok(());
    }

    disable_dumps().context("failed to disable crash dumps")?;
    tracing::debug!("Crash dumps disabled");
    Ok(())
}

fn is_enabled(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(unix)]
fn disable_dumps() -> Result<()> {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid rlimit that outlives the call.
    if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const limit) } != 0 {
        return Err(io::Error::last_os_error()).context("setrlimit(RLIMIT_CORE, 0)");
    }

    // Also blocks ptrace attach and /proc/<pid>/mem reads by other users.
    #[cfg(target_os = "linux")]
    // SAFETY: PR_SET_DUMPABLE takes plain integer arguments.
    if unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) } != 0 {
        return Err(io::Error::last_os_error()).context("prctl(PR_SET_DUMPABLE, 0)");
    }

    Ok(())
}

#[cfg(windows)]
fn disable_dumps() -> Result<()> {
    use windows_sys::Win32::System::Diagnostics::Debug::{
        SEM_FAILCRITICALERRORS, SEM_NOGPFAULTERRORBOX, SetErrorMode,
    };
    use windows_sys::Win32::System::ErrorReporting::{WER_FAULT_REPORTING_NO_UI, WerSetFlags};

    // SAFETY: both calls only change process-wide error reporting flags.
    unsafe {
        SetErrorMode(SEM_FAILCRITICALERRORS | SEM_NOGPFAULTERRORBOX);
        let hr = WerSetFlags(WER_FAULT_REPORTING_NO_UI);
        if hr < 0 {
            bail!("WerSetFlags failed with HRESULT 0x{:08X}", hr as u32);
        }
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn disable_dumps() -> Result<()> {
    Ok(())
}
