// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Process signal capture. Handlers only record the signal; the scheduler picks recorded signals up at the start of
//! each pass.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::libc::c_int;
use ::std::sync::atomic::{
    AtomicU64,
    Ordering,
};

//======================================================================================================================
// Static Variables
//======================================================================================================================

/// Bit `n` is set when signal `n` was received and not yet taken.
static PENDING: AtomicU64 = AtomicU64::new(0);

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

extern "C" fn record(signum: c_int) {
    if (1..64).contains(&signum) {
        PENDING.fetch_or(1u64 << signum, Ordering::SeqCst);
    }
}

/// Installs the recording handler for `signum`.
pub fn install(signum: c_int) -> Result<(), Fail> {
    if !(1..64).contains(&signum) {
        let cause: String = format!("invalid signal number (signum={:?})", signum);
        warn!("install(): {}", cause);
        return Err(Fail::new(libc::EINVAL, &cause));
    }
    let handler: libc::sighandler_t = record as extern "C" fn(c_int) as libc::sighandler_t;
    if unsafe { libc::signal(signum, handler) } == libc::SIG_ERR {
        let fail: Fail = Fail::last_os_error("failed to install signal handler");
        error!("install(): {:?} (signum={:?})", fail, signum);
        return Err(fail);
    }
    Ok(())
}

/// Captures interrupt and termination requests.
pub fn install_shutdown_handlers() -> Result<(), Fail> {
    install(libc::SIGINT)?;
    install(libc::SIGTERM)
}

pub fn is_shutdown(signum: c_int) -> bool {
    signum == libc::SIGINT || signum == libc::SIGTERM
}

/// Takes the signals among `signums` that were recorded since they were last taken, in increasing signal number.
/// Signals outside `signums` stay recorded for other takers.
pub fn take_pending<I>(signums: I) -> Vec<c_int>
where
    I: IntoIterator<Item = c_int>,
{
    let mask: u64 = signums
        .into_iter()
        .filter(|signum| (1..64).contains(signum))
        .fold(0, |mask, signum| mask | (1u64 << signum));
    let pending: u64 = PENDING.fetch_and(!mask, Ordering::SeqCst) & mask;
    (1..64).filter(|signum| pending & (1u64 << signum) != 0).collect()
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
