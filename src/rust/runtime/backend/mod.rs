// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

mod poll;
pub mod signals;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod epoll;
        pub use self::epoll::EpollBackend;
    }
}

pub use self::poll::PollBackend;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    config::BackendKind,
    runtime::{
        fail::Fail,
        resource::ResourceId,
    },
};
use ::libc::c_int;
use ::std::time::Duration;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Directions a resource is watched for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interest {
    pub resource: ResourceId,
    pub readable: bool,
    pub writable: bool,
    /// The resource got new waiters since the previous poll. Its descriptor may have been closed and reused in
    /// between, so stateful backends register it again.
    pub changed: bool,
}

/// Directions a resource turned out to be ready for. Errors and hang-ups count as ready in both directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Readiness {
    pub resource: ResourceId,
    pub readable: bool,
    pub writable: bool,
}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Readiness notification mechanism used by the scheduler.
pub trait Backend {
    fn get_name(&self) -> &'static str;

    /// Blocks for at most `timeout` waiting for any of `interests` and reports the resources that are ready.
    fn poll(&mut self, interests: &[Interest], timeout: Duration) -> Result<Vec<Readiness>, Fail>;

    /// Whether tasks may wait on process signals with this backend.
    fn supports_signals(&self) -> bool {
        false
    }
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Interest {
    pub fn new(resource: ResourceId) -> Self {
        Self {
            resource,
            readable: false,
            writable: false,
            changed: false,
        }
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Instantiates the backend of the requested kind.
pub fn new_backend(kind: BackendKind) -> Result<Box<dyn Backend>, Fail> {
    match kind {
        BackendKind::Poll => Ok(Box::new(PollBackend::new())),
        #[cfg(target_os = "linux")]
        BackendKind::Epoll => Ok(Box::new(EpollBackend::new()?)),
        #[cfg(not(target_os = "linux"))]
        BackendKind::Epoll => Err(Fail::new(libc::ENOTSUP, "epoll is only available on linux")),
    }
}

/// Converts a timeout to whole milliseconds, rounding up so that a short timeout never turns into a busy poll.
pub fn timeout_to_millis(timeout: Duration) -> c_int {
    let millis: u128 = timeout.as_nanos().div_ceil(1_000_000);
    millis.min(c_int::MAX as u128) as c_int
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
