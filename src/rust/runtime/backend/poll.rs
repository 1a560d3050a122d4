// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    backend::{
        timeout_to_millis,
        Backend,
        Interest,
        Readiness,
    },
    fail::Fail,
    resource::ResourceId,
};
use ::libc::{
    c_short,
    pollfd,
    POLLERR,
    POLLHUP,
    POLLIN,
    POLLNVAL,
    POLLOUT,
};
use ::std::time::Duration;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Portable backend built on `poll(2)`.
pub struct PollBackend {
    fds: Vec<pollfd>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl PollBackend {
    pub fn new() -> Self {
        Self { fds: Vec::new() }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Backend for PollBackend {
    fn get_name(&self) -> &'static str {
        "poll"
    }

    fn poll(&mut self, interests: &[Interest], timeout: Duration) -> Result<Vec<Readiness>, Fail> {
        self.fds.clear();
        for interest in interests {
            let mut events: c_short = 0;
            if interest.readable {
                events |= POLLIN;
            }
            if interest.writable {
                events |= POLLOUT;
            }
            self.fds.push(pollfd {
                fd: interest.resource.into(),
                events,
                revents: 0,
            });
        }

        let nready: i32 = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_to_millis(timeout),
            )
        };
        if nready < 0 {
            let fail: Fail = Fail::last_os_error("poll failed");
            // A signal arrived, report nothing and let the scheduler dispatch it.
            if fail.errno == libc::EINTR {
                return Ok(vec![]);
            }
            error!("poll(): {:?}", fail);
            return Err(fail);
        }

        let mut ready: Vec<Readiness> = Vec::with_capacity(nready as usize);
        for fd in self.fds.iter().filter(|fd| fd.revents != 0) {
            let failed: bool = fd.revents & (POLLERR | POLLHUP | POLLNVAL) != 0;
            ready.push(Readiness {
                resource: ResourceId(fd.fd),
                readable: failed || fd.revents & POLLIN != 0,
                writable: failed || fd.revents & POLLOUT != 0,
            });
        }
        Ok(ready)
    }

    fn supports_signals(&self) -> bool {
        true
    }
}

impl Default for PollBackend {
    fn default() -> Self {
        Self::new()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
