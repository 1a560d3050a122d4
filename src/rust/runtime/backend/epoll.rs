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
    c_int,
    epoll_event,
    EPOLLERR,
    EPOLLHUP,
    EPOLLIN,
    EPOLLOUT,
    EPOLL_CLOEXEC,
    EPOLL_CTL_ADD,
    EPOLL_CTL_DEL,
    EPOLL_CTL_MOD,
};
use ::std::{
    collections::HashMap,
    os::unix::io::RawFd,
    time::Duration,
};

//======================================================================================================================
// Constants
//======================================================================================================================

const MAX_EVENTS: usize = 1024;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Linux backend built on level-triggered `epoll(7)`. The registered set is kept in sync with the interests handed
/// to each poll.
pub struct EpollBackend {
    epoll_fd: RawFd,
    registered: HashMap<RawFd, u32>,
    events: Vec<epoll_event>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl EpollBackend {
    pub fn new() -> Result<Self, Fail> {
        let epoll_fd: RawFd = unsafe { libc::epoll_create1(EPOLL_CLOEXEC) };
        if epoll_fd < 0 {
            let fail: Fail = Fail::last_os_error("failed to create epoll");
            error!("new(): {:?}", fail);
            return Err(fail);
        }
        Ok(Self {
            epoll_fd,
            registered: HashMap::new(),
            events: vec![epoll_event { events: 0, u64: 0 }; MAX_EVENTS],
        })
    }

    fn control(&self, op: c_int, fd: RawFd, mask: u32) -> Result<(), Fail> {
        let mut event: epoll_event = epoll_event {
            events: mask,
            u64: fd as u64,
        };
        match unsafe { libc::epoll_ctl(self.epoll_fd, op, fd, &mut event) } {
            0 => Ok(()),
            _ => Err(Fail::last_os_error("failed to update epoll registration")),
        }
    }

    /// Registers `fd` with `mask`. A descriptor the kernel no longer knows (it was closed and its number reused) is
    /// added back.
    fn register(&self, fd: RawFd, mask: u32, known: bool) -> Result<(), Fail> {
        if !known {
            return self.control(EPOLL_CTL_ADD, fd, mask);
        }
        match self.control(EPOLL_CTL_MOD, fd, mask) {
            Err(e) if e.errno == libc::ENOENT => {
                debug!("register(): descriptor was dropped by the kernel, adding it back (fd={:?})", fd);
                self.control(EPOLL_CTL_ADD, fd, mask)
            },
            result => result,
        }
    }

    /// Brings registrations in line with `interests`. Resources that cannot be registered are reported ready, so
    /// their waiters wake up and observe the failure themselves.
    fn sync(&mut self, interests: &[Interest]) -> Vec<Readiness> {
        let mut wanted: HashMap<RawFd, (u32, bool)> = HashMap::with_capacity(interests.len());
        for interest in interests {
            let mut mask: u32 = 0;
            if interest.readable {
                mask |= EPOLLIN as u32;
            }
            if interest.writable {
                mask |= EPOLLOUT as u32;
            }
            let entry: &mut (u32, bool) = wanted.entry(interest.resource.into()).or_insert((0, false));
            entry.0 |= mask;
            entry.1 |= interest.changed;
        }

        let stale: Vec<RawFd> = self
            .registered
            .keys()
            .filter(|fd| !wanted.contains_key(fd))
            .copied()
            .collect();
        for fd in stale {
            self.registered.remove(&fd);
            // The descriptor may be closed already, in which case the kernel dropped it on its own.
            if let Err(e) = self.control(EPOLL_CTL_DEL, fd, 0) {
                debug!("sync(): failed to unregister (fd={:?}, error={:?})", fd, e);
            }
        }

        let mut failed: Vec<Readiness> = Vec::new();
        for (fd, (mask, changed)) in wanted {
            let known: bool = match self.registered.get(&fd) {
                Some(current) if *current == mask && !changed => continue,
                Some(_) => true,
                None => false,
            };
            match self.register(fd, mask, known) {
                Ok(()) => {
                    self.registered.insert(fd, mask);
                },
                Err(e) => {
                    warn!("sync(): cannot watch resource (fd={:?}, error={:?})", fd, e);
                    self.registered.remove(&fd);
                    failed.push(Readiness {
                        resource: ResourceId(fd),
                        readable: true,
                        writable: true,
                    });
                },
            }
        }
        failed
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Backend for EpollBackend {
    fn get_name(&self) -> &'static str {
        "epoll"
    }

    fn poll(&mut self, interests: &[Interest], timeout: Duration) -> Result<Vec<Readiness>, Fail> {
        let mut ready: Vec<Readiness> = self.sync(interests);
        let timeout_ms: c_int = if ready.is_empty() {
            timeout_to_millis(timeout)
        } else {
            0
        };

        let nevents: c_int = unsafe {
            libc::epoll_wait(
                self.epoll_fd,
                self.events.as_mut_ptr(),
                self.events.len() as c_int,
                timeout_ms,
            )
        };
        if nevents < 0 {
            let fail: Fail = Fail::last_os_error("epoll_wait failed");
            if fail.errno == libc::EINTR {
                return Ok(ready);
            }
            error!("poll(): {:?}", fail);
            return Err(fail);
        }

        let failure_mask: u32 = (EPOLLERR | EPOLLHUP) as u32;
        for event in &self.events[..nevents as usize] {
            let flags: u32 = event.events;
            let fd: RawFd = event.u64 as RawFd;
            let failed: bool = flags & failure_mask != 0;
            ready.push(Readiness {
                resource: ResourceId(fd),
                readable: failed || flags & (EPOLLIN as u32) != 0,
                writable: failed || flags & (EPOLLOUT as u32) != 0,
            });
        }
        Ok(ready)
    }
}

impl Drop for EpollBackend {
    fn drop(&mut self) {
        if unsafe { libc::close(self.epoll_fd) } != 0 {
            warn!("drop(): failed to close epoll descriptor (fd={:?})", self.epoll_fd);
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
