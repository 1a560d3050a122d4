// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::libc::c_int;
use ::socket2::{
    Domain,
    Socket,
    Type,
};
use ::std::{
    fmt,
    os::unix::io::{
        AsRawFd,
        FromRawFd,
        OwnedFd,
        RawFd,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Identifies an I/O resource to the readiness backend. Two resources are the same if they share a descriptor.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct ResourceId(pub RawFd);

/// Non-blocking byte stream over a file descriptor it owns.
pub struct Stream {
    fd: Option<OwnedFd>,
    id: ResourceId,
    eof: bool,
}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Anything a task can wait on for readability or writability.
pub trait Resource {
    /// Reads up to `size` bytes. An empty buffer means end of stream. Fails with `EAGAIN` when nothing is available
    /// yet.
    fn read(&mut self, size: usize) -> Result<Vec<u8>, Fail>;

    /// Writes as much of `data` as the resource accepts without blocking.
    fn write(&mut self, data: &[u8]) -> Result<usize, Fail>;

    /// Releases the resource. Closing twice is harmless.
    fn close(&mut self);

    fn resource_id(&self) -> ResourceId;

    /// Whether the resource is open and has not hit end of stream.
    fn is_alive(&self) -> bool;
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Stream {
    /// Takes ownership of `fd` and switches it to non-blocking mode. Fails with `EBADF` if `fd` is not open.
    pub fn from_raw_fd(fd: RawFd) -> Result<Self, Fail> {
        if unsafe { libc::fcntl(fd, libc::F_GETFD) } < 0 {
            let cause: String = format!("not an open descriptor (fd={:?})", fd);
            warn!("from_raw_fd(): {}", cause);
            return Err(Fail::new(libc::EBADF, &cause));
        }
        Self::from_owned(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    pub fn from_owned(fd: OwnedFd) -> Result<Self, Fail> {
        set_nonblocking(fd.as_raw_fd())?;
        Ok(Self {
            id: ResourceId(fd.as_raw_fd()),
            fd: Some(fd),
            eof: false,
        })
    }

    pub fn from_socket(socket: Socket) -> Result<Self, Fail> {
        socket.set_nonblocking(true)?;
        Self::from_owned(OwnedFd::from(socket))
    }

    /// Creates a pipe. Returns the read end first.
    pub fn pipe() -> Result<(Self, Self), Fail> {
        let mut fds: [c_int; 2] = [-1; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            let fail: Fail = Fail::last_os_error("failed to create pipe");
            error!("pipe(): {:?}", fail);
            return Err(fail);
        }
        let reader: OwnedFd = unsafe { OwnedFd::from_raw_fd(fds[0]) };
        let writer: OwnedFd = unsafe { OwnedFd::from_raw_fd(fds[1]) };
        Ok((Self::from_owned(reader)?, Self::from_owned(writer)?))
    }

    /// Creates a pair of connected Unix stream sockets.
    pub fn pair() -> Result<(Self, Self), Fail> {
        let (left, right): (Socket, Socket) = Socket::pair(Domain::UNIX, Type::STREAM, None)?;
        Ok((Self::from_socket(left)?, Self::from_socket(right)?))
    }

    fn descriptor(&self) -> Result<RawFd, Fail> {
        match &self.fd {
            Some(fd) => Ok(fd.as_raw_fd()),
            None => Err(Fail::new(libc::EBADF, "stream is closed")),
        }
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn set_nonblocking(fd: RawFd) -> Result<(), Fail> {
    let flags: c_int = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        let fail: Fail = Fail::last_os_error("failed to set O_NONBLOCK");
        warn!("set_nonblocking(): {:?} (fd={:?})", fail, fd);
        return Err(fail);
    }
    Ok(())
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Resource for Stream {
    fn read(&mut self, size: usize) -> Result<Vec<u8>, Fail> {
        if self.fd.is_none() {
            return Ok(Vec::new());
        }
        let fd: RawFd = self.descriptor()?;
        let mut buf: Vec<u8> = vec![0; size];
        let nread: isize = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, size) };
        if nread < 0 {
            return Err(Fail::last_os_error("read failed"));
        }
        if nread == 0 && size > 0 {
            self.eof = true;
        }
        buf.truncate(nread as usize);
        Ok(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Fail> {
        let fd: RawFd = self.descriptor()?;
        let nwritten: isize = unsafe { libc::write(fd, data.as_ptr() as *const libc::c_void, data.len()) };
        if nwritten < 0 {
            return Err(Fail::last_os_error("write failed"));
        }
        Ok(nwritten as usize)
    }

    fn close(&mut self) {
        if self.fd.take().is_some() {
            trace!("close(): fd={:?}", self.id);
        }
    }

    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.fd.is_some() && !self.eof
    }
}

impl AsRawFd for Stream {
    fn as_raw_fd(&self) -> RawFd {
        self.id.0
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("open", &self.fd.is_some())
            .field("eof", &self.eof)
            .finish()
    }
}

impl From<RawFd> for ResourceId {
    fn from(fd: RawFd) -> Self {
        Self(fd)
    }
}

impl From<ResourceId> for RawFd {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
