// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Suspension helpers for task bodies.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    resource::{
        Resource,
        ResourceId,
    },
    scheduler::{
        Resume,
        Yielder,
    },
};
use ::std::time::{
    Duration,
    Instant,
};

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Suspends the running task until `resource` is readable.
pub async fn wait_readable(yielder: &Yielder, resource: ResourceId) -> Result<(), Fail> {
    yielder.signal(move |resume: Resume| resume.on_read(resource)).await?;
    Ok(())
}

/// Suspends the running task until `resource` is writable.
pub async fn wait_writable(yielder: &Yielder, resource: ResourceId) -> Result<(), Fail> {
    yielder.signal(move |resume: Resume| resume.on_write(resource)).await?;
    Ok(())
}

pub async fn sleep(yielder: &Yielder, duration: Duration) -> Result<(), Fail> {
    sleep_until(yielder, Instant::now() + duration).await
}

pub async fn sleep_until(yielder: &Yielder, deadline: Instant) -> Result<(), Fail> {
    yielder.signal(move |resume: Resume| resume.schedule_at(deadline)).await?;
    Ok(())
}

/// Reads up to `size` bytes, waiting for the resource to become readable as needed. An empty buffer means end of
/// stream.
pub async fn read<R: Resource + ?Sized>(yielder: &Yielder, resource: &mut R, size: usize) -> Result<Vec<u8>, Fail> {
    loop {
        match resource.read(size) {
            Err(e) if e.is_would_block() => wait_readable(yielder, resource.resource_id()).await?,
            result => return result,
        }
    }
}

/// Writes all of `data`, waiting for the resource to become writable as needed. A resource that accepts nothing
/// without reporting would-block fails with `EPIPE`.
pub async fn write_all<R: Resource + ?Sized>(yielder: &Yielder, resource: &mut R, data: &[u8]) -> Result<(), Fail> {
    let mut offset: usize = 0;
    while offset < data.len() {
        match resource.write(&data[offset..]) {
            Ok(0) => {
                let cause: String = format!("resource accepts no more data (resource={:?})", resource.resource_id());
                warn!("write_all(): {}", cause);
                return Err(Fail::new(libc::EPIPE, &cause));
            },
            Ok(nwritten) => offset += nwritten,
            Err(e) if e.is_would_block() => wait_writable(yielder, resource.resource_id()).await?,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
