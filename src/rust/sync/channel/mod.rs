// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

mod ready;
mod spin;

pub use self::{
    ready::ReadyChannel,
    spin::{
        BufferedChannel,
        UnbufferedChannel,
    },
};

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::Yielder,
};
use ::async_trait::async_trait;

//======================================================================================================================
// Traits
//======================================================================================================================

/// Closable queue shared between tasks of one scheduler.
///
/// `recv` hands back the value it took and an `ok` flag. The flag is false once the channel is closed and nothing is
/// left to take after this call, so consumers drain with `loop { let (value, ok) = recv; ...; if !ok { break } }`.
/// Sending on a closed channel drops the value.
#[async_trait(?Send)]
pub trait Channel<T: 'static> {
    async fn send(&self, yielder: &Yielder, value: T) -> Result<(), Fail>;

    async fn recv(&self, yielder: &Yielder) -> Result<(Option<T>, bool), Fail>;

    fn close(&self);

    fn is_open(&self) -> bool;
}
