// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod channel;
pub mod mutex;

pub use self::{
    channel::{
        BufferedChannel,
        Channel,
        ReadyChannel,
        UnbufferedChannel,
    },
    mutex::{
        LockMode,
        Mutex,
    },
};
