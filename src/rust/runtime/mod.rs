// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod backend;
pub mod fail;
pub mod io;
pub mod logging;
pub mod resource;
pub mod scheduler;

pub use self::{
    fail::Fail,
    resource::{
        Resource,
        ResourceId,
        Stream,
    },
    scheduler::{
        SharedScheduler,
        Task,
        TaskId,
        Yielder,
    },
};
