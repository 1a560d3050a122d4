// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]

#[macro_use]
extern crate log;

pub mod config;
pub mod runtime;
pub mod sync;

pub use self::{
    config::{
        BackendKind,
        Config,
        SchedulerConfig,
    },
    runtime::{
        fail::Fail,
        scheduler::{
            Coroutine,
            Resume,
            SharedScheduler,
            Step,
            Task,
            TaskId,
            Timer,
            Yielder,
        },
    },
};

//======================================================================================================================
// Macros
//======================================================================================================================

/// Ensures that two expressions are equal, returning an error otherwise.
#[cfg(test)]
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                ::anyhow::ensure!(
                    *left_val == *right_val,
                    "ensure_eq!({}, {}) failed: left={:?}, right={:?}",
                    stringify!($left),
                    stringify!($right),
                    left_val,
                    right_val
                );
            },
        }
    }};
}

/// Ensures that two expressions are not equal, returning an error otherwise.
#[cfg(test)]
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                ::anyhow::ensure!(
                    *left_val != *right_val,
                    "ensure_neq!({}, {}) failed: left={:?}, right={:?}",
                    stringify!($left),
                    stringify!($right),
                    left_val,
                    right_val
                );
            },
        }
    }};
}
