// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::spindle::{
    runtime::logging,
    BackendKind,
    SchedulerConfig,
    SharedScheduler,
};
use ::std::time::Duration;

//======================================================================================================================
// Macros
//======================================================================================================================

/// Ensures that two expressions are equal, returning an error otherwise.
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

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Poll timeout used by test schedulers, so that idle passes do not slow tests down.
pub const TEST_IDLE_TIMEOUT: Duration = Duration::from_millis(10);

/// Builds a scheduler on top of the given backend.
pub fn scheduler_with(backend: BackendKind) -> anyhow::Result<SharedScheduler> {
    logging::initialize();
    let config: SchedulerConfig = SchedulerConfig {
        idle_timeout: TEST_IDLE_TIMEOUT,
        backend,
        ..Default::default()
    };
    Ok(SharedScheduler::new(config)?)
}

/// Builds a scheduler on top of the portable backend.
#[allow(dead_code)]
pub fn scheduler() -> anyhow::Result<SharedScheduler> {
    scheduler_with(BackendKind::Poll)
}

/// Backends available on this platform.
#[allow(dead_code)]
pub fn backends() -> Vec<BackendKind> {
    if cfg!(target_os = "linux") {
        vec![BackendKind::Poll, BackendKind::Epoll]
    } else {
        vec![BackendKind::Poll]
    }
}
