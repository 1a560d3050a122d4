// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::flexi_logger::Logger;
use ::std::sync::Once;

//==============================================================================
// Constants
//==============================================================================

/// Log specification used when `RUST_LOG` is not set.
const DEFAULT_LOG_SPEC: &str = "warn";

//==============================================================================
// Static Variables
//==============================================================================

/// Guardian to the logging initialize function.
static INIT_LOG: Once = Once::new();

//==============================================================================
// Standalone Functions
//==============================================================================

/// Initializes logging features. The log level is driven by the `RUST_LOG` environment variable.
pub fn initialize() {
    INIT_LOG.call_once(|| {
        match Logger::try_with_env_or_str(DEFAULT_LOG_SPEC).and_then(|logger| logger.start()) {
            // The logger must stay installed for the lifetime of the process.
            Ok(handle) => ::std::mem::forget(handle),
            Err(e) => eprintln!("initialize(): could not start logger ({:?})", e),
        }
    });
}
