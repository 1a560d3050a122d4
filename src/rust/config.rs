// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::{
    fs::File,
    io::Read,
    ops::Index,
    str::FromStr,
    time::Duration,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Scheduler options.
mod scheduler_config {
    pub const SECTION_NAME: &str = "scheduler";
    // Poll timeout used when there is no ready or timer work, in milliseconds.
    pub const IDLE_TIMEOUT_MS: &str = "idle_timeout_ms";
    // Stop the run loop on SIGINT and SIGTERM.
    pub const HANDLE_SIGNALS: &str = "handle_signals";
    // Emit a log record for every task transition.
    pub const TRACE_TASKS: &str = "trace_tasks";
    // Readiness backend: "poll" or "epoll".
    pub const BACKEND: &str = "backend";
}

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);

//======================================================================================================================
// Structures
//======================================================================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Poll,
    Epoll,
}

/// Settings the scheduler reads once at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub idle_timeout: Duration,
    pub handle_signals: bool,
    pub trace_tasks: bool,
    pub backend: BackendKind,
}

/// Configuration document.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let mut config_s: String = String::new();
        if let Err(e) = File::open(config_path).and_then(|mut file| file.read_to_string(&mut config_s)) {
            let cause: String = format!("cannot read configuration file (path={:?}, error={:?})", config_path, e);
            error!("new(): {}", cause);
            return Err(Fail::new(e.raw_os_error().unwrap_or(libc::EIO), &cause));
        }
        config_s.parse()
    }

    /// Section that holds the scheduler options. A missing section means defaults everywhere.
    fn get_scheduler_config(&self) -> Result<Option<&Yaml>, Fail> {
        match self.0.index(scheduler_config::SECTION_NAME) {
            Yaml::BadValue | Yaml::Null => Ok(None),
            _ => Self::get_subsection(&self.0, scheduler_config::SECTION_NAME).map(Some),
        }
    }

    /// Reads the idle timeout from the environment first and then the configuration file.
    pub fn idle_timeout(&self) -> Result<Duration, Fail> {
        if let Some(millis) = Self::get_typed_env_option::<u64>(scheduler_config::IDLE_TIMEOUT_MS)? {
            return Ok(Duration::from_millis(millis));
        }
        match self.get_scheduler_option(scheduler_config::IDLE_TIMEOUT_MS)? {
            Some(section) => Ok(Duration::from_millis(Self::get_int_option(
                section,
                scheduler_config::IDLE_TIMEOUT_MS,
            )?)),
            None => Ok(DEFAULT_IDLE_TIMEOUT),
        }
    }

    pub fn handle_signals(&self) -> Result<bool, Fail> {
        self.get_flag(scheduler_config::HANDLE_SIGNALS)
    }

    pub fn trace_tasks(&self) -> Result<bool, Fail> {
        self.get_flag(scheduler_config::TRACE_TASKS)
    }

    pub fn backend(&self) -> Result<BackendKind, Fail> {
        if let Some(backend) = Self::get_typed_env_option::<BackendKind>(scheduler_config::BACKEND)? {
            return Ok(backend);
        }
        match self.get_scheduler_option(scheduler_config::BACKEND)? {
            Some(section) => Self::get_typed_str_option(section, scheduler_config::BACKEND, |s: &str| s.parse().ok()),
            None => Ok(BackendKind::Poll),
        }
    }

    /// Collects every scheduler option.
    pub fn scheduler_config(&self) -> Result<SchedulerConfig, Fail> {
        Ok(SchedulerConfig {
            idle_timeout: self.idle_timeout()?,
            handle_signals: self.handle_signals()?,
            trace_tasks: self.trace_tasks()?,
            backend: self.backend()?,
        })
    }

    fn get_flag(&self, index: &str) -> Result<bool, Fail> {
        if let Some(flag) = Self::get_typed_env_option::<bool>(index)? {
            return Ok(flag);
        }
        match self.get_scheduler_option(index)? {
            Some(section) => Self::get_bool_option(section, index),
            None => Ok(false),
        }
    }

    /// Returns the scheduler section if it holds `index`.
    fn get_scheduler_option(&self, index: &str) -> Result<Option<&Yaml>, Fail> {
        match self.get_scheduler_config()? {
            Some(section) if !section.index(index).is_badvalue() => Ok(Some(section)),
            _ => Ok(None),
        }
    }

    /// Index `yaml` to find the section at `index`, validating that it is a hash.
    fn get_subsection<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        let section: &'a Yaml = Self::get_option(yaml, index)?;
        match section {
            Yaml::Hash(_) => Ok(section),
            _ => {
                let message: String = format!("parameter \"{}\" has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists.
    fn get_option<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match yaml.index(index) {
            Yaml::BadValue => {
                let message: String = format!("missing configuration option \"{}\"", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
            value => Ok(value),
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it exists and that the receiver returns Some(_).
    fn get_typed_option<'a, T, Fn>(yaml: &'a Yaml, index: &str, receiver: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&'a Yaml) -> Option<T>,
    {
        let option: &'a Yaml = Self::get_option(yaml, index)?;
        match receiver(option) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("parameter {} has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find value at `index`, validating it as a string.
    fn get_typed_str_option<T, Fn>(yaml: &Yaml, index: &str, parser: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&str) -> Option<T>,
    {
        let option: &Yaml = Self::get_option(yaml, index)?;
        if let Some(value) = option.as_str() {
            if let Some(value) = parser(value) {
                return Ok(value);
            }
        }
        let message: String = format!("parameter {} has unexpected type", index);
        Err(Fail::new(libc::EINVAL, message.as_str()))
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            } else {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            }
        }
        Ok(None)
    }

    /// Similar to `get_typed_option` using `Yaml::as_i64` as the receiver, but additionally verifies that the
    /// destination type may hold the i64 value.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = Self::get_typed_option(yaml, index, &Yaml::as_i64)?;
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }

    /// Same as `Self::get_typed_option` using `Yaml::as_bool` as the receiver.
    fn get_bool_option(yaml: &Yaml, index: &str) -> Result<bool, Fail> {
        Self::get_typed_option(yaml, index, &Yaml::as_bool)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl FromStr for Config {
    type Err = Fail;

    fn from_str(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = match YamlLoader::load_from_str(config_s) {
            Ok(config) => config,
            Err(e) => {
                let cause: String = format!("malformed configuration ({})", e);
                error!("from_str(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        match &config[..] {
            [config_obj] => Ok(Self(config_obj.clone())),
            [] => Ok(Self(Yaml::Null)),
            _ => Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Fail;

    fn from_str(s: &str) -> Result<Self, Fail> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(BackendKind::Poll),
            "epoll" => Ok(BackendKind::Epoll),
            _ => Err(Fail::new(libc::EINVAL, &format!("unknown backend {:?}", s))),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            handle_signals: false,
            trace_tasks: false,
            backend: BackendKind::Poll,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
