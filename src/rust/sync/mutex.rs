// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::{
        KillSwitch,
        TaskId,
        Yielder,
    },
};
use ::std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    rc::{
        Rc,
        Weak,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Exclusive,
    Shared,
}

struct Hold {
    /// Reentrancy count.
    count: usize,
    /// Kill flag of the holding task, when the hold was taken from inside it.
    switch: Option<KillSwitch>,
}

struct LockEntry {
    /// Protected object. Only a weak reference, so holding a lock does not keep the object alive.
    object: Weak<dyn Any>,
    mode: LockMode,
    holders: HashMap<TaskId, Hold>,
}

/// Lock table for objects shared between tasks. Objects are told apart by identity, not by value.
#[derive(Clone, Default)]
pub struct Mutex {
    entries: Rc<RefCell<HashMap<usize, LockEntry>>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Hold {
    fn is_killed(&self) -> bool {
        self.switch.as_ref().map_or(false, KillSwitch::is_tripped)
    }
}

impl LockEntry {
    fn is_dead(&self) -> bool {
        self.object.strong_count() == 0
    }

    fn hold(&mut self, owner: TaskId, switch: Option<KillSwitch>) {
        let hold: &mut Hold = self.holders.entry(owner).or_insert(Hold { count: 0, switch: None });
        hold.count += 1;
        if hold.switch.is_none() {
            hold.switch = switch;
        }
    }
}

impl Mutex {
    pub fn new() -> Self {
        Self::default()
    }

    fn key<T: Any>(object: &Rc<T>) -> usize {
        Rc::as_ptr(object) as *const () as usize
    }

    /// Looks up the live entry for `key`. Holds of killed tasks are dropped, and so is the entry once its object is
    /// gone or nobody holds it anymore.
    fn live_entry<'a>(entries: &'a mut HashMap<usize, LockEntry>, key: usize) -> Option<&'a mut LockEntry> {
        let stale: bool = match entries.get_mut(&key) {
            Some(entry) => {
                entry.holders.retain(|owner, hold| {
                    let killed: bool = hold.is_killed();
                    if killed {
                        debug!("live_entry(): dropping hold of killed task (owner={:?})", owner);
                    }
                    !killed
                });
                entry.is_dead() || entry.holders.is_empty()
            },
            None => false,
        };
        if stale {
            entries.remove(&key);
        }
        entries.get_mut(&key)
    }

    /// Tries to lock `object` on behalf of `owner`. Never waits.
    ///
    /// Succeeds if the object is free, if `owner` already holds it exclusively (in which case the lock stays
    /// exclusive) or if both the current holders and the request are shared. Shared locks are never upgraded.
    pub fn try_acquire<T: Any>(&self, object: &Rc<T>, owner: TaskId, mode: LockMode) -> bool {
        self.acquire(object, owner, None, mode)
    }

    fn acquire<T: Any>(&self, object: &Rc<T>, owner: TaskId, switch: Option<KillSwitch>, mode: LockMode) -> bool {
        let key: usize = Self::key(object);
        let mut entries = self.entries.borrow_mut();
        match Self::live_entry(&mut entries, key) {
            None => {
                let weak: Weak<dyn Any> = Rc::downgrade(object) as Weak<dyn Any>;
                let mut entry: LockEntry = LockEntry {
                    object: weak,
                    mode,
                    holders: HashMap::new(),
                };
                entry.hold(owner, switch);
                entries.insert(key, entry);
                true
            },
            Some(entry) => match (entry.mode, mode) {
                (LockMode::Exclusive, _) if entry.holders.contains_key(&owner) => {
                    entry.hold(owner, switch);
                    true
                },
                (LockMode::Shared, LockMode::Shared) => {
                    entry.hold(owner, switch);
                    true
                },
                _ => false,
            },
        }
    }

    /// Drops one level of `owner`'s hold on `object`. The object becomes free once every hold is released.
    pub fn release<T: Any>(&self, object: &Rc<T>, owner: TaskId) -> Result<(), Fail> {
        let key: usize = Self::key(object);
        let mut entries = self.entries.borrow_mut();
        let entry: &mut LockEntry = match Self::live_entry(&mut entries, key) {
            Some(entry) => entry,
            None => {
                let cause: String = format!("object is not locked (owner={:?})", owner);
                error!("release(): {}", cause);
                return Err(Fail::new(libc::EPERM, &cause));
            },
        };
        let hold: &mut Hold = match entry.holders.get_mut(&owner) {
            Some(hold) => hold,
            None => {
                let cause: String = format!("task does not hold the lock (owner={:?})", owner);
                error!("release(): {}", cause);
                return Err(Fail::new(libc::EPERM, &cause));
            },
        };
        hold.count -= 1;
        if hold.count == 0 {
            entry.holders.remove(&owner);
        }
        if entry.holders.is_empty() {
            entries.remove(&key);
        }
        Ok(())
    }

    pub fn is_locked<T: Any>(&self, object: &Rc<T>) -> bool {
        self.lock_mode(object).is_some()
    }

    pub fn lock_mode<T: Any>(&self, object: &Rc<T>) -> Option<LockMode> {
        let mut entries = self.entries.borrow_mut();
        Self::live_entry(&mut entries, Self::key(object)).map(|entry| entry.mode)
    }

    /// Acquires the lock for the running task, yielding once per failed attempt. The hold is dropped if the task is
    /// killed before releasing it.
    pub async fn lock<T: Any>(&self, yielder: &Yielder, object: &Rc<T>, mode: LockMode) -> Result<(), Fail> {
        while !self.acquire(object, yielder.task_id(), Some(yielder.kill_switch()), mode) {
            yielder.yield_once().await?;
        }
        Ok(())
    }

    /// Drops entries whose object was deallocated or whose holders were all killed. Returns how many were dropped.
    pub fn reap(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before: usize = entries.len();
        entries.retain(|_, entry| {
            entry.holders.retain(|_, hold| !hold.is_killed());
            !entry.is_dead() && !entry.holders.is_empty()
        });
        before - entries.len()
    }

    /// Number of lock entries, dead ones included until they are reaped.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
