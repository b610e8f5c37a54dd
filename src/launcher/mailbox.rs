// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The hand-off between the control thread and the render thread.
//!
//! A single mutex guards two queues and nothing else:
//! - commands flowing to the render thread, bounded and preallocated so the render
//!   thread can swap them out without allocating.
//! - notifications flowing back to the control thread. Same-kind notifications are
//!   merged, so this queue never holds more than one entry of each kind.

use std::collections::VecDeque;

use parking_lot::{Mutex, MutexGuard};

use super::command::{Command, Notification};

/// The queues shared by both threads.
pub struct Mailbox {
    queues: Mutex<Queues>,
    capacity: usize,
}

/// The contents of the mailbox, only reachable while holding the lock.
pub struct Queues {
    /// Commands waiting for the render thread.
    commands: VecDeque<Command>,
    /// Notifications waiting for the control thread.
    notifications: VecDeque<Notification>,
    capacity: usize,
}

impl Mailbox {
    /// Creates a mailbox that holds at most `capacity` pending commands.
    pub fn new(capacity: usize) -> Mailbox {
        let capacity = capacity.max(1);
        Mailbox {
            queues: Mutex::new(Queues {
                commands: VecDeque::with_capacity(capacity),
                notifications: VecDeque::with_capacity(2),
                capacity,
            }),
            capacity,
        }
    }

    /// The maximum number of pending commands.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Locks the mailbox.
    pub fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock()
    }
}

impl Queues {
    /// Appends commands if all of them fit. Returns false and leaves the queue untouched
    /// otherwise.
    pub fn push_commands<I>(&mut self, commands: I) -> bool
    where
        I: IntoIterator<Item = Command>,
        I::IntoIter: ExactSizeIterator,
    {
        let commands = commands.into_iter();
        if self.commands.len() + commands.len() > self.capacity {
            return false;
        }
        self.commands.extend(commands);
        true
    }

    /// Exchanges the pending commands with `other`, which must be empty. Both queues keep
    /// their allocations, so this never allocates.
    pub fn swap_commands(&mut self, other: &mut VecDeque<Command>) {
        debug_assert!(other.is_empty());
        std::mem::swap(&mut self.commands, other);
    }

    /// The number of commands waiting for the render thread.
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Posts a notification for the control thread. `BufCompleted` counts are merged
    /// into the pending entry, which always sits at the front. `AllQuiet` is posted at
    /// most once.
    pub fn post(&mut self, notification: Notification) {
        match notification {
            Notification::BufCompleted(count) => match self.notifications.front_mut() {
                Some(Notification::BufCompleted(pending)) => *pending += count,
                _ => self.notifications.push_front(notification),
            },
            Notification::AllQuiet => {
                if !self.notifications.contains(&Notification::AllQuiet) {
                    self.notifications.push_back(notification);
                }
            }
        }
    }

    /// Removes a leading `BufCompleted` entry and returns its count.
    pub fn take_completed(&mut self) -> usize {
        match self.notifications.front() {
            Some(&Notification::BufCompleted(count)) => {
                self.notifications.pop_front();
                count
            }
            _ => 0,
        }
    }

    /// Returns true if the render thread reported that no voices are live.
    pub fn is_all_quiet(&self) -> bool {
        self.notifications.contains(&Notification::AllQuiet)
    }

    /// Drops every pending notification.
    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
    }

    /// Drops a pending `AllQuiet` but keeps buffer counts.
    pub fn discard_all_quiet(&mut self) {
        self.notifications.retain(|n| *n != Notification::AllQuiet);
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }
}
