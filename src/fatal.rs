//! Fatal-condition guard.
//!
//! The first [`FatalConditionGuard`] installs one process-wide panic hook
//! that stays for the life of the process. While a guard is alive on a
//! thread, panics on that thread are recorded (message and site) instead of
//! printed. Panics on threads without a live guard are forwarded to the hook
//! that was installed before. Guards only touch a thread-local slot, so
//! guards on different threads may be dropped in any order.
//!
//! A panic whose payload is a [`FatalCondition`] is how code that cannot
//! return an [`Interrupt`](crate::errors::Interrupt) reports an
//! unrecoverable fault; the run context turns it into `Interrupt::Fatal`.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use crate::location::SourceLocation;

/// Panic payload that ends the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalCondition {
    pub message: String,
}

impl FatalCondition {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Unwinds with a [`FatalCondition`] payload.
pub fn raise_fatal(message: impl Into<String>) -> ! {
    std::panic::panic_any(FatalCondition::new(message))
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(fatal) = payload.downcast_ref::<FatalCondition>() {
        fatal.message.clone()
    } else if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// What the hook saw for the most recent panic on the guarded thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicRecord {
    pub message: String,
    pub location: Option<SourceLocation>,
}

type PanicSlot = Rc<RefCell<Option<PanicRecord>>>;

thread_local! {
    static ACTIVE_GUARD: RefCell<Option<PanicSlot>> = RefCell::new(None);
}

static INSTALL_HOOK: Once = Once::new();

fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let Some(slot) = active_slot() else {
                previous(info);
                return;
            };
            let location = info
                .location()
                .map(|loc| SourceLocation::at(loc.file(), loc.line(), loc.column()));
            let record = PanicRecord {
                message: panic_message(info.payload()),
                location,
            };
            if let Ok(mut last) = slot.try_borrow_mut() {
                *last = Some(record);
            };
        }));
    });
}

fn active_slot() -> Option<PanicSlot> {
    ACTIVE_GUARD
        .try_with(|active| active.try_borrow().ok().and_then(|slot| slot.clone()))
        .ok()
        .flatten()
}

/// Records panics on the current thread while alive.
///
/// Guards nest on one thread: dropping the inner one reactivates the outer.
/// Dropping a guard that is no longer the innermost leaves the slot alone.
pub struct FatalConditionGuard {
    last_panic: PanicSlot,
    outer: Option<PanicSlot>,
    active: bool,
}

impl FatalConditionGuard {
    pub fn install() -> Self {
        install_hook();
        let last_panic: PanicSlot = Rc::new(RefCell::new(None));
        let outer = ACTIVE_GUARD.with(|active| active.replace(Some(Rc::clone(&last_panic))));
        Self {
            last_panic,
            outer,
            active: true,
        }
    }

    pub fn last_panic(&self) -> Option<PanicRecord> {
        self.last_panic.borrow().clone()
    }

    /// Stops recording now instead of at drop.
    pub fn reset(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        let outer = self.outer.take();
        let own = Rc::clone(&self.last_panic);
        let _ = ACTIVE_GUARD.try_with(|active| {
            if let Ok(mut slot) = active.try_borrow_mut() {
                if slot.as_ref().map_or(false, |current| Rc::ptr_eq(current, &own)) {
                    *slot = outer;
                }
            }
        });
    }
}

impl Drop for FatalConditionGuard {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn payload_text_is_extracted() {
        assert_eq!(panic_message(&"static str"), "static str");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&FatalCondition::new("segfault")), "segfault");
        assert_eq!(panic_message(&42u8), "unknown panic payload");
    }

    #[test]
    fn guard_records_panics_on_its_thread() {
        let guard = FatalConditionGuard::install();
        let result = catch_unwind(AssertUnwindSafe(|| panic!("recorded {}", 7)));
        assert!(result.is_err());
        if let Some(record) = guard.last_panic() {
            assert_eq!(record.message, "recorded 7");
            assert!(record.location.is_some());
        }
    }

    #[test]
    fn dropped_guard_stops_recording() {
        let guard = FatalConditionGuard::install();
        let slot = Rc::clone(&guard.last_panic);
        drop(guard);
        let result = catch_unwind(|| panic!("nobody is listening"));
        assert!(result.is_err());
        assert!(slot.borrow().is_none());
    }

    #[test]
    fn nested_guards_restore_the_outer_one() {
        let outer = FatalConditionGuard::install();
        let inner = FatalConditionGuard::install();
        drop(inner);
        let _ = catch_unwind(|| panic!("for the outer guard"));
        assert_eq!(
            outer.last_panic().map(|record| record.message).as_deref(),
            Some("for the outer guard")
        );
    }

    #[test]
    fn guards_on_two_threads_release_in_any_order() {
        let barrier = Arc::new(Barrier::new(2));
        let other = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait(); // first guard installed
                let second = FatalConditionGuard::install();
                barrier.wait(); // second guard installed
                barrier.wait(); // first guard dropped
                drop(second);
                barrier.wait(); // both dropped
            })
        };

        let first = FatalConditionGuard::install();
        let first_slot = Rc::clone(&first.last_panic);
        barrier.wait();
        barrier.wait();
        drop(first);
        barrier.wait();
        barrier.wait();
        other.join().unwrap();

        let result = catch_unwind(|| panic!("after both guards dropped"));
        assert!(result.is_err());
        assert!(first_slot.borrow().is_none());

        let fresh = FatalConditionGuard::install();
        let _ = catch_unwind(|| panic!("seen by the fresh guard"));
        assert_eq!(
            fresh.last_panic().map(|record| record.message).as_deref(),
            Some("seen by the fresh guard")
        );
    }

    #[test]
    fn raise_fatal_unwinds_with_fatal_payload() {
        let result = catch_unwind(|| raise_fatal("stack smashed"));
        let payload = result.unwrap_err();
        let fatal = payload.downcast_ref::<FatalCondition>().unwrap();
        assert_eq!(fatal.message, "stack smashed");
    }
}
