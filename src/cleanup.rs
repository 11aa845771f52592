//! Guaranteed teardown of everything a case creates.
//!
//! Every resource registers its release action right after being created. Actions run in reverse
//! registration order when the stack is released or dropped, so they also run when a step fails
//! with `?` or the thread unwinds from a panic.
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure while releasing a resource. It is logged, never propagated over the case result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cleaning up {resource}: {reason}")]
pub struct CleanupError {
    pub resource: String,
    pub reason: String,
}

type ReleaseAction<'a> = Box<dyn FnOnce() -> Result<(), String> + 'a>;

#[derive(Default)]
pub struct CleanupStack<'a> {
    actions: Vec<(String, ReleaseAction<'a>)>,
}

impl<'a> CleanupStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the release action for `resource`.
    pub fn defer<F, E>(&mut self, resource: impl Into<String>, action: F)
    where
        F: FnOnce() -> Result<(), E> + 'a,
        E: Display,
    {
        let resource = resource.into();
        debug!(%resource, "registered cleanup");
        self.actions.push((
            resource,
            Box::new(move || action().map_err(|err| err.to_string())),
        ));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs every pending action, last registered first. All of them run even if some fail.
    pub fn release_all(&mut self) -> Vec<CleanupError> {
        let mut errors = Vec::new();
        while let Some((resource, action)) = self.actions.pop() {
            debug!(%resource, "cleaning up");
            if let Err(reason) = action() {
                let err = CleanupError { resource, reason };
                warn!(%err, "cleanup failed");
                errors.push(err);
            }
        }
        errors
    }
}

impl Drop for CleanupStack<'_> {
    fn drop(&mut self) {
        let _ = self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tracing_test::traced_test;

    #[test]
    fn releases_in_reverse_order() {
        let released = RefCell::new(Vec::new());
        {
            let mut stack = CleanupStack::new();
            for name in ["override", "stack", "namespace"] {
                let released = &released;
                stack.defer(name, move || {
                    released.borrow_mut().push(name);
                    Ok::<_, String>(())
                });
            }
            assert_eq!(stack.len(), 3);
        }
        assert_eq!(*released.borrow(), vec!["namespace", "stack", "override"]);
    }

    #[test]
    #[traced_test]
    fn failing_action_does_not_stop_the_rest() {
        let released = RefCell::new(Vec::new());
        let mut stack = CleanupStack::new();
        stack.defer("first", || {
            released.borrow_mut().push("first");
            Ok::<_, String>(())
        });
        stack.defer("second", || Err("api unavailable"));

        let errors = stack.release_all();

        assert_eq!(
            errors,
            vec![CleanupError {
                resource: "second".to_string(),
                reason: "api unavailable".to_string()
            }]
        );
        assert_eq!(*released.borrow(), vec!["first"]);
        assert!(stack.is_empty());
        assert!(logs_contain("cleanup failed"));
    }

    #[test]
    fn actions_run_once() {
        let count = RefCell::new(0);
        let mut stack = CleanupStack::new();
        stack.defer("namespace", || {
            *count.borrow_mut() += 1;
            Ok::<_, String>(())
        });
        assert!(stack.release_all().is_empty());
        drop(stack);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn runs_on_early_return() {
        fn failing_step(released: &RefCell<bool>) -> Result<(), String> {
            let mut stack = CleanupStack::new();
            stack.defer("namespace", || {
                *released.borrow_mut() = true;
                Ok::<_, String>(())
            });
            Err::<(), _>("claim never bound".to_string())?;
            drop(stack);
            Ok(())
        }

        let released = RefCell::new(false);
        assert!(failing_step(&released).is_err());
        assert!(*released.borrow());
    }
}
