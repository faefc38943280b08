// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::{Executor, Work};

/// An executor that runs every work item on the calling thread, immediately.
///
/// Useful for making asynchronous APIs behave synchronously: launching a
/// task on this executor runs it to completion before the future handle is
/// even returned.
#[derive(Copy, Clone, Debug, Default)]
pub struct InlineExecutor;

// === impl InlineExecutor ===

impl Executor for InlineExecutor {
    fn execute(&self, work: Work) {
        work();
    }

    fn concurrency_hint(&self) -> usize {
        1
    }

    fn runs_inline(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_on_calling_thread() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let here = std::thread::current().id();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        InlineExecutor.execute(Box::new(move || {
            assert_eq!(std::thread::current().id(), here);
            flag.store(true, Ordering::SeqCst);
        }));

        // `execute` returns only after the item ran
        assert!(ran.load(Ordering::SeqCst));
        assert!(InlineExecutor.runs_inline());
    }
}
