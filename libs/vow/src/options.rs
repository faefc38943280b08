// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use bitflags::bitflags;

bitflags! {
    /// Feature set of an operation state.
    ///
    /// The flags are orthogonal and compose; which auxiliary structures a
    /// state allocates (continuation list, stop source, executor handle,
    /// deferred task slot) is decided by its options at construction.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub(crate) struct Options: u8 {
        /// The state owns a continuation list.
        const CONTINUABLE = 0b0000_0001;
        /// The state owns a stop source.
        const STOPPABLE = 0b0000_0010;
        /// The state is read through shared handles; results are copied out
        /// instead of moved.
        const SHARED = 0b0000_0100;
        /// The task is captured in the state and runs inline on first wait.
        const DEFERRED = 0b0000_1000;
        /// The state carries an executor used to dispatch late continuations.
        const HAS_EXECUTOR = 0b0001_0000;
    }
}
