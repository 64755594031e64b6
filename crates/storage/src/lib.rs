// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tbot-storage: savegame persistence for the task runtime.

mod savegame;

pub use savegame::{Savegame, SavegameError, CURRENT_SAVEGAME_VERSION};
