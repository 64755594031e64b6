// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named events published on the in-process bus.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event names carried by the bus and pushed to stream clients.
///
/// `All` is the distinguished fan-in channel: its listeners receive every
/// emitted event together with the original name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
    All,
    BinLiveUpdate,
    CmcLatestUpdate,
    CryptoOrder,
    CryptoStats,
    CryptoTslUpdate,
    Logger,
    Savegame,
    StreamTickers,
    TaskFinished,
    TaskInfo,
    TaskManager,
    TaskModified,
    TickerUpdate,
}

impl EventName {
    /// The wire-format name (`TICKER_UPDATE`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::All => "ALL",
            EventName::BinLiveUpdate => "BIN_LIVE_UPDATE",
            EventName::CmcLatestUpdate => "CMC_LATEST_UPDATE",
            EventName::CryptoOrder => "CRYPTO_ORDER",
            EventName::CryptoStats => "CRYPTO_STATS",
            EventName::CryptoTslUpdate => "CRYPTO_TSL_UPDATE",
            EventName::Logger => "LOGGER",
            EventName::Savegame => "SAVEGAME",
            EventName::StreamTickers => "STREAM_TICKERS",
            EventName::TaskFinished => "TASK_FINISHED",
            EventName::TaskInfo => "TASK_INFO",
            EventName::TaskManager => "TASK_MANAGER",
            EventName::TaskModified => "TASK_MODIFIED",
            EventName::TickerUpdate => "TICKER_UPDATE",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
