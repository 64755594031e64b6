// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    all = { EventName::All, "ALL" },
    ticker = { EventName::TickerUpdate, "TICKER_UPDATE" },
    logger = { EventName::Logger, "LOGGER" },
    finished = { EventName::TaskFinished, "TASK_FINISHED" },
    savegame = { EventName::Savegame, "SAVEGAME" },
    tsl = { EventName::CryptoTslUpdate, "CRYPTO_TSL_UPDATE" },
)]
fn wire_names(event: EventName, expected: &str) {
    assert_eq!(event.as_str(), expected);
    assert_eq!(event.to_string(), expected);
    assert_eq!(
        serde_json::to_string(&event).unwrap(),
        format!("\"{expected}\"")
    );
}

#[test]
fn round_trips_through_serde() {
    let parsed: EventName = serde_json::from_str("\"TASK_MANAGER\"").unwrap();
    assert_eq!(parsed, EventName::TaskManager);
}
