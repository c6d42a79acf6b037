//! State store key layout.

use alloy_primitives::Address;
use chrono::NaiveDate;

use crate::history::Direction;

pub(crate) fn last_issued_cheque(token: Address, beneficiary: Address) -> String {
    format!("swap_chequebook_last_issued_cheque_{token}_{beneficiary}")
}

pub(crate) fn last_issued_cheque_prefix(token: Address) -> String {
    format!("swap_chequebook_last_issued_cheque_{token}_")
}

pub(crate) fn total_issued(token: Address) -> String {
    format!("swap_chequebook_total_issued_{token}")
}

pub(crate) fn total_issued_count(token: Address) -> String {
    format!("swap_chequebook_total_issued_count_{token}")
}

pub(crate) fn last_received_cheque(chequebook: Address, token: Address) -> String {
    format!("swap_chequestore_last_received_cheque_{chequebook}_{token}")
}

pub(crate) const LAST_RECEIVED_CHEQUE_PREFIX: &str = "swap_chequestore_last_received_cheque_";

pub(crate) fn uncashed_count(chequebook: Address, token: Address) -> String {
    format!("swap_chequestore_uncashed_count_{chequebook}_{token}")
}

pub(crate) fn history_record(direction: Direction, counterparty: Address, index: u64) -> String {
    format!("swap_history_{direction}_{counterparty}_{index:020}")
}

pub(crate) fn history_range(direction: Direction, counterparty: Address) -> String {
    format!("swap_history_range_{direction}_{counterparty}")
}

pub(crate) fn daily_stats(direction: Direction, date: NaiveDate, token: Address) -> String {
    format!("swap_stats_{direction}_{date}_{token}")
}

pub(crate) fn daily_stats_prefix(direction: Direction) -> String {
    format!("swap_stats_{direction}_")
}

pub(crate) fn cashout_action(chequebook: Address, token: Address) -> String {
    format!("swap_cashout_{chequebook}_{token}")
}
