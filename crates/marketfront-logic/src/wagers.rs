//! PvP wagers, the activity feed the volatility index samples.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{wager_statuses, Millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WagerStatus {
    Pending,
    Accepted,
    Declined,
    Settled,
}

impl WagerStatus {
    pub fn to_u8(self) -> u8 {
        match self {
            WagerStatus::Pending => wager_statuses::PENDING,
            WagerStatus::Accepted => wager_statuses::ACCEPTED,
            WagerStatus::Declined => wager_statuses::DECLINED,
            WagerStatus::Settled => wager_statuses::SETTLED,
        }
    }

    pub fn from_u8(val: u8) -> WagerStatus {
        match val {
            wager_statuses::ACCEPTED => WagerStatus::Accepted,
            wager_statuses::DECLINED => WagerStatus::Declined,
            wager_statuses::SETTLED => WagerStatus::Settled,
            _ => WagerStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: u64,
    pub challenger_id: u64,
    pub opponent_id: u64,
    pub stake: u64,
    pub status: WagerStatus,
    pub created_at: Millis,
}

/// Why a wager transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WagerRejection {
    #[error("only the challenged player can respond")]
    NotOpponent,
    #[error("not a party to this wager")]
    NotParticipant,
    #[error("wager is no longer pending")]
    NotPending,
    #[error("wager has not been accepted")]
    NotAccepted,
    #[error("cannot wager against yourself")]
    SelfWager,
    #[error("stake must be positive")]
    ZeroStake,
}

/// Validate a new wager before it is stored.
pub fn validate_new(challenger_id: u64, opponent_id: u64, stake: u64) -> Result<(), WagerRejection> {
    if challenger_id == opponent_id {
        return Err(WagerRejection::SelfWager);
    }
    if stake == 0 {
        return Err(WagerRejection::ZeroStake);
    }
    Ok(())
}

/// Opponent accepts or declines a pending wager.
pub fn respond(wager: &mut Wager, responder_id: u64, accept: bool) -> Result<(), WagerRejection> {
    if responder_id != wager.opponent_id {
        return Err(WagerRejection::NotOpponent);
    }
    if wager.status != WagerStatus::Pending {
        return Err(WagerRejection::NotPending);
    }
    wager.status = if accept {
        WagerStatus::Accepted
    } else {
        WagerStatus::Declined
    };
    Ok(())
}

/// Close an accepted wager. Either side may settle it.
pub fn settle(wager: &mut Wager, caller_id: u64) -> Result<(), WagerRejection> {
    if caller_id != wager.challenger_id && caller_id != wager.opponent_id {
        return Err(WagerRejection::NotParticipant);
    }
    if wager.status != WagerStatus::Accepted {
        return Err(WagerRejection::NotAccepted);
    }
    wager.status = WagerStatus::Settled;
    Ok(())
}

/// The other side of a wager, if `player_id` is one of its parties.
pub fn counterparty(wager: &Wager, player_id: u64) -> Option<u64> {
    if player_id == wager.challenger_id {
        Some(wager.opponent_id)
    } else if player_id == wager.opponent_id {
        Some(wager.challenger_id)
    } else {
        None
    }
}

/// Accepted wagers among `recent` (callers pass the latest N).
pub fn count_accepted(recent: &[Wager]) -> usize {
    recent
        .iter()
        .filter(|w| w.status == WagerStatus::Accepted)
        .count()
}
