//! Settlement arithmetic for YES/NO milestone markets.
//!
//! Winners split 60% of the losing pool pro rata, the project creator takes
//! 30% of it when the milestone succeeds, and the platform keeps 10% of the
//! total pool. Every function here is pure: same inputs, same bits out, and
//! degenerate inputs (empty pools, non-positive amounts, non-finite numbers)
//! come back as zero rather than as an error or a NaN.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    Choice, Market, MarketStatus, PayoutRecord, PayoutStatus, SettlementError, Stake, Verdict,
};

/// Fraction of the losing pool shared among winning stakes.
pub const WINNER_SHARE: f64 = 0.60;

/// Fraction of the losing pool owed to the creator on a successful milestone.
pub const CREATOR_SHARE: f64 = 0.30;

/// Fraction of the total pool kept by the platform.
pub const PLATFORM_FEE: f64 = 0.10;

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct MarketOdds {
    pub yes_percentage: u8,
    pub no_percentage: u8,
    pub total_pool: f64,
}

/// Where the losing pool goes once a market is resolved.
///
/// Informational only: moving the funds belongs to the external settlement
/// authority.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct FeeSplit {
    pub winners_share: f64,
    pub creator_payout: f64,
    pub platform_fee: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Settlement {
    pub market_id: String,
    pub status: MarketStatus,
    pub payouts: Vec<PayoutRecord>,
    pub fees: FeeSplit,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct PortfolioSummary {
    /// Number of distinct markets the participant holds stakes in
    pub participation: usize,
    pub committed: f64,
    pub profit_loss: f64,
    pub positions: Vec<PayoutRecord>,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Caller-side check for a bet or stake amount.
pub fn validate_bet_amount(amount: f64) -> Result<f64, SettlementError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(SettlementError::InvalidAmount(amount))
    }
}

/// Reports markets whose settlement would pay nobody.
///
/// An empty market, or a resolved one with nothing staked on the winning
/// side, is `DegenerateMarket`. The computations still succeed on such
/// markets; this only lets callers notice.
pub fn validate_market(market: &Market) -> Result<(), SettlementError> {
    if !(market.total() > 0.0) {
        return Err(SettlementError::DegenerateMarket);
    }
    if let Some(winner) = market.winning_choice() {
        if !(market.pool(winner) > 0.0) {
            return Err(SettlementError::DegenerateMarket);
        }
    }
    Ok(())
}

/// `(stake_amount / winning_pool) * losing_pool * WINNER_SHARE`, with a zero
/// (or non-finite) winning pool guarded to zero.
pub fn compute_share_of_losing_pool(stake_amount: f64, winning_pool: f64, losing_pool: f64) -> f64 {
    if !winning_pool.is_finite() || winning_pool == 0.0 {
        return 0.0;
    }
    finite_or_zero((stake_amount / winning_pool) * losing_pool * WINNER_SHARE)
}

/// Profit a bettor would make on `chosen_side` if they placed `bet_amount` now
/// and that side won.
///
/// The bet is added to the winning pool before dividing, since it is not in
/// the pools yet. This is deliberately a different denominator from
/// [`compute_realized_payout`].
pub fn compute_potential_profit(
    yes_pool: f64,
    no_pool: f64,
    bet_amount: f64,
    chosen_side: Choice,
) -> f64 {
    let Ok(bet_amount) = validate_bet_amount(bet_amount) else {
        return 0.0;
    };
    let (winning_pool, losing_pool) = match chosen_side {
        Choice::Yes => (yes_pool, no_pool),
        Choice::No => (no_pool, yes_pool),
    };
    let new_winning_pool = winning_pool + bet_amount;
    compute_share_of_losing_pool(bet_amount, new_winning_pool, losing_pool)
}

/// Payout for a stake that is already counted in the market's pools.
///
/// Winning stakes earn their share of the losing pool on top of the returned
/// principal, losing stakes forfeit their amount. While the market is open
/// the record is `Pending` and values the stake as if its own side won.
pub fn compute_realized_payout(market: &Market, stake: &Stake) -> PayoutRecord {
    let (profit_loss, status) = match validate_bet_amount(stake.amount) {
        Err(_) => {
            debug!(
                market = %market.project_id,
                participant = %stake.participant_id,
                amount = stake.amount,
                "ignoring stake with invalid amount"
            );
            let status = match market.winning_choice() {
                None => PayoutStatus::Pending,
                Some(winner) if winner == stake.choice => PayoutStatus::Won,
                Some(_) => PayoutStatus::Lost,
            };
            (0.0, status)
        }
        Ok(amount) => match market.winning_choice() {
            Some(winner) if winner == stake.choice => (
                compute_share_of_losing_pool(
                    amount,
                    market.pool(winner),
                    market.pool(winner.opposite()),
                ),
                PayoutStatus::Won,
            ),
            Some(_) => (-amount, PayoutStatus::Lost),
            None => (
                compute_share_of_losing_pool(
                    amount,
                    market.pool(stake.choice),
                    market.pool(stake.choice.opposite()),
                ),
                PayoutStatus::Pending,
            ),
        },
    };

    PayoutRecord {
        market_id: market.project_id.clone(),
        participant_id: stake.participant_id.clone(),
        choice: stake.choice,
        stake_amount: finite_or_zero(stake.amount),
        profit_loss,
        status,
    }
}

/// `round(yes_pool / max(total_pool, 1) * 100)`, clamped to 0..=100.
pub fn compute_yes_percentage(yes_pool: f64, total_pool: f64) -> u8 {
    let percentage = (yes_pool / total_pool.max(1.0) * 100.0).round();
    if !percentage.is_finite() {
        return 0;
    }
    percentage.clamp(0.0, 100.0) as u8
}

/// Both sides go through [`compute_yes_percentage`] on their own. Totals
/// below 1 are divided by 1, so such markets show percentages that add up to
/// less than 100.
pub fn compute_odds(market: &Market) -> MarketOdds {
    let total_pool = finite_or_zero(market.total());
    MarketOdds {
        yes_percentage: compute_yes_percentage(market.yes_pool, total_pool),
        no_percentage: compute_yes_percentage(market.no_pool, total_pool),
        total_pool,
    }
}

pub fn compute_fee_split(market: &Market) -> FeeSplit {
    let platform_fee = finite_or_zero(market.total() * PLATFORM_FEE);
    let Some(verdict) = market.status.verdict() else {
        return FeeSplit {
            winners_share: 0.0,
            creator_payout: 0.0,
            platform_fee,
        };
    };

    let winner = verdict.winning_choice();
    let losing_pool = finite_or_zero(market.pool(winner.opposite()));
    let winners_share = if market.pool(winner) > 0.0 {
        losing_pool * WINNER_SHARE
    } else {
        0.0
    };
    let creator_payout = match verdict {
        Verdict::Success => losing_pool * CREATOR_SHARE,
        Verdict::Failure => 0.0,
    };

    FeeSplit {
        winners_share,
        creator_payout,
        platform_fee,
    }
}

/// One payout record per stake placed on `market`, plus the fee split.
pub fn settle_market(market: &Market, stakes: &[Stake]) -> Settlement {
    let payouts = stakes
        .iter()
        .filter(|stake| {
            let belongs = stake.market_id == market.project_id;
            if !belongs {
                warn!(
                    market = %market.project_id,
                    stake_market = %stake.market_id,
                    "skipping stake from another market"
                );
            }
            belongs
        })
        .map(|stake| compute_realized_payout(market, stake))
        .collect();

    Settlement {
        market_id: market.project_id.clone(),
        status: market.status,
        payouts,
        fees: compute_fee_split(market),
    }
}

/// Totals for one participant across every market they staked in.
pub fn summarize_portfolio(positions: &[(Market, Stake)]) -> PortfolioSummary {
    let participation = positions
        .iter()
        .map(|(market, _)| market.project_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let records: Vec<PayoutRecord> = positions
        .iter()
        .map(|(market, stake)| compute_realized_payout(market, stake))
        .collect();

    let committed = positions
        .iter()
        .map(|(_, stake)| finite_or_zero(stake.amount))
        .sum();
    let profit_loss = records.iter().map(|record| record.profit_loss).sum();

    PortfolioSummary {
        participation,
        committed,
        profit_loss,
        positions: records,
    }
}
