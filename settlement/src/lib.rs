use serde::{Deserialize, Serialize};

pub mod engine;
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod network;

pub use error::SettlementError;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Yes,
    No,
}

impl Choice {
    pub fn opposite(self) -> Self {
        match self {
            Choice::Yes => Choice::No,
            Choice::No => Choice::Yes,
        }
    }
}

/// Outcome of the milestone review that closes a market.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    pub fn winning_choice(self) -> Choice {
        match self {
            Verdict::Success => Choice::Yes,
            Verdict::Failure => Choice::No,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Open,
    ResolvedSuccess,
    ResolvedFailure,
}

impl MarketStatus {
    pub fn verdict(self) -> Option<Verdict> {
        match self {
            MarketStatus::Open => None,
            MarketStatus::ResolvedSuccess => Some(Verdict::Success),
            MarketStatus::ResolvedFailure => Some(Verdict::Failure),
        }
    }

    pub fn is_open(self) -> bool {
        self == MarketStatus::Open
    }
}

impl From<Verdict> for MarketStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Success => MarketStatus::ResolvedSuccess,
            Verdict::Failure => MarketStatus::ResolvedFailure,
        }
    }
}

/// Snapshot of one project's milestone market.
///
/// Pools only grow, through [`Market::record_stake`], and the status leaves
/// `Open` exactly once, through [`Market::resolve`].
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Market {
    pub project_id: String,
    pub yes_pool: f64,
    pub no_pool: f64,
    pub status: MarketStatus,
}

impl Market {
    pub fn open(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            yes_pool: 0.0,
            no_pool: 0.0,
            status: MarketStatus::Open,
        }
    }

    pub fn total(&self) -> f64 {
        self.yes_pool + self.no_pool
    }

    pub fn pool(&self, choice: Choice) -> f64 {
        match choice {
            Choice::Yes => self.yes_pool,
            Choice::No => self.no_pool,
        }
    }

    pub fn winning_choice(&self) -> Option<Choice> {
        self.status.verdict().map(Verdict::winning_choice)
    }

    pub fn record_stake(&mut self, stake: &Stake) -> Result<(), SettlementError> {
        if stake.market_id != self.project_id {
            return Err(SettlementError::MarketMismatch);
        }
        if !self.status.is_open() {
            return Err(SettlementError::MarketClosed);
        }
        let amount = engine::validate_bet_amount(stake.amount)?;
        match stake.choice {
            Choice::Yes => self.yes_pool += amount,
            Choice::No => self.no_pool += amount,
        }
        Ok(())
    }

    pub fn resolve(&mut self, verdict: Verdict) -> Result<(), SettlementError> {
        if !self.status.is_open() {
            return Err(SettlementError::AlreadyResolved);
        }
        self.status = verdict.into();
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Stake {
    pub market_id: String,
    pub participant_id: String,
    pub choice: Choice,
    pub amount: f64,
}

impl Stake {
    pub fn new(
        market_id: impl Into<String>,
        participant_id: impl Into<String>,
        choice: Choice,
        amount: f64,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            participant_id: participant_id.into(),
            choice,
            amount,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Won,
    Lost,
}

// Derived from a market and a stake on demand, never stored
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct PayoutRecord {
    pub market_id: String,
    pub participant_id: String,
    pub choice: Choice,
    pub stake_amount: f64,
    pub profit_loss: f64,
    pub status: PayoutStatus,
}
