use anyhow::anyhow;
use settlement::engine::{self, MarketOdds, PortfolioSummary, Settlement};
use settlement::{Choice, Market, SettlementError};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::database_manager::{DatabaseHandle, Responder};

pub enum SettlementRequest {
    Odds {
        project_id: String,
        responder: Responder<MarketOdds>,
    },
    PotentialProfit {
        project_id: String,
        choice: Choice,
        amount: f64,
        responder: Responder<f64>,
    },
    Settle {
        project_id: String,
        responder: Responder<Settlement>,
    },
    Portfolio {
        participant_id: String,
        responder: Responder<PortfolioSummary>,
    },
}

/// Runs the settlement engine over store snapshots. Never writes to the store.
pub struct SettlementManager {
    work_queue: mpsc::Receiver<SettlementRequest>,
    database: DatabaseHandle,
}

//NOTE: No functions in this impl may crash
impl SettlementManager {
    pub fn new(work_queue: mpsc::Receiver<SettlementRequest>, database: DatabaseHandle) -> Self {
        Self {
            work_queue,
            database,
        }
    }

    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            // we do not care if the receiver has already disappeared
            match request {
                SettlementRequest::Odds {
                    project_id,
                    responder,
                } => {
                    responder.send(self.odds(&project_id).await).ok();
                }
                SettlementRequest::PotentialProfit {
                    project_id,
                    choice,
                    amount,
                    responder,
                } => {
                    responder
                        .send(self.potential_profit(&project_id, choice, amount).await)
                        .ok();
                }
                SettlementRequest::Settle {
                    project_id,
                    responder,
                } => {
                    responder.send(self.settle(&project_id).await).ok();
                }
                SettlementRequest::Portfolio {
                    participant_id,
                    responder,
                } => {
                    responder.send(self.portfolio(&participant_id).await).ok();
                }
            }
        }
        debug!("settlement work queue closed");
    }

    async fn market(&self, project_id: &str) -> anyhow::Result<Market> {
        self.database
            .get_market(project_id)
            .await?
            .ok_or_else(|| anyhow!("unknown market {project_id}"))
    }

    async fn odds(&self, project_id: &str) -> anyhow::Result<MarketOdds> {
        Ok(engine::compute_odds(&self.market(project_id).await?))
    }

    async fn potential_profit(
        &self,
        project_id: &str,
        choice: Choice,
        amount: f64,
    ) -> anyhow::Result<f64> {
        let market = self.market(project_id).await?;
        // a resolved market takes no more stakes, so there is nothing to quote
        if !market.status.is_open() {
            return Err(SettlementError::MarketClosed.into());
        }
        Ok(engine::compute_potential_profit(
            market.yes_pool,
            market.no_pool,
            amount,
            choice,
        ))
    }

    async fn settle(&self, project_id: &str) -> anyhow::Result<Settlement> {
        let market = self.market(project_id).await?;
        let stakes = self.database.get_stakes_for_market(project_id).await?;

        if let Err(error) = engine::validate_market(&market) {
            warn!(market = project_id, %error, "settling a market that pays nobody");
        }
        Ok(engine::settle_market(&market, &stakes))
    }

    async fn portfolio(&self, participant_id: &str) -> anyhow::Result<PortfolioSummary> {
        let stakes = self.database.get_stakes_by_participant(participant_id).await?;

        let mut markets: HashMap<String, Market> = HashMap::new();
        let mut positions = Vec::with_capacity(stakes.len());
        for stake in stakes {
            let market = match markets.get(&stake.market_id) {
                Some(market) => market.clone(),
                None => {
                    let market = self.market(&stake.market_id).await?;
                    markets.insert(stake.market_id.clone(), market.clone());
                    market
                }
            };
            positions.push((market, stake));
        }

        Ok(engine::summarize_portfolio(&positions))
    }
}
