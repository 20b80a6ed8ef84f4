use settlement::{Market, Stake, Verdict};
use surrealdb::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::database::DatabaseConnection;

pub type Responder<T> = oneshot::Sender<anyhow::Result<T>>;

pub enum DatabaseRequest {
    GetMarket {
        project_id: String,
        responder: Responder<Option<Market>>,
    },
    GetAllMarkets {
        responder: Responder<Vec<Market>>,
    },
    CreateMarket {
        project_id: String,
        responder: Responder<Market>,
    },
    InsertStake {
        stake: Stake,
        responder: Responder<Market>,
    },
    ResolveMarket {
        project_id: String,
        verdict: Verdict,
        responder: Responder<Market>,
    },
    GetStakesForMarket {
        project_id: String,
        responder: Responder<Vec<Stake>>,
    },
    GetStakesByParticipant {
        participant_id: String,
        responder: Responder<Vec<Stake>>,
    },
}

/// Sole owner of the database handle. Requests are applied one at a time,
/// so concurrent stake insertions never race on a pool.
pub struct DatabaseManager<Conn: Connection> {
    db_connection: DatabaseConnection<Conn>,
    work_queue: mpsc::Receiver<DatabaseRequest>,
}

pub fn transform_err<T>(error: surrealdb::Result<T>) -> anyhow::Result<T> {
    match error {
        Ok(t) => Ok(t),
        Err(e) => Err(e.into()),
    }
}

fn into_domain<T, U: From<T>>(rows: Vec<T>) -> Vec<U> {
    rows.into_iter().map(U::from).collect()
}

impl<Conn: Connection> DatabaseManager<Conn> {
    pub fn new(
        db_connection: DatabaseConnection<Conn>,
        work_queue: mpsc::Receiver<DatabaseRequest>,
    ) -> Self {
        Self {
            db_connection,
            work_queue,
        }
    }

    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            match request {
                DatabaseRequest::GetMarket {
                    project_id,
                    responder,
                } => {
                    let resp = transform_err(self.db_connection.get_market(&project_id).await)
                        .map(|market| market.map(Market::from));
                    let _ = responder.send(resp);
                }
                DatabaseRequest::GetAllMarkets { responder } => {
                    let resp =
                        transform_err(self.db_connection.get_all_markets().await).map(into_domain);
                    let _ = responder.send(resp);
                }
                DatabaseRequest::CreateMarket {
                    project_id,
                    responder,
                } => {
                    let resp = self.db_connection.create_market(&project_id).await;
                    let _ = responder.send(resp);
                }
                DatabaseRequest::InsertStake { stake, responder } => {
                    let resp = self.db_connection.insert_stake(&stake).await;
                    let _ = responder.send(resp);
                }
                DatabaseRequest::ResolveMarket {
                    project_id,
                    verdict,
                    responder,
                } => {
                    let resp = self
                        .db_connection
                        .resolve_market(&project_id, verdict)
                        .await;
                    let _ = responder.send(resp);
                }
                DatabaseRequest::GetStakesForMarket {
                    project_id,
                    responder,
                } => {
                    let resp = transform_err(
                        self.db_connection.get_stakes_for_market(&project_id).await,
                    )
                    .map(into_domain);
                    let _ = responder.send(resp);
                }
                DatabaseRequest::GetStakesByParticipant {
                    participant_id,
                    responder,
                } => {
                    let resp = transform_err(
                        self.db_connection
                            .get_stakes_by_participant(&participant_id)
                            .await,
                    )
                    .map(into_domain);
                    let _ = responder.send(resp);
                }
            }
        }
        debug!("database work queue closed");
    }
}

/// Cloneable handle for sending requests to a [`DatabaseManager`].
#[derive(Clone)]
pub struct DatabaseHandle {
    requester: mpsc::Sender<DatabaseRequest>,
}

impl DatabaseHandle {
    pub fn new(requester: mpsc::Sender<DatabaseRequest>) -> Self {
        Self { requester }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Responder<T>) -> DatabaseRequest,
    ) -> anyhow::Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.requester.send(build(resp_tx)).await?;
        resp_rx.await?
    }

    pub async fn get_market(&self, project_id: &str) -> anyhow::Result<Option<Market>> {
        let project_id = project_id.to_owned();
        self.request(|responder| DatabaseRequest::GetMarket {
            project_id,
            responder,
        })
        .await
    }

    pub async fn get_all_markets(&self) -> anyhow::Result<Vec<Market>> {
        self.request(|responder| DatabaseRequest::GetAllMarkets { responder })
            .await
    }

    pub async fn create_market(&self, project_id: &str) -> anyhow::Result<Market> {
        let project_id = project_id.to_owned();
        self.request(|responder| DatabaseRequest::CreateMarket {
            project_id,
            responder,
        })
        .await
    }

    pub async fn insert_stake(&self, stake: Stake) -> anyhow::Result<Market> {
        self.request(|responder| DatabaseRequest::InsertStake { stake, responder })
            .await
    }

    pub async fn resolve_market(&self, project_id: &str, verdict: Verdict) -> anyhow::Result<Market> {
        let project_id = project_id.to_owned();
        self.request(|responder| DatabaseRequest::ResolveMarket {
            project_id,
            verdict,
            responder,
        })
        .await
    }

    pub async fn get_stakes_for_market(&self, project_id: &str) -> anyhow::Result<Vec<Stake>> {
        let project_id = project_id.to_owned();
        self.request(|responder| DatabaseRequest::GetStakesForMarket {
            project_id,
            responder,
        })
        .await
    }

    pub async fn get_stakes_by_participant(&self, participant_id: &str) -> anyhow::Result<Vec<Stake>> {
        let participant_id = participant_id.to_owned();
        self.request(|responder| DatabaseRequest::GetStakesByParticipant {
            participant_id,
            responder,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlement::{Choice, MarketStatus};

    async fn spawn_manager() -> DatabaseHandle {
        let database = DatabaseConnection::in_memory("test", "markets").await.unwrap();
        let (db_tx, db_rx) = mpsc::channel(8);
        let mut manager = DatabaseManager::new(database, db_rx);
        tokio::spawn(async move { manager.manage().await });
        DatabaseHandle::new(db_tx)
    }

    #[tokio::test]
    async fn test_concurrent_stakes_all_land_in_pools() {
        let db = spawn_manager().await;
        db.create_market("solar-farm").await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move {
                let choice = if i % 2 == 0 { Choice::Yes } else { Choice::No };
                db.insert_stake(Stake::new("solar-farm", format!("p{i}"), choice, 10.0))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let market = db.get_market("solar-farm").await.unwrap().unwrap();
        assert_eq!(market.yes_pool, 100.0);
        assert_eq!(market.no_pool, 100.0);
        assert_eq!(db.get_stakes_for_market("solar-farm").await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_resolve_through_handle() {
        let db = spawn_manager().await;
        db.create_market("solar-farm").await.unwrap();
        db.create_market("wind-farm").await.unwrap();

        let market = db.resolve_market("wind-farm", Verdict::Success).await.unwrap();
        assert_eq!(market.status, MarketStatus::ResolvedSuccess);
        assert!(db.resolve_market("wind-farm", Verdict::Failure).await.is_err());
        assert!(db.resolve_market("tidal", Verdict::Failure).await.is_err());

        let mut ids: Vec<String> = db
            .get_all_markets()
            .await
            .unwrap()
            .into_iter()
            .map(|market| market.project_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["solar-farm".to_string(), "wind-farm".to_string()]);
    }
}
