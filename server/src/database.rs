use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use settlement::{Choice, Market, MarketStatus, Stake, Verdict};
use surrealdb::engine::local::{Db, Mem};
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::sql::statements::{BeginStatement, CommitStatement};
use surrealdb::sql::{Id, Thing};
use surrealdb::{Connection, Result, Surreal};
use tracing::{debug, info};

const MARKET_TABLE: &str = "market";
const STAKE_TABLE: &str = "stake";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbMarket {
    pub id: Thing,
    pub yes_pool: f64,
    pub no_pool: f64,
    pub status: MarketStatus,
    /// Number of stakes placed, bumped with the pool on every insert
    #[serde(default)]
    pub stake_count: u64,
}

impl DbMarket {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            id: market_thing(project_id),
            yes_pool: 0.0,
            no_pool: 0.0,
            status: MarketStatus::Open,
            stake_count: 0,
        }
    }
}

impl From<DbMarket> for Market {
    fn from(value: DbMarket) -> Self {
        Market {
            project_id: value.id.id.to_raw(),
            yes_pool: value.yes_pool,
            no_pool: value.no_pool,
            status: value.status,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbStake {
    pub id: Thing,
    pub market: Thing,
    pub participant: String,
    pub choice: Choice,
    pub amount: f64,
}

impl DbStake {
    pub fn new(stake: &Stake) -> Self {
        Self {
            id: Thing {
                tb: STAKE_TABLE.into(),
                id: Id::rand(),
            },
            market: market_thing(stake.market_id.clone()),
            participant: stake.participant_id.clone(),
            choice: stake.choice,
            amount: stake.amount,
        }
    }
}

impl From<DbStake> for Stake {
    fn from(value: DbStake) -> Self {
        Stake {
            market_id: value.market.id.to_raw(),
            participant_id: value.participant,
            choice: value.choice,
            amount: value.amount,
        }
    }
}

fn market_thing(project_id: impl Into<String>) -> Thing {
    Thing {
        tb: MARKET_TABLE.into(),
        id: Id::String(project_id.into()),
    }
}

/// Market and stake storage.
///
/// Markets are keyed by project id. Stakes are append-only and every
/// insertion bumps its side's pool in the same transaction.
pub struct DatabaseConnection<C: Connection> {
    connection: Surreal<C>,
}

impl DatabaseConnection<Db> {
    pub async fn in_memory(namespace: &str, database: &str) -> Result<Self> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns(namespace).use_db(database).await?;

        Ok(Self { connection: db })
    }
}

impl DatabaseConnection<Client> {
    pub async fn remote(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self> {
        let db = Surreal::new::<Ws>(address).await?;

        db.signin(Root { username, password }).await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(Self { connection: db })
    }
}

impl<C: Connection> DatabaseConnection<C> {
    pub async fn create_market(&mut self, project_id: &str) -> anyhow::Result<Market> {
        let market = DbMarket::new(project_id);
        let created: Option<DbMarket> = self
            .connection
            .create((MARKET_TABLE, project_id))
            .content(&market)
            .await?;

        info!(market = project_id, "market created");
        Ok(created.unwrap_or(market).into())
    }

    /// Validates the stake against the stored market, then writes it and
    /// grows the pool atomically.
    pub async fn insert_stake(&mut self, stake: &Stake) -> anyhow::Result<Market> {
        let mut market: Market = self
            .get_market(&stake.market_id)
            .await?
            .ok_or_else(|| anyhow!("unknown market {}", stake.market_id))?
            .into();
        market.record_stake(stake)?;

        let db_stake = DbStake::new(stake);
        let pool_update = match stake.choice {
            Choice::Yes => "UPDATE $market SET yes_pool += $amount, stake_count += 1;",
            Choice::No => "UPDATE $market SET no_pool += $amount, stake_count += 1;",
        };
        self.connection
            .query(BeginStatement)
            .query("CREATE $id SET market = $market, participant = $participant, choice = $choice, amount = $amount;")
            .bind(&db_stake)
            .query(pool_update)
            .query(CommitStatement)
            .await?
            .check()?;

        debug!(
            market = %stake.market_id,
            participant = %stake.participant_id,
            choice = ?stake.choice,
            amount = stake.amount,
            "stake recorded"
        );
        Ok(market)
    }

    pub async fn resolve_market(&mut self, project_id: &str, verdict: Verdict) -> anyhow::Result<Market> {
        let mut market: Market = self
            .get_market(project_id)
            .await?
            .ok_or_else(|| anyhow!("unknown market {project_id}"))?
            .into();
        market.resolve(verdict)?;

        self.connection
            .query("UPDATE $market SET status = $status;")
            .bind(("market", market_thing(project_id)))
            .bind(("status", market.status))
            .await?
            .check()?;

        info!(market = project_id, ?verdict, "market resolved");
        Ok(market)
    }

    pub async fn get_market(&self, project_id: &str) -> Result<Option<DbMarket>> {
        self.connection.select((MARKET_TABLE, project_id)).await
    }

    pub async fn get_all_markets(&self) -> Result<Vec<DbMarket>> {
        self.connection.select(MARKET_TABLE).await
    }

    pub async fn get_stakes_for_market(&self, project_id: &str) -> Result<Vec<DbStake>> {
        self.connection
            .query("SELECT * FROM stake WHERE market = $market;")
            .bind(("market", market_thing(project_id)))
            .await?
            .take(0)
    }

    pub async fn get_stakes_by_participant(&self, participant_id: &str) -> Result<Vec<DbStake>> {
        self.connection
            .query("SELECT * FROM stake WHERE participant = $participant;")
            .bind(("participant", participant_id))
            .await?
            .take(0)
    }
}
