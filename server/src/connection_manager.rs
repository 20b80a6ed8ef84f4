use anyhow::anyhow;
use settlement::network::{Connection, Packet, Request, Response};
use settlement::Stake;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::database_manager::DatabaseHandle;
use crate::settlement_manager::SettlementRequest;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Errors that only concern the connection being accepted, not the listener.
fn is_connection_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    )
}

pub async fn handle_listen_server(
    listener: TcpListener,
    database: DatabaseHandle,
    settlement_tx: mpsc::Sender<SettlementRequest>,
) -> anyhow::Result<()> {
    info!(address = %listener.local_addr()?, "listening for connections");

    loop {
        let (connection, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) if is_connection_error(&error) => {
                debug!(%error, "peer went away before accept");
                continue;
            }
            Err(error) => {
                // usually out of file descriptors; back off and let connections drain
                error!(%error, "failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let database = database.clone();
        let settlement_tx = settlement_tx.clone();

        tokio::spawn(async move {
            match Connection::from_tcp_stream(connection).await {
                Ok(connection) => handle_connection(peer, connection, database, settlement_tx).await,
                Err(error) => warn!(%peer, %error, "websocket handshake failed"),
            }
        });
    }
}

async fn handle_connection(
    peer: SocketAddr,
    mut connection: Connection,
    database: DatabaseHandle,
    settlement_tx: mpsc::Sender<SettlementRequest>,
) {
    debug!(%peer, "client connected");
    match handle_client(&mut connection, database, settlement_tx).await {
        Ok(()) => debug!(%peer, "client disconnected"),
        Err(error) => {
            warn!(%peer, %error, "closing connection");
            connection.send(Packet::Error).await.ok();
        }
    }
}

async fn handle_client(
    connection: &mut Connection,
    database: DatabaseHandle,
    settlement_tx: mpsc::Sender<SettlementRequest>,
) -> anyhow::Result<()> {
    loop {
        let packet = connection.read().await;
        match packet {
            Ok(Packet::RequestPacket(request)) => {
                let reply = match handle_request(request, &database, &settlement_tx).await {
                    Ok(response) => Packet::ResponsePacket(response),
                    Err(error) => {
                        warn!(%error, "request failed");
                        Packet::Error
                    }
                };
                connection.send(reply).await?;
            }
            Ok(pack) => anyhow::bail!("incorrect packet type: {:?}", pack),
            Err(error) => {
                return match error
                    .downcast_ref::<std::io::Error>()
                    .map(std::io::Error::kind)
                {
                    Some(ErrorKind::ConnectionAborted) => Ok(()), //connection aborted is considered successful
                    _ => Err(error),
                };
            }
        }
    }
}

async fn ask_settlement<T>(
    settlement_tx: &mpsc::Sender<SettlementRequest>,
    build: impl FnOnce(oneshot::Sender<anyhow::Result<T>>) -> SettlementRequest,
) -> anyhow::Result<T> {
    let (resp_tx, resp_rx) = oneshot::channel();
    settlement_tx
        .send(build(resp_tx))
        .await
        .map_err(|_| anyhow!("settlement manager stopped"))?;
    resp_rx.await?
}

async fn handle_request(
    request: Request,
    database: &DatabaseHandle,
    settlement_tx: &mpsc::Sender<SettlementRequest>,
) -> anyhow::Result<Response> {
    let response = match request {
        Request::MarketData => Response::MarketData(database.get_all_markets().await?),
        Request::CreateMarket { project_id } => {
            database.create_market(&project_id).await?;
            Response::None
        }
        Request::PlaceStake {
            project_id,
            participant_id,
            choice,
            amount,
        } => {
            database
                .insert_stake(Stake::new(project_id, participant_id, choice, amount))
                .await?;
            Response::None
        }
        Request::ResolveMarket { project_id, verdict } => {
            database.resolve_market(&project_id, verdict).await?;
            Response::None
        }
        Request::Odds { project_id } => Response::Odds(
            ask_settlement(settlement_tx, |responder| SettlementRequest::Odds {
                project_id,
                responder,
            })
            .await?,
        ),
        Request::PotentialProfit {
            project_id,
            choice,
            amount,
        } => Response::PotentialProfit(
            ask_settlement(settlement_tx, |responder| {
                SettlementRequest::PotentialProfit {
                    project_id,
                    choice,
                    amount,
                    responder,
                }
            })
            .await?,
        ),
        Request::Payouts { project_id } => Response::Payouts(
            ask_settlement(settlement_tx, |responder| SettlementRequest::Settle {
                project_id,
                responder,
            })
            .await?,
        ),
        Request::Portfolio { participant_id } => Response::Portfolio(
            ask_settlement(settlement_tx, |responder| SettlementRequest::Portfolio {
                participant_id,
                responder,
            })
            .await?,
        ),
    };
    Ok(response)
}
