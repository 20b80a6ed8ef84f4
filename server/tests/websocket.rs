use server::config::ServerConfig;
use server::database::DatabaseConnection;
use settlement::network::{Connection, Packet, Request, Response};
use settlement::{Choice, MarketStatus, PayoutStatus, Verdict};
use tokio::net::TcpListener;

async fn start_server() -> String {
    let config = ServerConfig::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("ws://{}", listener.local_addr().unwrap());
    let database = DatabaseConnection::in_memory("test", "markets").await.unwrap();

    tokio::spawn(async move {
        server::serve(&config, database, listener).await.ok();
    });
    address
}

async fn ask(connection: &mut Connection, request: Request) -> Packet {
    connection
        .send(Packet::RequestPacket(request))
        .await
        .unwrap();
    connection.read().await.unwrap()
}

#[tokio::test]
async fn test_market_lifecycle_over_websocket() {
    let address = start_server().await;
    let mut connection = Connection::connect(&address).await.unwrap();

    let created = ask(
        &mut connection,
        Request::CreateMarket {
            project_id: "solar-farm".into(),
        },
    )
    .await;
    assert_eq!(created, Packet::ResponsePacket(Response::None));

    for (participant, choice, amount) in [
        ("alice", Choice::Yes, 900.0),
        ("bob", Choice::Yes, 8100.0),
        ("carol", Choice::No, 6000.0),
    ] {
        let placed = ask(
            &mut connection,
            Request::PlaceStake {
                project_id: "solar-farm".into(),
                participant_id: participant.into(),
                choice,
                amount,
            },
        )
        .await;
        assert_eq!(placed, Packet::ResponsePacket(Response::None));
    }

    match ask(
        &mut connection,
        Request::PotentialProfit {
            project_id: "solar-farm".into(),
            choice: Choice::Yes,
            amount: 1000.0,
        },
    )
    .await
    {
        Packet::ResponsePacket(Response::PotentialProfit(profit)) => {
            assert!((profit - 360.0).abs() < 1e-9)
        }
        other => panic!("unexpected packet {other:?}"),
    }

    let resolved = ask(
        &mut connection,
        Request::ResolveMarket {
            project_id: "solar-farm".into(),
            verdict: Verdict::Success,
        },
    )
    .await;
    assert_eq!(resolved, Packet::ResponsePacket(Response::None));

    match ask(
        &mut connection,
        Request::Payouts {
            project_id: "solar-farm".into(),
        },
    )
    .await
    {
        Packet::ResponsePacket(Response::Payouts(settlement)) => {
            assert_eq!(settlement.status, MarketStatus::ResolvedSuccess);
            let alice = settlement
                .payouts
                .iter()
                .find(|record| record.participant_id == "alice")
                .unwrap();
            assert_eq!(alice.status, PayoutStatus::Won);
            assert!((alice.profit_loss - 360.0).abs() < 1e-9);
        }
        other => panic!("unexpected packet {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_requests_keep_connection_open() {
    let address = start_server().await;
    let mut connection = Connection::connect(&address).await.unwrap();

    let missing = ask(
        &mut connection,
        Request::Odds {
            project_id: "tidal".into(),
        },
    )
    .await;
    assert_eq!(missing, Packet::Error);

    ask(
        &mut connection,
        Request::CreateMarket {
            project_id: "tidal".into(),
        },
    )
    .await;
    let rejected = ask(
        &mut connection,
        Request::PlaceStake {
            project_id: "tidal".into(),
            participant_id: "alice".into(),
            choice: Choice::No,
            amount: 0.0,
        },
    )
    .await;
    assert_eq!(rejected, Packet::Error);

    match ask(&mut connection, Request::MarketData).await {
        Packet::ResponsePacket(Response::MarketData(markets)) => {
            assert_eq!(markets.len(), 1);
            assert_eq!(markets[0].total(), 0.0);
        }
        other => panic!("unexpected packet {other:?}"),
    }
}
