use serde::{Deserialize, Serialize};

use tokio::net::TcpStream;

use crate::engine::{MarketOdds, PortfolioSummary, Settlement};
use crate::{Choice, Market, Verdict};

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub enum Request {
    MarketData,
    CreateMarket { project_id: String },
    PlaceStake { project_id: String, participant_id: String, choice: Choice, amount: f64 }, // None response
    ResolveMarket { project_id: String, verdict: Verdict }, // None response
    Odds { project_id: String },
    PotentialProfit { project_id: String, choice: Choice, amount: f64 },
    Payouts { project_id: String },
    Portfolio { participant_id: String },
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum Response {
    None,
    MarketData(Vec<Market>),
    Odds(MarketOdds),
    PotentialProfit(f64),
    Payouts(Settlement),
    Portfolio(PortfolioSummary),
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum Packet {
    RequestPacket(Request),
    ResponsePacket(Response),
    Error,
}

pub struct Connection {
    connection: tungstenite_socket::TungsteniteWebSocket,
}

impl Connection {
    pub async fn from_tcp_stream(connection: TcpStream) -> anyhow::Result<Self> {
        let ws = tungstenite_socket::TungsteniteWebSocket::accept(connection).await?;

        Ok(Self { connection: ws })
    }

    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let ws = tungstenite_socket::TungsteniteWebSocket::connect(address).await?;

        Ok(Self { connection: ws })
    }

    pub async fn read(&mut self) -> anyhow::Result<Packet> {
        Ok(rmp_serde::from_slice(&self.connection.read().await?)?)
    }

    pub async fn send(&mut self, data: Packet) -> anyhow::Result<()> {
        self.connection.write_all(&rmp_serde::to_vec(&data)?).await
    }
}

trait WebSocketConnection {
    async fn read(&mut self) -> anyhow::Result<Vec<u8>>;

    async fn write_all(&mut self, buf: &[u8]) -> anyhow::Result<()>;
}

mod tungstenite_socket {
    use std::io::ErrorKind;

    use anyhow::bail;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    use crate::network::WebSocketConnection;

    pub struct TungsteniteWebSocket {
        socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    }

    impl TungsteniteWebSocket {
        pub async fn accept(stream: TcpStream) -> anyhow::Result<Self> {
            let ws_stream =
                tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream)).await?;
            Ok(Self { socket: ws_stream })
        }

        pub async fn connect(address: &str) -> anyhow::Result<Self> {
            let (ws_stream, _) = tokio_tungstenite::connect_async(address).await?;
            Ok(Self { socket: ws_stream })
        }
    }

    impl WebSocketConnection for TungsteniteWebSocket {
        async fn read(&mut self) -> anyhow::Result<Vec<u8>> {
            loop {
                let message = self.socket.next().await.ok_or_else(|| {
                    std::io::Error::new(ErrorKind::ConnectionAborted, "connection closed")
                })??;
                match message {
                    Message::Binary(data) => return Ok(data),
                    Message::Ping(_) | Message::Pong(_) => continue,
                    Message::Close(_) => {
                        return Err(std::io::Error::new(
                            ErrorKind::ConnectionAborted,
                            "connection closed",
                        )
                        .into())
                    }
                    _ => bail!("incorrect data type received"),
                }
            }
        }

        async fn write_all(&mut self, buf: &[u8]) -> anyhow::Result<()> {
            Ok(self.socket.send(Message::Binary(buf.to_vec())).await?)
        }
    }
}
