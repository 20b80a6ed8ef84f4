use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SettlementError {
    #[error("stake amount must be positive, got {0}")]
    InvalidAmount(f64),

    #[error("market has no stakes on the winning side")]
    DegenerateMarket,

    #[error("market is already resolved")]
    AlreadyResolved,

    #[error("market is closed to new stakes")]
    MarketClosed,

    #[error("stake does not belong to this market")]
    MarketMismatch,
}
