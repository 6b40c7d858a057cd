//! Engine types

use crate::execution::TradeId;
use crate::position::LedgerError;
use crate::risk::Denial;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why a trade request or close request was not carried out
///
/// All variants are expected outcomes; none indicate a bug.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeRejection {
    /// A risk rule refused admission
    #[error("{0}")]
    PolicyDenied(Denial),
    /// No fresh market snapshot for the symbol
    #[error("No market data available for {symbol}")]
    DataUnavailable { symbol: String },
    /// Paper balance cannot cover the entry notional
    #[error("Insufficient balance: required ${required:.2}, available ${available:.2}")]
    InsufficientBalance { required: Decimal, available: Decimal },
    /// Malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// No open position with this id for the user
    #[error("Position {0} not found")]
    PositionNotFound(TradeId),
}

impl TradeRejection {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            TradeRejection::PolicyDenied(denial) => denial.code(),
            TradeRejection::DataUnavailable { .. } => "data_unavailable",
            TradeRejection::InsufficientBalance { .. } => "insufficient_balance",
            TradeRejection::InvalidRequest(_) => "invalid_request",
            TradeRejection::PositionNotFound(_) => "position_not_found",
        }
    }
}

impl From<LedgerError> for TradeRejection {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                required,
                available,
            } => TradeRejection::InsufficientBalance {
                required,
                available,
            },
            overflow @ LedgerError::NotionalOverflow { .. } => {
                TradeRejection::InvalidRequest(overflow.to_string())
            }
        }
    }
}
