//! Route handlers and response bodies.
//!
//! Every transfer alias is registered as its own route pointing at
//! [`transfer`]; there is no path rewriting.

use axum::{
    body::Bytes,
    extract::{MatchedPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::blockchain::ChainRpc;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::transfer::{
    format_eth, format_eth_fixed, TransferError, TransferReceipt, TransferRequest,
};

/// Method label reported by `/status`.
pub const RELAY_METHOD: &str = "V3-EIP1559";

/// A decimal amount sent either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DecimalInput {
    Number(serde_json::Number),
    Text(String),
}

impl DecimalInput {
    fn as_text(&self) -> String {
        match self {
            DecimalInput::Number(n) => expand_exponent(&n.to_string()),
            DecimalInput::Text(s) => expand_exponent(s.trim()),
        }
    }
}

/// Rewrite `1e-7` or `2.5E3` as plain decimal text. Anything that is not
/// exponent notation is returned unchanged for the amount parser to judge.
fn expand_exponent(text: &str) -> String {
    let Some((mantissa, exponent)) = text.split_once(['e', 'E']) else {
        return text.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return text.to_string();
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa.strip_prefix('+').unwrap_or(mantissa)),
    };
    let (whole, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{}{}", whole, frac);
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || exponent.unsigned_abs() > 400
    {
        return text.to_string();
    }

    let point = whole.len() as i64 + exponent as i64;
    let plain = if point <= 0 {
        format!("0.{}{}", "0".repeat(point.unsigned_abs() as usize), digits)
    } else if point as usize >= digits.len() {
        format!("{}{}", digits, "0".repeat(point as usize - digits.len()))
    } else {
        let (int, dec) = digits.split_at(point as usize);
        format!("{}.{}", int, dec)
    };
    format!("{}{}", sign, plain)
}

/// Body accepted by every transfer route. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferBody {
    pub amount: Option<DecimalInput>,
    #[serde(rename = "amountETH")]
    pub amount_eth: Option<DecimalInput>,
    pub to: Option<String>,
    #[serde(rename = "toAddress")]
    pub to_address: Option<String>,
    pub treasury: Option<String>,
}

impl TransferBody {
    /// `amountETH` wins over `amount`; `to` over `toAddress` over `treasury`.
    /// Empty strings count as absent.
    pub fn into_request(self) -> Result<TransferRequest, TransferError> {
        let amount = self
            .amount_eth
            .or(self.amount)
            .map(|a| a.as_text())
            .filter(|a| !a.trim().is_empty());
        let destination = [self.to, self.to_address, self.treasury]
            .into_iter()
            .flatten()
            .find(|d| !d.trim().is_empty());

        TransferRequest::parse(amount.as_deref(), destination.as_deref())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub success: bool,
    pub tx_hash: String,
    pub hash: String,
    pub transaction_hash: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub requested_amount: String,
    pub nonce: u64,
    pub block_number: u64,
    #[serde(rename = "type")]
    pub tx_type: &'static str,
}

impl From<TransferReceipt> for TransferResponse {
    fn from(receipt: TransferReceipt) -> Self {
        let hash = receipt.tx_hash.to_string();
        Self {
            success: true,
            tx_hash: hash.clone(),
            hash: hash.clone(),
            transaction_hash: hash,
            from: receipt.from.to_string(),
            to: receipt.to.to_string(),
            amount: format_eth(receipt.amount),
            requested_amount: format_eth(receipt.requested),
            nonce: receipt.nonce,
            block_number: receipt.block_number,
            tx_type: "EIP-1559",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub wallet: String,
    pub balance: String,
}

/// Whether `/status` could read the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceState {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub method: &'static str,
    pub wallet: Option<String>,
    /// `None` when degraded; never a stand-in zero.
    pub balance: Option<String>,
    pub balance_state: BalanceState,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// HTTP status for a transfer failure.
pub fn status_for(err: &TransferError) -> StatusCode {
    match err {
        TransferError::InvalidRequest(_) | TransferError::InsufficientFunds { .. } => {
            StatusCode::BAD_REQUEST
        }
        TransferError::SubmissionUnknown { .. } | TransferError::ConfirmationTimeout { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let balance = match &self {
            TransferError::InsufficientFunds { balance, .. } => Some(format_eth(*balance)),
            _ => None,
        };
        let tx_hash = match &self {
            TransferError::SubmissionUnknown { tx_hash, .. }
            | TransferError::ConfirmationTimeout { tx_hash, .. }
            | TransferError::Reverted { tx_hash, .. } => Some(tx_hash.to_string()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            retryable: self.is_retryable(),
            balance,
            tx_hash,
        };
        (status, Json(body)).into_response()
    }
}

/// `POST /convert` and its aliases.
pub async fn transfer<R: ChainRpc>(
    State(state): State<AppState<R>>,
    path: MatchedPath,
    body: Bytes,
) -> Response {
    let response = match execute(&state, &body).await {
        Ok(receipt) => (StatusCode::OK, Json(TransferResponse::from(receipt))).into_response(),
        Err(e) => e.into_response(),
    };
    metrics::record_http_request(path.as_str(), response.status().as_u16());
    response
}

async fn execute<R: ChainRpc>(
    state: &AppState<R>,
    body: &[u8],
) -> Result<TransferReceipt, TransferError> {
    let service = state.service.clone().ok_or(TransferError::NotConfigured)?;

    let body: TransferBody = if body.iter().all(u8::is_ascii_whitespace) {
        TransferBody::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| TransferError::InvalidRequest(format!("malformed JSON body: {}", e)))?
    };
    let request = body.into_request()?;

    // Detached so a request timeout or client disconnect cannot cancel a
    // transfer partway through broadcast.
    match tokio::spawn(async move { service.execute_transfer(request).await }).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(TransferError::Endpoint(format!("transfer task stopped: {}", e))),
    }
}

/// `GET /balance`.
pub async fn balance<R: ChainRpc>(State(state): State<AppState<R>>) -> Response {
    let result = match state.service.as_ref() {
        Some(service) => service.balance().await.map(|b| BalanceResponse {
            wallet: service.address().to_string(),
            balance: format_eth(b),
        }),
        None => Err(TransferError::NotConfigured),
    };

    let response = match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            // Balance failures are never the caller's fault.
            let mut response = e.into_response();
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    };
    metrics::record_http_request("/balance", response.status().as_u16());
    response
}

/// `GET /status`. Always 200.
pub async fn status<R: ChainRpc>(State(state): State<AppState<R>>) -> Json<StatusResponse> {
    let (wallet, balance) = match state.service.as_ref() {
        Some(service) => (
            Some(service.address().to_string()),
            service.observed_balance().await,
        ),
        None => (None, None),
    };

    metrics::record_http_request("/status", 200);
    Json(StatusResponse {
        status: "online",
        method: RELAY_METHOD,
        wallet,
        balance_state: if balance.is_some() {
            BalanceState::Ok
        } else {
            BalanceState::Degraded
        },
        balance: balance.map(|b| format_eth_fixed(b, 6)),
    })
}

/// `GET /health`.
pub async fn health() -> Json<HealthResponse> {
    metrics::record_http_request("/health", 200);
    Json(HealthResponse { status: "healthy" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::utils::parse_ether;
    use alloy::primitives::{Address, U256};

    use crate::transfer::Shortfall;

    fn body(json: &str) -> TransferBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_amount_eth_wins_over_amount() {
        let request = body(r#"{"amount": 0.5, "amountETH": "0.02"}"#)
            .into_request()
            .unwrap();
        assert_eq!(request.amount, Some(parse_ether("0.02").unwrap()));
    }

    #[test]
    fn test_numeric_amount_accepted() {
        let request = body(r#"{"amount": 0.01}"#).into_request().unwrap();
        assert_eq!(request.amount, Some(parse_ether("0.01").unwrap()));
    }

    #[test]
    fn test_exponent_amounts_accepted() {
        let request = body(r#"{"amount": 1e-7}"#).into_request().unwrap();
        assert_eq!(request.amount, Some(U256::from(100_000_000_000u64)));

        let request = body(r#"{"amountETH": "2.5E-1"}"#).into_request().unwrap();
        assert_eq!(request.amount, Some(parse_ether("0.25").unwrap()));

        let request = body(r#"{"amount": 1.5e2}"#).into_request().unwrap();
        assert_eq!(request.amount, Some(parse_ether("150").unwrap()));
    }

    #[test]
    fn test_expand_exponent() {
        assert_eq!(expand_exponent("1e-7"), "0.0000001");
        assert_eq!(expand_exponent("1.5e2"), "150");
        assert_eq!(expand_exponent("12.345e1"), "123.45");
        assert_eq!(expand_exponent("-2e-1"), "-0.2");
        assert_eq!(expand_exponent("1e+3"), "1000");
        assert_eq!(expand_exponent("0.01"), "0.01");
        assert_eq!(expand_exponent("lots"), "lots");
        assert_eq!(expand_exponent("1ex"), "1ex");
    }

    #[test]
    fn test_negative_exponent_amount_still_rejected() {
        let err = body(r#"{"amount": -1e-3}"#).into_request().unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_destination_precedence_skips_empty() {
        let request = body(
            r#"{"to": "", "toAddress": "0x4024Fd78E2AD5532FBF3ec2B3eC83870FAe45fC7",
                "treasury": "0x0000000000000000000000000000000000000001"}"#,
        )
        .into_request()
        .unwrap();
        assert_eq!(
            request.destination,
            Some("0x4024Fd78E2AD5532FBF3ec2B3eC83870FAe45fC7".parse::<Address>().unwrap())
        );
    }

    #[test]
    fn test_empty_body_uses_defaults() {
        let request = TransferBody::default().into_request().unwrap();
        assert_eq!(request, TransferRequest::default());
    }

    #[test]
    fn test_status_mapping() {
        let insufficient = TransferError::InsufficientFunds {
            shortfall: Shortfall::BelowReserve,
            balance: U256::ZERO,
            reserve: U256::from(1u64),
        };
        assert_eq!(status_for(&insufficient), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&TransferError::BroadcastError("underpriced".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&TransferError::NoReachableEndpoint { attempted: 4 }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&TransferError::ConfirmationTimeout {
                tx_hash: Default::default(),
                waited_secs: 120
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_unknown_submission_carries_hash() {
        let tx_hash = alloy::primitives::TxHash::repeat_byte(0xab);
        let err = TransferError::SubmissionUnknown {
            tx_hash,
            reason: "RPC timeout after 10 seconds".into(),
        };
        assert_eq!(status_for(&err), StatusCode::GATEWAY_TIMEOUT);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "submission_unknown");
        assert_eq!(json["txHash"], tx_hash.to_string());
        assert_eq!(json["retryable"], false);
    }

    #[test]
    fn test_status_body_serializes_degraded() {
        let body = StatusResponse {
            status: "online",
            method: RELAY_METHOD,
            wallet: None,
            balance: None,
            balance_state: BalanceState::Degraded,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["balanceState"], "degraded");
        assert!(json["balance"].is_null());
    }
}
