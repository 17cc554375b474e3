use serde::{Deserialize, Serialize};

use crate::claim::{ClaimReceipt, ClaimResult};

/// Wire envelope shared by every faucet endpoint: `{code, msg, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

impl From<ClaimResult> for ApiResponse<ClaimReceipt> {
    fn from(result: ClaimResult) -> Self {
        match result {
            Ok(receipt) => ApiResponse::ok(receipt),
            Err(rejection) => ApiResponse::error(rejection.code(), rejection.message()),
        }
    }
}
