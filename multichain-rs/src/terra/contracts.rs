//! CosmWasm execute/query message shapes for the destination-chain HTLC
//! escrow contract.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    Lock {
        hashlock: String,
        token: String,
        amount: String,
        maker: String,
        withdrawal_time: u64,
        cancellation_time: u64,
    },
    Reveal {
        hashlock: String,
        preimage: String,
    },
    Refund {
        hashlock: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    Escrow { hashlock: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EscrowResponse {
    pub maker: String,
    pub token: String,
    pub amount: String,
    pub revealed: bool,
    pub refunded: bool,
}
