use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One instruction of a fetched transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    pub program_id: String,
    /// Absent for instructions the node returned in parsed form
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
}

/// Parsed contents of a transaction, as returned by `getTransaction`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TransactionDetail {
    pub signature: Option<String>,
    pub slot: Option<u64>,
    pub block_time: Option<i64>,
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionResult {
    slot: Option<u64>,
    block_time: Option<i64>,
    transaction: RpcTransaction,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    #[serde(default)]
    signatures: Vec<String>,
    message: RpcMessage,
}

#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    instructions: Vec<ParsedInstruction>,
}

impl TransactionDetail {
    /// Build from the `result` object of a `jsonParsed` getTransaction response
    pub fn from_rpc_result(result: Value) -> Result<Self, serde_json::Error> {
        let raw: RpcTransactionResult = serde_json::from_value(result)?;
        Ok(Self {
            signature: raw.transaction.signatures.into_iter().next(),
            slot: raw.slot,
            block_time: raw.block_time,
            instructions: raw.transaction.message.instructions,
        })
    }

    /// First top-level instruction invoking `program_id`
    pub fn find_instruction(&self, program_id: &str) -> Option<&ParsedInstruction> {
        self.instructions.iter().find(|ix| ix.program_id == program_id)
    }
}
