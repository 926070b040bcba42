// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Error;
use crate::trace::RawTraceResult;

/// A minimal blocking JSON-RPC 2.0 client for the three calls this
/// crate needs from a node: the transaction trace, the transaction's
/// destination address, and an address's runtime bytecode. All of the
/// crate's network I/O is confined to this module.
pub struct JsonRpcClient {
    url: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct Envelope {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct TransactionByHash {
    to: Option<String>,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), agent: ureq::Agent::new() }
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, Error> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .agent
            .post(&self.url)
            .send_json(body)
            .map_err(|e| Error::Transport { endpoint: self.url.clone(), source: Box::new(e) })?;
        let envelope: Envelope = response
            .into_json()
            .map_err(|e| Error::MalformedResponse { endpoint: self.url.clone(), reason: e.to_string() })?;
        if let Some(err) = envelope.error {
            return Err(Error::MalformedResponse {
                endpoint: self.url.clone(),
                reason: format!("JSON-RPC error {}: {}", err.code, err.message),
            });
        }
        envelope.result.ok_or_else(|| Error::MalformedResponse {
            endpoint: self.url.clone(),
            reason: "response carried neither result nor error".to_string(),
        })
    }

    /// `debug_traceTransaction`-equivalent: the structured step log
    /// for one transaction's execution.
    pub fn trace_transaction(&self, tx_hash: &str) -> Result<RawTraceResult, Error> {
        let config = json!({
            "enableMemory": false,
            "disableStack": false,
            "disableStorage": false,
            "enableReturnData": false,
        });
        let result = self.call("debug_traceTransaction", json!([tx_hash, config]))?;
        serde_json::from_value(result)
            .map_err(|e| Error::MalformedResponse { endpoint: self.url.clone(), reason: e.to_string() })
    }

    /// `eth_getTransactionByHash`-equivalent: used to recover the
    /// transaction's destination address, the root of the call tree.
    pub fn transaction_destination(&self, tx_hash: &str) -> Result<Option<String>, Error> {
        let result = self.call("eth_getTransactionByHash", json!([tx_hash]))?;
        let tx: TransactionByHash = serde_json::from_value(result)
            .map_err(|e| Error::MalformedResponse { endpoint: self.url.clone(), reason: e.to_string() })?;
        Ok(tx.to)
    }

    /// `eth_getCode`-equivalent: the runtime bytecode deployed at
    /// `address`, as a `0x`-prefixed hex string.
    pub fn get_code(&self, address: &str) -> Result<String, Error> {
        let result = self.call("eth_getCode", json!([address, "latest"]))?;
        serde_json::from_value(result)
            .map_err(|e| Error::MalformedResponse { endpoint: self.url.clone(), reason: e.to_string() })
    }
}
