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
use thiserror::Error;

/// Fatal errors that abort a pipeline run.  Recoverable conditions
/// (an unresolved jump target, a step referencing an unknown block, a
/// synthesized successor pc outside any block) are never represented
/// here: builders log them with [`log::warn!`] and degrade the result
/// instead, per the crate's error-handling policy.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error talking to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("malformed JSON-RPC response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("malformed trace step: {reason}")]
    MalformedTrace { reason: String },

    #[error("internal invariant violated: {reason}")]
    Invariant { reason: String },

    #[error("I/O error writing artefact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize artefact: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
