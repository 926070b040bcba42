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
use std::fmt;
use crate::util::{FromHexString, ToHexString};

/// A 20-byte account address.  Displayed as a lowercase `0x`-prefixed
/// hex string, matching the wire format returned by a node's JSON-RPC
/// API.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    /// Sentinel used where a normalized trace step cannot be
    /// attributed to any contract (e.g. the call-stack tracking in
    /// [`crate::trace`] underflows). A type-level "no address" rather
    /// than an empty string or all-zero address, since the zero
    /// address is itself a valid (if unusual) account.
    pub const EMPTY: Address = Address([0xff; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// First 8 hex digits, used for the shortened labels in rendered
    /// DOT output and artefact file names.
    pub fn short_hex(&self) -> String {
        self.0[..4].to_hex_string()[2..].to_string()
    }

    /// Parse a `0x`-prefixed (or bare) 40-hex-digit address string as
    /// returned by a JSON-RPC node.
    pub fn parse(s: &str) -> Option<Address> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 40 {
            return None;
        }
        let bytes = s.from_hex_string().ok()?;
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(Address(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.to_hex_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_address() {
        let a = Address::parse("0x0000000000000000000000000000000000000001").unwrap();
        assert_eq!(a.as_bytes()[19], 1);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Address::parse("0x1234").is_none());
    }

    #[test]
    fn displays_lowercase_prefixed() {
        let a = Address::parse("0x00000000000000000000000000000000000001AB").unwrap();
        assert_eq!(a.to_string(), "0x00000000000000000000000000000000000001ab");
    }

    #[test]
    fn empty_sentinel_is_distinct() {
        let a = Address::parse("0xffffffffffffffffffffffffffffffffffffffff").unwrap();
        assert_eq!(a, Address::EMPTY);
        assert!(a.is_empty());
    }
}
