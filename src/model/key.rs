//! Request keys.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What is being asked about on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// Chain-wide facts (gas prices).
    Chain,
    /// Facts about one token (metadata, spot price).
    Token(Address),
    /// Facts about a token pair (swap quotes).
    Pair { sell: Address, buy: Address },
}

/// Composite identifier of one request.
///
/// String form: `1`, `1:0x…` (token) or `1:0x…/0x…` (pair).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    pub chain_id: ChainId,
    pub subject: Subject,
}

impl RequestKey {
    /// Key for chain-wide facts.
    pub fn chain(chain_id: impl Into<ChainId>) -> Self {
        Self {
            chain_id: chain_id.into(),
            subject: Subject::Chain,
        }
    }

    /// Key for a single token.
    pub fn token(chain_id: impl Into<ChainId>, address: Address) -> Self {
        Self {
            chain_id: chain_id.into(),
            subject: Subject::Token(address),
        }
    }

    /// Key for a sell/buy pair.
    pub fn pair(chain_id: impl Into<ChainId>, sell: Address, buy: Address) -> Self {
        Self {
            chain_id: chain_id.into(),
            subject: Subject::Pair { sell, buy },
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Subject::Chain => write!(f, "{}", self.chain_id),
            Subject::Token(address) => write!(f, "{}:{}", self.chain_id, address),
            Subject::Pair { sell, buy } => write!(f, "{}:{}/{}", self.chain_id, sell, buy),
        }
    }
}

/// Error parsing a key from its string form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("invalid chain id '{0}'")]
    Chain(String),

    #[error("invalid address '{0}'")]
    Address(String),
}

fn parse_address(raw: &str) -> Result<Address, KeyParseError> {
    Address::from_str(raw.trim()).map_err(|_| KeyParseError::Address(raw.to_string()))
}

impl FromStr for RequestKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, rest) = match s.split_once(':') {
            Some((chain, rest)) => (chain, Some(rest)),
            None => (s, None),
        };
        let chain_id = chain
            .trim()
            .parse::<u64>()
            .map(ChainId)
            .map_err(|_| KeyParseError::Chain(chain.to_string()))?;

        let subject = match rest {
            None => Subject::Chain,
            Some(rest) => match rest.split_once('/') {
                Some((sell, buy)) => Subject::Pair {
                    sell: parse_address(sell)?,
                    buy: parse_address(buy)?,
                },
                None => Subject::Token(parse_address(rest)?),
            },
        };

        Ok(Self { chain_id, subject })
    }
}

impl Serialize for RequestKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(1u64);
        assert_eq!(chain_id.0, 1);
        assert_eq!(u64::from(chain_id), 1);
    }

    #[test]
    fn test_parse_key_forms() {
        assert_eq!("137".parse::<RequestKey>().unwrap(), RequestKey::chain(137));

        let token: RequestKey = "1:0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".parse().unwrap();
        assert_eq!(token, RequestKey::token(1, WETH));

        let pair: RequestKey = "1:0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2/0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
            .parse()
            .unwrap();
        assert_eq!(pair, RequestKey::pair(1, WETH, USDC));
    }

    #[test]
    fn test_display_parses_back() {
        let key = RequestKey::pair(10, WETH, USDC);
        let parsed: RequestKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "mainnet".parse::<RequestKey>(),
            Err(KeyParseError::Chain("mainnet".into()))
        );
        assert!(matches!(
            "1:0xnothex".parse::<RequestKey>(),
            Err(KeyParseError::Address(_))
        ));
    }
}
