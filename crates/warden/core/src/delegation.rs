//! [EIP-7702](https://eips.ethereum.org/EIPS/eip-7702) delegation designator classification.

use alloy_primitives::{Address, hex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefix of the code an EOA carries once it delegates to a contract: `0xef0100 || address`.
pub const EIP7702_DELEGATION_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];

/// Total length of a delegation designator.
pub const EIP7702_DELEGATION_LENGTH: usize = EIP7702_DELEGATION_PREFIX.len() + 20;

/// Whether the account delegation should be looked up while preparing a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DelegationMode {
    /// Look up the delegation and record the signer kind.
    #[default]
    Auto,
    /// Treat the account as a plain EOA without querying its code.
    Disabled,
}

/// Outcome of a delegation check for one `(address, chain)` pair.
///
/// The delegate is only present when the account is delegated, the two can't disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DelegationResult {
    delegated_address: Option<Address>,
}

impl DelegationResult {
    /// A plain EOA, the steady state for most accounts.
    pub const fn not_delegated() -> Self {
        Self { delegated_address: None }
    }

    pub const fn delegated(to: Address) -> Self {
        Self { delegated_address: Some(to) }
    }

    pub const fn is_delegated(&self) -> bool {
        self.delegated_address.is_some()
    }

    pub const fn delegated_address(&self) -> Option<Address> {
        self.delegated_address
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelegationResultRepr {
    is_delegated: bool,
    delegated_address: Option<Address>,
}

impl Serialize for DelegationResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        DelegationResultRepr {
            is_delegated: self.is_delegated(),
            delegated_address: self.delegated_address,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DelegationResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = DelegationResultRepr::deserialize(deserializer)?;
        match (repr.is_delegated, repr.delegated_address) {
            (true, Some(address)) => Ok(Self::delegated(address)),
            (false, None) => Ok(Self::not_delegated()),
            _ => Err(serde::de::Error::custom(
                "delegatedAddress must be set if and only if isDelegated is true",
            )),
        }
    }
}

/// Canonicalizes raw `eth_getCode` output to lower-case `0x`-prefixed hex.
///
/// Empty code comes back in several shapes depending on the node (`""`, `"0x"`, `"0x0"`), all of
/// them map to `"0x"`.
pub fn normalize_bytecode(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .to_ascii_lowercase();
    if digits.is_empty() || digits.bytes().all(|b| b == b'0') {
        return "0x".to_string();
    }
    format!("0x{digits}")
}

/// Returns the delegate if `code` is exactly an EIP-7702 delegation designator.
pub fn is_delegated_eoa(code: &[u8]) -> Option<Address> {
    if code.len() != EIP7702_DELEGATION_LENGTH {
        return None;
    }
    let (prefix, address) = code.split_at(EIP7702_DELEGATION_PREFIX.len());
    (prefix == EIP7702_DELEGATION_PREFIX).then(|| Address::from_slice(address))
}

/// Classifies hex-encoded bytecode, see [`normalize_bytecode`] and [`is_delegated_eoa`].
///
/// Bytecode that fails to decode is treated as not delegated.
pub fn classify_bytecode(raw: &str) -> DelegationResult {
    let normalized = normalize_bytecode(raw);
    match hex::decode(&normalized) {
        Ok(code) => {
            is_delegated_eoa(&code).map(DelegationResult::delegated).unwrap_or_default()
        }
        Err(_) => DelegationResult::not_delegated(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use serde_json::json;

    const DELEGATE: Address = address!("0x63c0c19a282a1B52b07dD5a65b58948A07DAE32B");

    fn designator(to: Address) -> String {
        format!("0xef0100{}", hex::encode(to))
    }

    #[test]
    fn normalizes_empty_code() {
        assert_eq!(normalize_bytecode(""), "0x");
        assert_eq!(normalize_bytecode("0x"), "0x");
        assert_eq!(normalize_bytecode("0x0"), "0x");
        assert_eq!(normalize_bytecode("  0XEF01  "), "0xef01");
        assert_eq!(normalize_bytecode("ef01"), "0xef01");
    }

    #[test]
    fn detects_designator() {
        let code = designator(DELEGATE);
        let result = classify_bytecode(&code);
        assert!(result.is_delegated());
        assert_eq!(result.delegated_address(), Some(DELEGATE));

        // upper-case without prefix still classifies
        let result = classify_bytecode(&code[2..].to_uppercase());
        assert_eq!(result.delegated_address(), Some(DELEGATE));
    }

    #[test]
    fn plain_accounts_are_not_delegated() {
        assert_eq!(classify_bytecode("0x"), DelegationResult::not_delegated());
        // regular contract code
        assert_eq!(classify_bytecode("0x6080604052"), DelegationResult::not_delegated());
        // prefix with a truncated address
        assert_eq!(classify_bytecode("0xef0100aabb"), DelegationResult::not_delegated());
        // designator followed by extra bytes
        let long = format!("{}00", designator(DELEGATE));
        assert_eq!(classify_bytecode(&long), DelegationResult::not_delegated());
        // garbage
        assert_eq!(classify_bytecode("0xnot-hex"), DelegationResult::not_delegated());
    }

    #[test]
    fn serializes_result_shape() {
        let value = serde_json::to_value(DelegationResult::not_delegated()).unwrap();
        assert_eq!(value, json!({ "isDelegated": false, "delegatedAddress": null }));

        let value = serde_json::to_value(DelegationResult::delegated(DELEGATE)).unwrap();
        assert_eq!(value["isDelegated"], json!(true));

        let bad = json!({ "isDelegated": true, "delegatedAddress": null });
        assert!(serde_json::from_value::<DelegationResult>(bad).is_err());
    }
}
