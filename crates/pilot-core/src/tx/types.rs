//! EVM value types used by routes and transaction payloads.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PilotError, Result};
use crate::tx::abi::keccak256;

/// 20-byte account address. Displays as EIP-55 checksum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = strip_hex_prefix(s)
            .ok_or_else(|| PilotError::BadRequest(format!("address must be 0x-prefixed: {s}")))?;
        if digits.len() != 40 {
            return Err(PilotError::BadRequest(format!(
                "address must be 20 bytes: {s}"
            )));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|e| PilotError::BadRequest(format!("invalid address {s}: {e}")))?;
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// `0x`-prefixed byte string (calldata, bytes32 keys).
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct HexData(pub Vec<u8>);

impl HexData {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for HexData {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = strip_hex_prefix(s)
            .ok_or_else(|| PilotError::BadRequest(format!("hex data must be 0x-prefixed: {s}")))?;
        hex::decode(digits)
            .map(HexData)
            .map_err(|e| PilotError::BadRequest(format!("invalid hex data: {e}")))
    }
}

impl fmt::Display for HexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for HexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexData({self})")
    }
}

impl Serialize for HexData {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexData {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

/// Parse a quantity given as `0x` hex or as a decimal string.
pub fn parse_quantity(s: &str) -> Result<U256> {
    match strip_hex_prefix(s) {
        Some("") => Ok(U256::zero()),
        Some(h) => U256::from_str_radix(h, 16)
            .map_err(|e| PilotError::BadRequest(format!("invalid hex quantity {s}: {e:?}"))),
        None => U256::from_dec_str(s)
            .map_err(|e| PilotError::BadRequest(format!("invalid decimal quantity {s}: {e:?}"))),
    }
}

fn deserialize_quantity<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<U256, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(U256::from(n)),
        Raw::Str(s) => parse_quantity(&s).map_err(de::Error::custom),
    }
}

/// Safe-style operation: plain call or delegatecall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Operation {
    #[default]
    Call,
    DelegateCall,
}

impl TryFrom<u8> for Operation {
    type Error = PilotError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(PilotError::BadRequest(format!("invalid operation: {other}"))),
        }
    }
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> u8 {
        match op {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }
}

/// Delegation module sitting between the pilot signer and the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModuleType {
    RolesV1,
    RolesV2,
    Delay,
}

impl ModuleType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleType::RolesV1 => "ROLES_V1",
            ModuleType::RolesV2 => "ROLES_V2",
            ModuleType::Delay => "DELAY",
        }
    }
}

impl FromStr for ModuleType {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ROLES_V1" => Ok(ModuleType::RolesV1),
            "ROLES_V2" => Ok(ModuleType::RolesV2),
            "DELAY" => Ok(ModuleType::Delay),
            other => Err(PilotError::UnsupportedModule(other.to_string())),
        }
    }
}

impl TryFrom<String> for ModuleType {
    type Error = PilotError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ModuleType> for String {
    fn from(m: ModuleType) -> String {
        m.as_str().to_string()
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The route a page is connected through: signer, optional module, avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub avatar_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_address: Option<Address>,
    pub pilot_address: Address,
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    /// Numeric for Roles v1, a bytes32 hex key for Roles v2.
    #[serde(
        default,
        deserialize_with = "deserialize_role_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub role_id: Option<String>,
    #[serde(default)]
    pub multisend: Vec<Address>,
}

/// Role ids arrive as JSON numbers (Roles v1) or strings (either version).
fn deserialize_role_id<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    Ok(Option::<Raw>::deserialize(d)?.map(|raw| match raw {
        Raw::Num(n) => n.to_string(),
        Raw::Str(s) => s,
    }))
}

/// Routes are owned elsewhere; the bridge only reads them.
pub type ExecutionRoute = Connection;

impl Connection {
    /// Chain id as an EIP-1193 hex quantity (`0x1`).
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    pub fn is_direct(&self) -> bool {
        self.module_address.is_none()
    }
}

/// Generic transaction or meta transaction as requested by a dApp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTransactionRequest {
    pub to: Address,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub value: U256,
    #[serde(default)]
    pub data: HexData,
    #[serde(default)]
    pub operation: Operation,
}

/// Concrete payload ready for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub from: Address,
    pub to: Address,
    pub data: HexData,
    pub value: U256,
}
