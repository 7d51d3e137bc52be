//! Module-aware transaction wrapping.
//!
//! When a route goes through a delegation module, the pilot signer cannot call
//! the target directly: it calls the module, which forwards the inner call to
//! the avatar. `wrap` produces that outer call. Pure and deterministic.

use primitive_types::U256;

use crate::error::{PilotError, Result};
use crate::tx::abi::{encode_call, Token};
use crate::tx::types::{
    parse_quantity, Connection, HexData, MetaTransactionRequest, ModuleType, TransactionData,
};

pub const ROLES_V1_EXEC: &str = "execTransactionWithRole(address,uint256,bytes,uint8,uint16,bool)";
pub const ROLES_V2_EXEC: &str = "execTransactionWithRole(address,uint256,bytes,uint8,bytes32,bool)";
pub const DELAY_EXEC: &str = "execTransactionFromModule(address,uint256,bytes,uint8)";

/// Roles v2 default role key: the 32-byte zero value (64 hex chars).
pub const ZERO_ROLE_KEY: [u8; 32] = [0u8; 32];

/// Wrap with `revert_on_error = true`.
pub fn wrap_default(request: &MetaTransactionRequest, connection: &Connection) -> Result<TransactionData> {
    wrap(request, connection, true)
}

/// Encode `request` as a call into the route's delegation module.
///
/// Errors when the route executes directly (no module) or names a module
/// type without an encoder. Neither is transient; callers must not retry.
pub fn wrap(
    request: &MetaTransactionRequest,
    connection: &Connection,
    revert_on_error: bool,
) -> Result<TransactionData> {
    let module = connection.module_address.ok_or(PilotError::DirectExecution)?;
    let module_type = connection
        .module_type
        .ok_or_else(|| PilotError::UnsupportedModule("<none>".into()))?;

    let data = match module_type {
        ModuleType::RolesV1 => roles_v1(request, connection.role_id.as_deref(), revert_on_error)?,
        ModuleType::RolesV2 => roles_v2(request, connection.role_id.as_deref(), revert_on_error)?,
        ModuleType::Delay => delay(request),
    };

    Ok(TransactionData {
        from: connection.pilot_address,
        to: module,
        data: HexData(data),
        value: U256::zero(),
    })
}

fn inner_call(request: &MetaTransactionRequest) -> [Token; 4] {
    [
        Token::Address(request.to),
        Token::Uint(request.value),
        Token::Bytes(request.data.as_slice().to_vec()),
        Token::Uint(U256::from(u8::from(request.operation))),
    ]
}

fn roles_v1(req: &MetaTransactionRequest, role: Option<&str>, revert: bool) -> Result<Vec<u8>> {
    let role = match role {
        Some(r) => parse_role_v1(r)?,
        None => 0,
    };
    let [to, value, data, op] = inner_call(req);
    Ok(encode_call(
        ROLES_V1_EXEC,
        &[to, value, data, op, Token::Uint(U256::from(role)), Token::Bool(revert)],
    ))
}

fn roles_v2(req: &MetaTransactionRequest, role: Option<&str>, revert: bool) -> Result<Vec<u8>> {
    let key = match role {
        Some(r) => parse_role_v2(r)?,
        None => ZERO_ROLE_KEY,
    };
    let [to, value, data, op] = inner_call(req);
    Ok(encode_call(
        ROLES_V2_EXEC,
        &[to, value, data, op, Token::FixedBytes32(key), Token::Bool(revert)],
    ))
}

fn delay(req: &MetaTransactionRequest) -> Vec<u8> {
    encode_call(DELAY_EXEC, &inner_call(req))
}

fn parse_role_v1(raw: &str) -> Result<u16> {
    let v = parse_quantity(raw)?;
    if v > U256::from(u16::MAX) {
        return Err(PilotError::BadRequest(format!("roles v1 role id out of range: {raw}")));
    }
    Ok(v.low_u32() as u16)
}

fn parse_role_v2(raw: &str) -> Result<[u8; 32]> {
    let bytes: HexData = raw.parse()?;
    let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        PilotError::BadRequest(format!(
            "roles v2 role id must be 32 bytes, got {}: {raw}",
            bytes.len()
        ))
    })?;
    Ok(key)
}
