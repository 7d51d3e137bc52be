//! Minimal Solidity ABI encoder for the module entry points.
//!
//! Only the types the delegation modules take are supported. Static values
//! occupy one 32-byte word in the head; `bytes` puts an offset in the head and
//! its length plus right-padded content in the tail.

use primitive_types::U256;
use sha3::{Digest, Keccak256};

use crate::tx::types::Address;

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// First four bytes of the keccak hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// One ABI argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    /// Any `uintN`; the caller is responsible for range.
    Uint(U256),
    Bool(bool),
    FixedBytes32([u8; 32]),
    Bytes(Vec<u8>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::Bytes(_))
    }
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let args = encode(tokens);
    let mut out = Vec::with_capacity(4 + args.len());
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(&args);
    out
}

pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word(U256::from(head_len + tail.len())));
            if let Token::Bytes(b) = token {
                tail.extend_from_slice(&uint_word(U256::from(b.len())));
                tail.extend_from_slice(b);
                tail.resize(tail.len() + padding(b.len()), 0);
            }
            continue;
        }
        head.extend_from_slice(&static_word(token));
    }

    head.extend_from_slice(&tail);
    head
}

fn static_word(token: &Token) -> [u8; WORD] {
    match token {
        Token::Address(a) => {
            let mut w = [0u8; WORD];
            w[12..].copy_from_slice(a.as_bytes());
            w
        }
        Token::Uint(v) => uint_word(*v),
        Token::Bool(b) => uint_word(U256::from(u8::from(*b))),
        Token::FixedBytes32(b) => *b,
        // dynamic tokens never reach here
        Token::Bytes(_) => [0u8; WORD],
    }
}

fn uint_word(v: U256) -> [u8; WORD] {
    let mut w = [0u8; WORD];
    v.to_big_endian(&mut w);
    w
}

fn padding(len: usize) -> usize {
    (WORD - len % WORD) % WORD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn erc20_transfer_selector() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn bytes_are_padded_in_the_tail() {
        let out = encode(&[Token::Bool(true), Token::Bytes(vec![0x12, 0x34])]);
        assert_eq!(out.len(), 4 * WORD);
        assert_eq!(out[WORD - 1], 1);
        // offset of the bytes tail = two head words
        assert_eq!(out[2 * WORD - 1], 0x40);
        assert_eq!(out[3 * WORD - 1], 2);
        assert_eq!(&out[3 * WORD..3 * WORD + 2], &[0x12, 0x34]);
        assert!(out[3 * WORD + 2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn empty_bytes_have_no_content_words() {
        let out = encode(&[Token::Bytes(Vec::new())]);
        assert_eq!(out.len(), 2 * WORD);
        assert_eq!(out[WORD - 1], 0x20);
        assert!(out[WORD..].iter().all(|b| *b == 0));
    }
}
