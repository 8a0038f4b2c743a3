// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DER encoding of an `AuthorizationList`.
//
//   AuthorizationList ::= SEQUENCE {
//       purpose          [1]   EXPLICIT SET OF INTEGER OPTIONAL,
//       algorithm        [2]   EXPLICIT INTEGER OPTIONAL,
//       keySize          [3]   EXPLICIT INTEGER OPTIONAL,
//       blockMode        [4]   EXPLICIT SET OF INTEGER OPTIONAL,
//       padding          [6]   EXPLICIT SET OF INTEGER OPTIONAL,
//       noAuthRequired   [503] EXPLICIT NULL OPTIONAL,
//   }
//
// Empty sets are omitted. The encoding is the AAD of a wrapped key bundle, so
// it has to be byte-exact with what the secure hardware re-encodes.

use std::collections::BTreeSet;

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{Algorithm, AuthorizationList, BlockMode, KeyPurpose, Padding};

use crate::asn1::{self, Reader, Tag};

pub const TAG_PURPOSE: u32 = 1;
pub const TAG_ALGORITHM: u32 = 2;
pub const TAG_KEY_SIZE: u32 = 3;
pub const TAG_BLOCK_MODE: u32 = 4;
pub const TAG_PADDING: u32 = 6;
pub const TAG_NO_AUTH_REQUIRED: u32 = 503;

fn int_set(codes: impl Iterator<Item = u64>) -> Vec<u8> {
    asn1::set_of(codes.map(asn1::integer).collect())
}

/// Encode `list` as a DER `AuthorizationList`.
pub fn encode(list: &AuthorizationList) -> Vec<u8> {
    let mut fields = Vec::with_capacity(6);

    if !list.purposes.is_empty() {
        let set = int_set(list.purposes.iter().map(|p| p.code()));
        fields.push(asn1::explicit(TAG_PURPOSE, &set));
    }
    fields.push(asn1::explicit(TAG_ALGORITHM, &asn1::integer(list.algorithm.code())));
    fields.push(asn1::explicit(
        TAG_KEY_SIZE,
        &asn1::integer(u64::from(list.key_size_bits)),
    ));
    if !list.block_modes.is_empty() {
        let set = int_set(list.block_modes.iter().map(|m| m.code()));
        fields.push(asn1::explicit(TAG_BLOCK_MODE, &set));
    }
    if !list.paddings.is_empty() {
        let set = int_set(list.paddings.iter().map(|p| p.code()));
        fields.push(asn1::explicit(TAG_PADDING, &set));
    }
    if list.no_auth_required {
        fields.push(asn1::explicit(TAG_NO_AUTH_REQUIRED, &asn1::null()));
    }

    asn1::sequence(fields)
}

fn rejected(what: impl std::fmt::Display) -> KeywardError {
    KeywardError::ImportRejected(format!("authorization list: {what}"))
}

fn read_code_set<T>(inner: &[u8], field: &str, from_code: fn(u64) -> Option<T>) -> Result<BTreeSet<T>>
where
    T: Ord,
{
    let mut reader = Reader::new(inner);
    let set = reader.expect(Tag::SET)?;
    reader.finish()?;

    let mut members = Reader::new(set.content);
    let mut out = BTreeSet::new();
    while !members.is_empty() {
        let code = members.read_integer()?;
        let value = from_code(code).ok_or_else(|| rejected(format!("unknown {field} code {code}")))?;
        out.insert(value);
    }
    Ok(out)
}

fn read_single_integer(inner: &[u8]) -> Result<u64> {
    let mut reader = Reader::new(inner);
    let value = reader.read_integer()?;
    reader.finish()?;
    Ok(value)
}

/// Decode an `AuthorizationList` from the next element of `reader`.
///
/// Only the canonical encoding is accepted: unknown tags, out-of-order
/// fields, duplicate or unsorted set members, and empty sets are rejected.
pub fn decode_from(reader: &mut Reader<'_>) -> Result<AuthorizationList> {
    let element = reader.expect(Tag::SEQUENCE)?;
    let mut fields = Reader::new(element.content);

    let mut purposes = BTreeSet::new();
    let mut algorithm = None;
    let mut key_size_bits = None;
    let mut block_modes = BTreeSet::new();
    let mut paddings = BTreeSet::new();
    let mut no_auth_required = false;

    while !fields.is_empty() {
        let field = fields.read()?;
        if field.tag.class != asn1::Class::ContextSpecific || !field.tag.constructed {
            return Err(rejected("expected an explicitly tagged field"));
        }
        match field.tag.number {
            TAG_PURPOSE => purposes = read_code_set(field.content, "purpose", KeyPurpose::from_code)?,
            TAG_ALGORITHM => {
                let code = read_single_integer(field.content)?;
                algorithm = Some(
                    Algorithm::from_code(code)
                        .ok_or_else(|| rejected(format!("unknown algorithm code {code}")))?,
                );
            }
            TAG_KEY_SIZE => {
                let bits = read_single_integer(field.content)?;
                key_size_bits = Some(
                    u32::try_from(bits).map_err(|_| rejected(format!("key size {bits} out of range")))?,
                );
            }
            TAG_BLOCK_MODE => {
                block_modes = read_code_set(field.content, "block mode", BlockMode::from_code)?;
            }
            TAG_PADDING => paddings = read_code_set(field.content, "padding", Padding::from_code)?,
            TAG_NO_AUTH_REQUIRED => {
                let mut inner = Reader::new(field.content);
                inner.read_null()?;
                inner.finish()?;
                no_auth_required = true;
            }
            other => return Err(rejected(format!("unsupported tag [{other}]"))),
        }
    }

    let list = AuthorizationList {
        purposes,
        algorithm: algorithm.ok_or_else(|| rejected("missing algorithm"))?,
        key_size_bits: key_size_bits.ok_or_else(|| rejected("missing key size"))?,
        block_modes,
        paddings,
        no_auth_required,
    };

    if encode(&list) != element.raw {
        return Err(rejected("not in canonical DER form"));
    }
    Ok(list)
}

/// Decode a standalone DER `AuthorizationList`.
pub fn decode(der: &[u8]) -> Result<AuthorizationList> {
    let mut reader = Reader::new(der);
    let list = decode_from(&mut reader)?;
    reader.finish()?;
    Ok(list)
}
