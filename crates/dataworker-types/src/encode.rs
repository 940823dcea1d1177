// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Canonical leaf byte encoding: a 64-byte zero prefix (cross-environment
//! safety, mirroring the on-chain encoding) followed by the leaf fields as
//! 32-byte big-endian words in declaration order. Dynamic vectors are
//! length-prefixed.

use ethers::types::{Address, I256, U256};

pub(crate) struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub(crate) fn new() -> Self {
        Self { buf: vec![0u8; 64] }
    }

    pub(crate) fn u32(&mut self, value: u32) -> &mut Self {
        self.u256(U256::from(value))
    }

    pub(crate) fn u64(&mut self, value: u64) -> &mut Self {
        self.u256(U256::from(value))
    }

    pub(crate) fn address(&mut self, value: Address) -> &mut Self {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(value.as_bytes());
        self.buf.extend_from_slice(&word);
        self
    }

    pub(crate) fn u256(&mut self, value: U256) -> &mut Self {
        let mut word = [0u8; 32];
        value.to_big_endian(&mut word);
        self.buf.extend_from_slice(&word);
        self
    }

    // Two's complement representation, same as the on-chain int256 word.
    pub(crate) fn i256(&mut self, value: I256) -> &mut Self {
        self.u256(value.into_raw())
    }

    pub(crate) fn u256_vec(&mut self, values: &[U256]) -> &mut Self {
        self.u64(values.len() as u64);
        for value in values {
            self.u256(*value);
        }
        self
    }

    pub(crate) fn i256_vec(&mut self, values: &[I256]) -> &mut Self {
        self.u64(values.len() as u64);
        for value in values {
            self.i256(*value);
        }
        self
    }

    pub(crate) fn address_vec(&mut self, values: &[Address]) -> &mut Self {
        self.u64(values.len() as u64);
        for value in values {
            self.address(*value);
        }
        self
    }

    pub(crate) fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}
