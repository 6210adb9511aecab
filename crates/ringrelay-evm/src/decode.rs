//! Raw ABI decoding of logs and calldata into `DynSolValue`s, plus typed
//! accessors over the decoded argument list.

use alloy_dyn_abi::Specifier;
use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::{Event, Function};
use alloy_primitives::{Address, B256, U256};
use ringrelay_core::error::DecodeError;

/// Decode a log into one value per ABI input, in declaration order.
///
/// Indexed inputs come from `topics[1..]`. Value types are ABI-decoded from
/// their 32-byte topic; reference types are only present as their keccak256
/// hash, which is returned as `bytes32`.
pub fn decode_log(event: &Event, topics: &[B256], data: &[u8]) -> Result<Vec<DynSolValue>, DecodeError> {
    let first_indexed = usize::from(!event.anonymous);
    let indexed = event.inputs.iter().filter(|p| p.indexed).count();
    let required = first_indexed + indexed;
    if topics.len() < required {
        return Err(DecodeError::MissingTopics {
            name: event.name.clone(),
            expected: required,
            got: topics.len(),
        });
    }

    let mut body_types = Vec::new();
    for param in event.inputs.iter().filter(|p| !p.indexed) {
        body_types.push(resolve(param.resolve(), &param.name)?);
    }
    let body_values = if body_types.is_empty() {
        Vec::new()
    } else {
        match DynSolType::Tuple(body_types).abi_decode_params(data) {
            Ok(DynSolValue::Tuple(vals)) => vals,
            Ok(other) => vec![other],
            Err(e) => {
                return Err(DecodeError::AbiDecodeFailed {
                    reason: format!("{} data: {e}", event.name),
                })
            }
        }
    };
    let mut body = body_values.into_iter();

    let mut topic_iter = topics.iter().skip(first_indexed);
    let mut out = Vec::with_capacity(event.inputs.len());
    for param in &event.inputs {
        if param.indexed {
            let ty = resolve(param.resolve(), &param.name)?;
            let topic = topic_iter.next().ok_or_else(|| DecodeError::MissingTopics {
                name: event.name.clone(),
                expected: required,
                got: topics.len(),
            })?;
            out.push(decode_topic(&ty, topic)?);
        } else {
            let value = body.next().ok_or_else(|| DecodeError::AbiDecodeFailed {
                reason: format!("{}: missing value for '{}'", event.name, param.name),
            })?;
            out.push(value);
        }
    }
    Ok(out)
}

fn decode_topic(ty: &DynSolType, topic: &B256) -> Result<DynSolValue, DecodeError> {
    match ty {
        DynSolType::String
        | DynSolType::Bytes
        | DynSolType::Array(_)
        | DynSolType::FixedArray(..)
        | DynSolType::Tuple(_) => Ok(DynSolValue::FixedBytes(*topic, 32)),
        _ => ty
            .abi_decode(topic.as_slice())
            .map_err(|e| DecodeError::AbiDecodeFailed {
                reason: format!("topic decode: {e}"),
            }),
    }
}

/// Decode calldata (selector included) into one value per function input.
pub fn decode_call(func: &Function, input: &[u8]) -> Result<Vec<DynSolValue>, DecodeError> {
    if input.len() < 4 {
        return Err(DecodeError::InvalidInput {
            reason: format!(
                "calldata too short: {} bytes (need at least 4 for selector)",
                input.len()
            ),
        });
    }
    if input[..4] != func.selector().0 {
        return Err(DecodeError::UnknownSignature {
            signature: format!("0x{}", hex::encode(&input[..4])),
        });
    }

    let types = func
        .inputs
        .iter()
        .map(|p| resolve(p.resolve(), &p.name))
        .collect::<Result<Vec<_>, _>>()?;
    if types.is_empty() {
        return Ok(Vec::new());
    }

    match DynSolType::Tuple(types).abi_decode_params(&input[4..]) {
        Ok(DynSolValue::Tuple(vals)) => Ok(vals),
        Ok(other) => Ok(vec![other]),
        Err(e) => Err(DecodeError::AbiDecodeFailed {
            reason: format!("{} input: {e}", func.name),
        }),
    }
}

fn resolve<E: std::fmt::Display>(
    ty: Result<DynSolType, E>,
    name: &str,
) -> Result<DynSolType, DecodeError> {
    ty.map_err(|e| DecodeError::AbiDecodeFailed {
        reason: format!("cannot resolve type of '{name}': {e}"),
    })
}

/// Positional, typed access to a decoded argument list.
pub struct Args<'a> {
    name: &'a str,
    values: Vec<DynSolValue>,
}

impl<'a> Args<'a> {
    /// `name` is the event/method name, used in error messages.
    pub fn new(name: &'a str, values: Vec<DynSolValue>) -> Self {
        Self { name, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, i: usize, expected: &str) -> Result<&DynSolValue, DecodeError> {
        self.values.get(i).ok_or_else(|| self.mismatch(i, expected))
    }

    fn mismatch(&self, i: usize, expected: &str) -> DecodeError {
        DecodeError::TypeMismatch {
            field: format!("{}[{i}]", self.name),
            expected: expected.to_string(),
        }
    }

    pub fn address(&self, i: usize) -> Result<Address, DecodeError> {
        as_address(self.get(i, "address")?).ok_or_else(|| self.mismatch(i, "address"))
    }

    pub fn uint(&self, i: usize) -> Result<U256, DecodeError> {
        as_uint(self.get(i, "uint")?).ok_or_else(|| self.mismatch(i, "uint"))
    }

    /// A `uint` that must fit in `T`.
    pub fn small<T: TryFrom<u64>>(&self, i: usize) -> Result<T, DecodeError> {
        let v = self.uint(i)?;
        narrow(v).ok_or_else(|| self.mismatch(i, std::any::type_name::<T>()))
    }

    pub fn bool(&self, i: usize) -> Result<bool, DecodeError> {
        match self.get(i, "bool")? {
            DynSolValue::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(i, "bool")),
        }
    }

    pub fn b256(&self, i: usize) -> Result<B256, DecodeError> {
        as_b256(self.get(i, "bytes32")?).ok_or_else(|| self.mismatch(i, "bytes32"))
    }

    pub fn string(&self, i: usize) -> Result<String, DecodeError> {
        match self.get(i, "string")? {
            DynSolValue::String(s) => Ok(s.clone()),
            _ => Err(self.mismatch(i, "string")),
        }
    }

    /// A dynamic or fixed array, returned as its elements.
    pub fn list(&self, i: usize) -> Result<&[DynSolValue], DecodeError> {
        match self.get(i, "array")? {
            DynSolValue::Array(items) | DynSolValue::FixedArray(items) => Ok(items.as_slice()),
            _ => Err(self.mismatch(i, "array")),
        }
    }

    pub fn b256_list(&self, i: usize) -> Result<Vec<B256>, DecodeError> {
        self.list(i)?
            .iter()
            .map(|v| as_b256(v).ok_or_else(|| self.mismatch(i, "bytes32[]")))
            .collect()
    }

    pub fn address_array<const N: usize>(&self, i: usize) -> Result<[Address; N], DecodeError> {
        let items = self.list(i)?;
        let expected = format!("address[{N}]");
        if items.len() != N {
            return Err(self.mismatch(i, &expected));
        }
        let mut out = [Address::ZERO; N];
        for (slot, v) in out.iter_mut().zip(items) {
            *slot = as_address(v).ok_or_else(|| self.mismatch(i, &expected))?;
        }
        Ok(out)
    }

    pub fn uint_array<const N: usize>(&self, i: usize) -> Result<[U256; N], DecodeError> {
        let items = self.list(i)?;
        let expected = format!("uint256[{N}]");
        if items.len() != N {
            return Err(self.mismatch(i, &expected));
        }
        let mut out = [U256::ZERO; N];
        for (slot, v) in out.iter_mut().zip(items) {
            *slot = as_uint(v).ok_or_else(|| self.mismatch(i, &expected))?;
        }
        Ok(out)
    }
}

fn as_address(v: &DynSolValue) -> Option<Address> {
    match v {
        DynSolValue::Address(a) => Some(*a),
        // indexed addresses decoded from a raw word
        DynSolValue::FixedBytes(word, 32) => Some(Address::from_word(*word)),
        _ => None,
    }
}

fn as_uint(v: &DynSolValue) -> Option<U256> {
    match v {
        DynSolValue::Uint(u, _) => Some(*u),
        _ => None,
    }
}

fn as_b256(v: &DynSolValue) -> Option<B256> {
    match v {
        DynSolValue::FixedBytes(word, 32) => Some(*word),
        _ => None,
    }
}

fn narrow<T: TryFrom<u64>>(v: U256) -> Option<T> {
    if v > U256::from(u64::MAX) {
        return None;
    }
    T::try_from(v.as_limbs()[0]).ok()
}
