//! custom serde helper functions
//!
//! These helpers decode params sent by untrusted pages. They only shape the data, callers still
//! validate the decoded values.

pub mod sequence {
    use serde::{
        Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned, ser::SerializeSeq,
    };

    pub fn serialize<S, T>(val: &T, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut seq = s.serialize_seq(Some(1))?;
        seq.serialize_element(val)?;
        seq.end()
    }

    /// Deserializes a sequence containing exactly one element.
    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let mut seq = Vec::<T>::deserialize(d)?;
        if seq.len() != 1 {
            return Err(serde::de::Error::custom(format!(
                "expected params sequence with length 1 but got {}",
                seq.len()
            )));
        }
        seq.pop().ok_or_else(|| serde::de::Error::custom("empty params sequence"))
    }
}

/// Params sent either as `[]` or as a sequence holding a single element.
pub mod optional_sequence {
    use serde::{
        Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned, ser::SerializeSeq,
    };

    pub fn serialize<S, T>(val: &Option<T>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut seq = s.serialize_seq(Some(val.is_some() as usize))?;
        if let Some(val) = val {
            seq.serialize_element(val)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let mut seq = Option::<Vec<T>>::deserialize(d)?.unwrap_or_default();
        if seq.len() > 1 {
            return Err(serde::de::Error::custom(format!(
                "expected params sequence with length 0 or 1 but got {}",
                seq.len()
            )));
        }
        Ok(seq.pop())
    }
}

/// Params that may be omitted, sent as `[]` or carry arbitrary values the wallet ignores.
pub mod lenient_params {
    use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};

    pub fn serialize<S>(_: &(), s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_seq(Some(0))?.end()
    }

    pub fn deserialize<'de, D>(d: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        serde::de::IgnoredAny::deserialize(d)?;
        Ok(())
    }
}

/// EIP-712 payloads arrive either as a JSON object or as a string containing that object.
pub mod typed_data {
    use alloy_dyn_abi::TypedData;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(val: &TypedData, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        val.serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Box<TypedData>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Payload {
            Json(String),
            Object(Box<TypedData>),
        }

        match Payload::deserialize(d)? {
            Payload::Json(raw) => serde_json::from_str(&raw).map_err(serde::de::Error::custom),
            Payload::Object(data) => Ok(data),
        }
    }
}

/// `personal_sign` payloads: `0x`-prefixed hex is decoded, anything else is signed as UTF-8.
pub mod message_payload {
    use alloy_primitives::{Bytes, hex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(val: &Bytes, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&hex::encode_prefixed(val))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        if let Some(stripped) = raw.strip_prefix("0x")
            && let Ok(bytes) = hex::decode(stripped)
        {
            return Ok(bytes.into());
        }
        Ok(Bytes::from(raw.into_bytes()))
    }
}
