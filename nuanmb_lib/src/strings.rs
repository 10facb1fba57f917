use binrw::{
    io::{Read, Seek},
    BinRead, BinResult, ReadOptions,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::RelPtr64;

/// The bytes of a string up to but not including the null terminator.
/// Reaching the end of the data before the terminator is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NullTerminated(Vec<u8>);

impl BinRead for NullTerminated {
    type Args = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        options: &ReadOptions,
        _args: Self::Args,
    ) -> BinResult<Self> {
        let mut bytes = Vec::new();
        loop {
            match u8::read_options(reader, options, ())? {
                0 => return Ok(Self(bytes)),
                b => bytes.push(b),
            }
        }
    }
}

/// A null terminated string with position determined by a relative offset.
/// Strings are 4-byte aligned in the file.
#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
pub struct SsbhString(RelPtr64<NullTerminated>);

impl SsbhString {
    /// Creates the string from `bytes` excluding the null terminator.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(RelPtr64::new(NullTerminated(bytes)))
    }

    /// The bytes of the string excluding the null terminator.
    /// The result will be [None] if the offset is null.
    pub fn to_bytes(&self) -> Option<&[u8]> {
        self.0.as_ref().map(|value| value.0.as_slice())
    }

    /// Converts the underlying buffer to a [str].
    /// The result will be [None] if the offset is null or the conversion failed.
    pub fn to_str(&self) -> Option<&str> {
        self.0
            .as_ref()
            .and_then(|value| std::str::from_utf8(&value.0).ok())
    }

    /// Converts the underlying buffer to a [String].
    /// Empty or null values are converted to empty strings.
    pub fn to_string_lossy(&self) -> String {
        self.to_str().unwrap_or("").to_string()
    }
}

impl From<&str> for SsbhString {
    fn from(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }
}

impl From<String> for SsbhString {
    fn from(text: String) -> Self {
        Self::from_bytes(text.into_bytes())
    }
}

#[cfg(feature = "serde")]
impl Serialize for SsbhString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.to_str() {
            Some(text) => serializer.serialize_str(text),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SsbhString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = Option::<String>::deserialize(deserializer)?;
        Ok(text.map(SsbhString::from).unwrap_or(Self(RelPtr64::null())))
    }
}
