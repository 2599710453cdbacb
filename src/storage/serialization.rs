use std::fmt::Debug;

use base64::{Engine as _, engine::general_purpose};
use minicbor::{Encode, Decode, Encoder};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("memory string was not valid base64: {0}")]
  Base64(#[from] base64::DecodeError),
  #[error("could not decode cbor: {0}")]
  DecodeCbor(#[from] minicbor::decode::Error),
  #[error("could not encode cbor: {0}")]
  EncodeCbor(String),
}

impl<T: Debug> From<minicbor::encode::Error<T>> for StoreError {
  fn from(err: minicbor::encode::Error<T>) -> StoreError {
    StoreError::EncodeCbor(format!("{err:?}"))
  }
}

pub fn from_buffer<T>(buffer: &[u8]) -> Result<T, StoreError>
where T: for<'b> Decode<'b, ()> {
  Ok(minicbor::decode(buffer)?)
}

pub fn to_buffer<T: Encode<()>>(value: &T, buffer: &mut Vec<u8>) -> Result<(), StoreError> {
  let mut encoder = Encoder::new(buffer);
  encoder.encode(value)?;
  Ok(())
}

/// Encode a value into a fresh buffer.
pub fn to_bytes<T: Encode<()>>(value: &T) -> Result<Vec<u8>, StoreError> {
  let mut buffer = Vec::new();
  to_buffer(value, &mut buffer)?;
  Ok(buffer)
}

// Raw memory segments only hold strings, so bytes go through base64 first.
pub fn to_mem_string(data: &[u8]) -> String {
  general_purpose::STANDARD_NO_PAD.encode(data)
}

pub fn from_mem_string(string: &str, target: &mut Vec<u8>) -> Result<(), StoreError> {
  Ok(general_purpose::STANDARD_NO_PAD.decode_vec(string, target)?)
}
