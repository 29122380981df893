//! Checkpoint tape used to record and reload pipeline positions
//!
//! A tape is an ordered sequence of [`Data`] values with a read cursor.
//! Every source writes its resumption state in a fixed order and reads it back
//! in exactly the same order.

use serde::{Deserialize, Serialize};

use crate::data::Data;
use crate::error::{Error, Result};

/// A primitive value that can be stored on a tape
pub trait TapeValue: Sized {
    /// Convert the value into its tape representation
    fn into_data(self) -> Data;

    /// Restore the value from its tape representation
    fn from_data(data: Data) -> Option<Self>;
}

/// Ordered cursor over recorded positions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tape {
    storage: Vec<Data>,

    #[serde(skip)]
    cursor: usize,
}

impl Tape {
    /// Create an empty tape
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tape from previously recorded values, positioned at the start
    pub fn from_storage(storage: Vec<Data>) -> Self {
        Self { storage, cursor: 0 }
    }

    /// Append a value
    pub fn record<T: TapeValue>(&mut self, value: T) {
        self.storage.push(value.into_data());
    }

    /// Read the next value, failing if the tape is exhausted or the value has
    /// the wrong shape
    pub fn read<T: TapeValue>(&mut self) -> Result<T> {
        let data = self
            .storage
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| Error::corrupt(format!("read past the end of the tape at position {}", self.cursor)))?;

        let kind = data.kind();

        let value = T::from_data(data).ok_or_else(|| {
            Error::corrupt(format!(
                "unexpected {kind} value at position {} (expected {})",
                self.cursor,
                std::any::type_name::<T>()
            ))
        })?;

        self.cursor += 1;

        Ok(value)
    }

    /// Append a nested tape as a single value
    pub fn record_tape(&mut self, tape: Tape) {
        self.storage.push(Data::List(tape.storage));
    }

    /// Read a nested tape, positioned at its start
    pub fn read_tape(&mut self) -> Result<Tape> {
        let storage: Vec<Data> = self.read()?;

        Ok(Tape::from_storage(storage))
    }

    /// Move the read cursor back to the start
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Recorded values
    pub fn storage(&self) -> &[Data] {
        &self.storage
    }

    /// Whether every recorded value has been read
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.storage.len()
    }

    /// Encode the recorded values
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.storage)?)
    }

    /// Decode values produced by [`Tape::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let storage = bincode::deserialize(bytes)?;

        Ok(Self::from_storage(storage))
    }
}

impl TapeValue for Data {
    fn into_data(self) -> Data {
        self
    }

    fn from_data(data: Data) -> Option<Self> {
        Some(data)
    }
}

impl TapeValue for bool {
    fn into_data(self) -> Data {
        Data::Bool(self)
    }

    fn from_data(data: Data) -> Option<Self> {
        data.as_bool()
    }
}

impl TapeValue for i64 {
    fn into_data(self) -> Data {
        Data::Int(self)
    }

    fn from_data(data: Data) -> Option<Self> {
        data.as_int()
    }
}

impl TapeValue for u64 {
    fn into_data(self) -> Data {
        // Positions larger than i64::MAX are stored as raw bytes.
        match i64::try_from(self) {
            Ok(v) => Data::Int(v),
            Err(_) => Data::Bytes(self.to_le_bytes().to_vec()),
        }
    }

    fn from_data(data: Data) -> Option<Self> {
        match data {
            Data::Int(v) => u64::try_from(v).ok(),
            Data::Bytes(bytes) => bytes.try_into().ok().map(u64::from_le_bytes),
            _ => None,
        }
    }
}

impl TapeValue for usize {
    fn into_data(self) -> Data {
        (self as u64).into_data()
    }

    fn from_data(data: Data) -> Option<Self> {
        u64::from_data(data).and_then(|v| usize::try_from(v).ok())
    }
}

impl TapeValue for u128 {
    fn into_data(self) -> Data {
        Data::Bytes(self.to_le_bytes().to_vec())
    }

    fn from_data(data: Data) -> Option<Self> {
        match data {
            Data::Bytes(bytes) => bytes.try_into().ok().map(u128::from_le_bytes),
            _ => None,
        }
    }
}

impl TapeValue for String {
    fn into_data(self) -> Data {
        Data::String(self)
    }

    fn from_data(data: Data) -> Option<Self> {
        match data {
            Data::String(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: TapeValue> TapeValue for Vec<T> {
    fn into_data(self) -> Data {
        Data::List(self.into_iter().map(TapeValue::into_data).collect())
    }

    fn from_data(data: Data) -> Option<Self> {
        data.into_list().ok()?.into_iter().map(T::from_data).collect()
    }
}

impl<T: TapeValue> TapeValue for Option<T> {
    fn into_data(self) -> Data {
        Data::List(self.into_iter().map(TapeValue::into_data).collect())
    }

    fn from_data(data: Data) -> Option<Self> {
        let mut items = data.into_list().ok()?;

        match items.len() {
            0 => Some(None),
            1 => items.pop().and_then(T::from_data).map(Some),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_read_in_order() {
        let mut tape = Tape::new();
        tape.record(3usize);
        tape.record(true);
        tape.record(Some(Data::from("x")));
        tape.record(u128::MAX - 1);
        tape.record::<Option<Data>>(None);

        tape.rewind();

        assert_eq!(tape.read::<usize>().unwrap(), 3);
        assert!(tape.read::<bool>().unwrap());
        assert_eq!(tape.read::<Option<Data>>().unwrap(), Some(Data::from("x")));
        assert_eq!(tape.read::<u128>().unwrap(), u128::MAX - 1);
        assert_eq!(tape.read::<Option<Data>>().unwrap(), None);
        assert!(tape.is_exhausted());
    }

    #[test]
    fn test_read_past_end_is_corrupt() {
        let mut tape = Tape::new();

        assert!(matches!(tape.read::<usize>(), Err(Error::CorruptTape(_))));
    }

    #[test]
    fn test_type_mismatch_is_corrupt() {
        let mut tape = Tape::new();
        tape.record(String::from("not a number"));
        tape.rewind();

        assert!(matches!(tape.read::<usize>(), Err(Error::CorruptTape(_))));
    }

    #[test]
    fn test_nested_tape() {
        let mut child = Tape::new();
        child.record(5usize);

        let mut tape = Tape::new();
        tape.record_tape(child);
        tape.record(1usize);
        tape.rewind();

        let mut child = tape.read_tape().unwrap();
        assert_eq!(child.read::<usize>().unwrap(), 5);
        assert_eq!(tape.read::<usize>().unwrap(), 1);
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut tape = Tape::new();
        tape.record(vec![Data::Int(1), Data::Float(0.5)]);
        tape.record(u64::MAX);

        let mut restored = Tape::from_bytes(&tape.to_bytes().unwrap()).unwrap();

        assert_eq!(restored.read::<Vec<Data>>().unwrap(), vec![Data::Int(1), Data::Float(0.5)]);
        assert_eq!(restored.read::<u64>().unwrap(), u64::MAX);
    }
}
