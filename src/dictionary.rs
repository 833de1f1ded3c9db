//! First-seen dictionary encoding.
//!
//! A [`DictionaryTable`] replaces repeated values with dense indices. Indices
//! are handed out in order of first insertion and never change, which makes
//! the insertion order the serialized row order of the table.

use crate::error::{PointObsError, Result};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Ordered set of distinct values with index lookup in both directions
#[derive(Debug, Clone)]
pub struct DictionaryTable<T> {
    name: &'static str,
    values: Vec<T>,
    index: HashMap<T, usize>,
}

impl<T> DictionaryTable<T>
where
    T: Clone + Eq + Hash,
{
    /// Create an empty table; `name` labels out-of-range errors
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            values: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild a table whose row order is already fixed, such as one read
    /// back from a file. Every row is kept where it is; a repeated value
    /// looks up to its first row.
    pub fn from_values(name: &'static str, values: Vec<T>) -> Self {
        let mut index = HashMap::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            index.entry(value.clone()).or_insert(i);
        }
        Self {
            name,
            values,
            index,
        }
    }

    /// Return the index of `value`, appending it if unseen
    pub fn intern<Q>(&mut self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = T> + ?Sized,
    {
        if let Some(&existing) = self.index.get(value) {
            return existing;
        }
        let next = self.values.len();
        let owned = value.to_owned();
        self.index.insert(owned.clone(), next);
        self.values.push(owned);
        next
    }

    /// Look up the value stored at `index`
    pub fn resolve(&self, index: usize) -> Result<&T> {
        self.values
            .get(index)
            .ok_or_else(|| PointObsError::out_of_range(self.name, index, self.values.len()))
    }

    /// Index of `value` without inserting it
    pub fn position<Q>(&self, value: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in serialized (first-seen) order
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> FromIterator<T> for DictionaryTable<T>
where
    T: Clone + Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = DictionaryTable::new("dictionary");
        for value in iter {
            table.intern(&value);
        }
        table
    }
}
