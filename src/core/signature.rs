use crate::core::embedding::{NormalizedBatch, dot};
use crate::core::hyperplane::{HyperplaneBank, HyperplaneTable};
use rayon::prelude::*;

/// `N x T` signature keys, row-major by item. Row `i` holds item `i`'s key
/// for every table, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatrix {
    keys: Vec<u64>,
    num_tables: usize,
}

impl SignatureMatrix {
    pub fn num_items(&self) -> usize {
        self.keys.len() / self.num_tables
    }

    pub fn num_tables(&self) -> usize {
        self.num_tables
    }

    #[inline]
    pub fn key(&self, item: usize, table: usize) -> u64 {
        self.keys[item * self.num_tables + table]
    }
}

/// Projects normalized embeddings onto a bank's hyperplanes and packs the
/// sign bits into one `u64` per table.
pub struct SignatureHasher<'a> {
    bank: &'a HyperplaneBank,
}

impl<'a> SignatureHasher<'a> {
    pub fn new(bank: &'a HyperplaneBank) -> Self {
        Self { bank }
    }

    /// Bit `i` is set iff `dot(embedding, plane_i) >= 0`. A dot product of
    /// exactly zero sets the bit.
    #[inline]
    pub fn table_key(table: &HyperplaneTable, embedding: &[f32]) -> u64 {
        let mut key = 0u64;
        for (bit, plane) in table.planes().enumerate() {
            if dot(embedding, plane) >= 0.0 {
                key |= 1 << bit;
            }
        }
        key
    }

    /// One key per table, in table order.
    pub fn hash(&self, embedding: &[f32]) -> Vec<u64> {
        self.bank
            .tables()
            .iter()
            .map(|table| Self::table_key(table, embedding))
            .collect()
    }

    /// Hash every item of the batch. Items are independent, so rows are
    /// filled in parallel; each worker writes only its own row.
    pub fn hash_batch(&self, batch: &NormalizedBatch) -> SignatureMatrix {
        let num_tables = self.bank.num_tables();
        let mut keys = vec![0u64; batch.len() * num_tables];

        keys.par_chunks_mut(num_tables)
            .enumerate()
            .for_each(|(item, row)| {
                let embedding = batch.row(item);
                for (slot, table) in row.iter_mut().zip(self.bank.tables()) {
                    *slot = Self::table_key(table, embedding);
                }
            });

        log::debug!("Hashed {} items across {} tables", batch.len(), num_tables);

        SignatureMatrix { keys, num_tables }
    }
}
