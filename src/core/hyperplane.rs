//! Random hyperplane tables for sign-bit LSH.
//!
//! A bank is `T` tables of `P` unit-length hyperplane normals in `D`
//! dimensions, drawn from one seed. Building is deterministic in
//! `(T, P, D, seed)` and the result is never mutated afterwards.

use crate::core::rng::DeterministicRng;
use crate::error::{ConfigError, MAX_PLANES_PER_TABLE};

/// `P` hyperplane normals stored row-major, `dim` floats each.
#[derive(Debug, Clone)]
pub struct HyperplaneTable {
    normals: Vec<f32>,
    dim: usize,
}

impl HyperplaneTable {
    pub fn num_planes(&self) -> usize {
        self.normals.len() / self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn planes(&self) -> std::slice::ChunksExact<'_, f32> {
        self.normals.chunks_exact(self.dim)
    }
}

#[derive(Debug, Clone)]
pub struct HyperplaneBank {
    tables: Vec<HyperplaneTable>,
    planes_per_table: usize,
    dim: usize,
    seed: u64,
}

impl HyperplaneBank {
    pub fn build(
        num_tables: usize,
        planes_per_table: usize,
        dim: usize,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if num_tables == 0 {
            return Err(ConfigError::ZeroTables);
        }
        if planes_per_table == 0 {
            return Err(ConfigError::ZeroPlanes);
        }
        if planes_per_table > MAX_PLANES_PER_TABLE {
            return Err(ConfigError::TooManyPlanes {
                planes: planes_per_table,
                max: MAX_PLANES_PER_TABLE,
            });
        }
        if dim == 0 {
            return Err(ConfigError::ZeroDimension);
        }

        let mut rng = DeterministicRng::new(seed);
        let tables = (0..num_tables)
            .map(|_| {
                let mut normals = Vec::with_capacity(planes_per_table * dim);
                for _ in 0..planes_per_table {
                    normals.extend(draw_unit_normal(&mut rng, dim));
                }
                HyperplaneTable { normals, dim }
            })
            .collect();

        log::debug!(
            "Built hyperplane bank: {} tables x {} planes, dim {}, seed {}",
            num_tables,
            planes_per_table,
            dim,
            seed
        );

        Ok(Self {
            tables,
            planes_per_table,
            dim,
            seed,
        })
    }

    pub fn tables(&self) -> &[HyperplaneTable] {
        &self.tables
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn planes_per_table(&self) -> usize {
        self.planes_per_table
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Draw `dim` uniform values in `[-1, 1)` and normalize them, redrawing the
/// whole vector in the (vanishingly rare) case it comes out all zero.
fn draw_unit_normal(rng: &mut DeterministicRng, dim: usize) -> Vec<f32> {
    loop {
        let raw: Vec<f64> = (0..dim).map(|_| rng.next_signed_unit()).collect();
        let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            return raw.iter().map(|x| (x / norm) as f32).collect();
        }
    }
}
