#[cfg(test)]
mod tests;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::{Read, Write};
use tracing::debug;

use crate::{MemoryError, Result};

const SNAPSHOT_VERSION: u32 = 1;

/// Exhaustive nearest-neighbour store over squared Euclidean distance.
///
/// Rows are kept contiguously in one buffer. The dimension is unset until
/// the first `add` and is binding afterwards; rows are never updated or
/// removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
}

/// A row returned from [`FlatIndex::search`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    dimension: Option<u64>,
    data: &'a [f32],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    dimension: Option<u64>,
    data: Vec<f32>,
}

impl FlatIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimension fixed by the first added vector, if any
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dimension.map_or(0, |dim| self.data.len() / dim)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let dim = self.dimension?;
        self.data.get(row * dim..(row + 1) * dim)
    }

    /// Check that a vector of `len` components could be added
    #[inline]
    pub fn check_dimension(&self, len: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != len => Err(MemoryError::DimensionMismatch {
                expected,
                actual: len,
            }),
            Some(_) => Ok(()),
            None if len == 0 => Err(MemoryError::InvalidVector(
                "cannot index a zero-dimensional vector".to_string(),
            )),
            None => Ok(()),
        }
    }

    /// Append a row and return its index
    #[inline]
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector.len())?;

        let row = self.len();
        if self.dimension.is_none() {
            debug!("Fixing vector index dimension at {}", vector.len());
            self.dimension = Some(vector.len());
        }
        self.data.extend_from_slice(vector);
        Ok(row)
    }

    /// Up to `k` rows closest to `query`, nearest first.
    ///
    /// Equal distances are ordered by row index. An empty index returns
    /// nothing regardless of the query's dimension.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let Some(dim) = self.dimension else {
            return Ok(Vec::new());
        };
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != dim {
            return Err(MemoryError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(dim)
            .enumerate()
            .map(|(row, stored)| Neighbor {
                row,
                distance: squared_l2(query, stored),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k, by_distance);
            neighbors.truncate(k);
        }
        neighbors.sort_by(by_distance);

        Ok(neighbors)
    }

    #[inline]
    pub fn write_to<W: Write>(&self, writer: W) -> AnyResult<()> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension.map(|dim| dim as u64),
            data: &self.data,
        };
        bincode::serialize_into(writer, &snapshot).context("Failed to encode vector index")
    }

    /// Decode a snapshot written by [`FlatIndex::write_to`], rejecting
    /// anything that could not have been produced by appends
    #[inline]
    pub fn read_from<R: Read>(reader: R) -> AnyResult<Self> {
        let snapshot: Snapshot =
            bincode::deserialize_from(reader).context("Failed to decode vector index")?;

        if snapshot.version != SNAPSHOT_VERSION {
            anyhow::bail!(
                "Unsupported vector index version {} (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }

        let dimension = snapshot
            .dimension
            .map(usize::try_from)
            .transpose()
            .context("Vector dimension does not fit in memory")?;

        match dimension {
            None if !snapshot.data.is_empty() => {
                anyhow::bail!("Vector index has data but no dimension")
            }
            Some(0) => anyhow::bail!("Vector index has zero dimension"),
            Some(dim) if snapshot.data.len() % dim != 0 => anyhow::bail!(
                "Vector index holds {} values, not a multiple of dimension {}",
                snapshot.data.len(),
                dim
            ),
            _ => {}
        }

        Ok(Self {
            dimension,
            data: snapshot.data,
        })
    }
}

fn by_distance(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.row.cmp(&b.row))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
