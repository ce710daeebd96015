//! Edge value types and the worker partition rule
//!
//! A weighted edge doubles as an update operation: a positive weight is an
//! insertion with that weight, a weight less than or equal to zero is a
//! deletion (the magnitude is ignored). Producers never emit insertions
//! with non-positive weights.

/// An unweighted vertex pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: u64,
    pub destination: u64,
}

impl Edge {
    pub fn new(source: u64, destination: u64) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// The same pair with source and destination swapped
    pub fn reciprocal(&self) -> Self {
        Self {
            source: self.destination,
            destination: self.source,
        }
    }
}

/// A weighted edge, or equivalently one update operation of the workload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEdge {
    pub source: u64,
    pub destination: u64,
    pub weight: f64,
}

impl WeightedEdge {
    pub fn new(source: u64, destination: u64, weight: f64) -> Self {
        Self {
            source,
            destination,
            weight,
        }
    }

    /// True if this operation inserts the edge, false if it removes it
    pub fn is_insertion(&self) -> bool {
        self.weight > 0.0
    }

    /// The vertex pair without the weight
    pub fn edge(&self) -> Edge {
        Edge::new(self.source, self.destination)
    }

    /// The worker responsible for this operation.
    ///
    /// Symmetric in the vertex pair: `worker(s, d) == worker(d, s)`, so for
    /// any unordered pair the same worker performs every insert and delete
    /// and no two workers ever contend on the same edge slot.
    pub fn worker(&self, num_workers: usize) -> usize {
        worker_for(self.source, self.destination, num_workers)
    }
}

impl std::fmt::Display for WeightedEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} [{}]",
            self.source, self.destination, self.weight
        )
    }
}

/// Deterministic partition of an unordered vertex pair onto a worker
pub fn worker_for(source: u64, destination: u64, num_workers: usize) -> usize {
    (source.min(destination) % num_workers as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_symmetric() {
        for s in 0..64u64 {
            for d in 0..64u64 {
                for n in 1..8usize {
                    assert_eq!(worker_for(s, d, n), worker_for(d, s, n));
                }
            }
        }
    }

    #[test]
    fn partition_in_range() {
        for s in 0..100u64 {
            assert!(worker_for(s, s + 13, 4) < 4);
        }
    }

    #[test]
    fn weight_sign_encodes_operation() {
        assert!(WeightedEdge::new(1, 2, 0.5).is_insertion());
        assert!(!WeightedEdge::new(1, 2, 0.0).is_insertion());
        assert!(!WeightedEdge::new(1, 2, -3.0).is_insertion());
    }

    #[test]
    fn reciprocal_swaps_endpoints() {
        let e = Edge::new(7, 9);
        assert_eq!(e.reciprocal(), Edge::new(9, 7));
    }
}
