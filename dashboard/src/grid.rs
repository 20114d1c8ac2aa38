use serde::Serialize;

/// Column and row indices of the CPU cell grid, serialized as `[[cols..], [rows..]]`.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CpuGrid(pub Vec<usize>, pub Vec<usize>);

impl CpuGrid {
    pub fn columns(&self) -> usize {
        self.0.len()
    }

    pub fn rows(&self) -> usize {
        self.1.len()
    }
}

/// Lays out `n` CPU cells in a rectangle.
///
/// Row heights are tried from {1, 2, 4, 6, ...} up to the integer square root
/// of `n`; the tallest one dividing `n` wins, so columns never drop below rows.
/// Counts with no even divisor in range end up as a single row.
pub fn cpu_grid(n: usize) -> CpuGrid {
    let mut rows = 1;
    for height in (2..=n.isqrt()).step_by(2) {
        if n % height == 0 {
            rows = height;
        }
    }

    let columns = n / rows;
    CpuGrid((0..columns).collect(), (0..rows).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cpu_is_one_cell() {
        let g = cpu_grid(1);
        assert_eq!(g, CpuGrid(vec![0], vec![0]));
    }

    #[test]
    fn empty_node_has_no_columns() {
        let g = cpu_grid(0);
        assert_eq!(g.columns(), 0);
        assert_eq!(g.rows(), 1);
    }

    #[test]
    fn powers_of_two_are_roughly_square() {
        assert_eq!((cpu_grid(4).columns(), cpu_grid(4).rows()), (2, 2));
        assert_eq!((cpu_grid(8).columns(), cpu_grid(8).rows()), (4, 2));
        assert_eq!((cpu_grid(16).columns(), cpu_grid(16).rows()), (4, 4));
        assert_eq!((cpu_grid(32).columns(), cpu_grid(32).rows()), (8, 4));
        assert_eq!((cpu_grid(64).columns(), cpu_grid(64).rows()), (8, 8));
    }

    #[test]
    fn even_square_roots_become_the_row_count() {
        assert_eq!((cpu_grid(36).columns(), cpu_grid(36).rows()), (6, 6));
        assert_eq!((cpu_grid(100).columns(), cpu_grid(100).rows()), (10, 10));
        assert_eq!((cpu_grid(35).columns(), cpu_grid(35).rows()), (35, 1));
    }

    #[test]
    fn odd_counts_fall_back_to_one_row() {
        assert_eq!((cpu_grid(9).columns(), cpu_grid(9).rows()), (9, 1));
        assert_eq!((cpu_grid(7).columns(), cpu_grid(7).rows()), (7, 1));
    }

    #[test]
    fn grid_always_covers_and_is_wide() {
        for n in 1..=512 {
            let g = cpu_grid(n);
            assert!(g.columns() * g.rows() >= n, "n={}", n);
            assert!(g.rows() <= g.columns(), "n={}", n);
        }
    }

    #[test]
    fn serializes_as_index_pair() {
        let json = serde_json::to_value(cpu_grid(6)).unwrap();
        assert_eq!(json, serde_json::json!([[0, 1, 2], [0, 1]]));
    }
}
