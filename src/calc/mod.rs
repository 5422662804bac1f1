use nalgebra::*;

/// Covariance estimation under the (type, centering, scaling) conventions.
pub mod cov;

/* All matrices in this module are tall: observations over rows, variables
over columns. Means are returned as column vectors of length ncols. */

/// Mean of each variable (column). An empty matrix yields a zero vector.
pub fn column_means(m : &DMatrix<f64>) -> DVector<f64> {
    if m.nrows() == 0 {
        return DVector::zeros(m.ncols());
    }
    DVector::from_iterator(m.ncols(), m.column_iter().map(|c| c.mean() ))
}

/// Subtracts the informed mean from every row of m.
pub fn center_rows(m : &mut DMatrix<f64>, mean : &DVector<f64>) {
    let mean_t = mean.transpose();
    for mut row in m.row_iter_mut() {
        row -= &mean_t;
    }
}

/// Concatenates blocks sharing the same number of columns over the rows.
pub fn stack(blocks : &[DMatrix<f64>]) -> DMatrix<f64> {
    let ncols = blocks.first().map(|b| b.ncols() ).unwrap_or(0);
    let nrows = blocks.iter().map(|b| b.nrows() ).sum();
    let mut out = DMatrix::zeros(nrows, ncols);
    let mut offset = 0;
    for b in blocks {
        out.rows_mut(offset, b.nrows()).copy_from(b);
        offset += b.nrows();
    }
    out
}

/// Mean over all rows of all blocks, as if they were stacked.
pub fn pooled_mean(blocks : &[DMatrix<f64>]) -> DVector<f64> {
    let ncols = blocks.first().map(|b| b.ncols() ).unwrap_or(0);
    let n : usize = blocks.iter().map(|b| b.nrows() ).sum();
    let mut sum = DVector::zeros(ncols);
    for b in blocks {
        for row in b.row_iter() {
            sum += row.transpose();
        }
    }
    if n > 0 {
        sum.unscale_mut(n as f64);
    }
    sum
}

/// Sum of euclidean distances from each row of m to the informed point.
pub fn total_deviation(m : &DMatrix<f64>, point : &DVector<f64>) -> f64 {
    let point_t = point.transpose();
    m.row_iter().map(|row| (row - &point_t).norm() ).sum()
}
