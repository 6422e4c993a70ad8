use anyhow::Result;
use candle_core::Tensor;
use flate2::read::MultiGzDecoder;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if file_name_lower(path).ends_with(".gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn delimiter(path: &Path) -> char {
    if file_name_lower(path).contains(".csv") {
        ','
    } else {
        '\t'
    }
}

/// Read a dense matrix from a TSV/CSV file (optionally gzipped); one row per
/// example, no header.
pub fn read_dense_matrix(path: &Path) -> Result<Array2<f32>> {
    let reader = open_maybe_gz(path)?;
    let delim = delimiter(path);

    let mut values = Vec::new();
    let mut ncols: Option<usize> = None;
    let mut nrows = 0usize;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(delim)
            .map(|tok| tok.trim().parse::<f32>())
            .collect::<std::result::Result<Vec<f32>, _>>()?;
        match ncols {
            None => ncols = Some(row.len()),
            Some(c) if c != row.len() => {
                anyhow::bail!("ragged row {} in {}", nrows, path.display())
            }
            _ => {}
        }
        values.extend(row);
        nrows += 1;
    }

    let ncols = ncols.ok_or_else(|| anyhow::anyhow!("empty matrix file {}", path.display()))?;
    Ok(Array2::from_shape_vec((nrows, ncols), values)?)
}

/// Write a 2d tensor as TSV, one row per line.
pub fn write_tsv(x_nd: &Tensor, path: &Path) -> Result<()> {
    let rows: Vec<Vec<f32>> = x_nd.to_vec2()?;
    let mut out = BufWriter::new(File::create(path)?);
    for row in rows {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Synthetic binary bar patterns, for smoke-training without a data file:
/// each row carries one contiguous run of on-pixels plus a little flip noise.
pub fn synthetic_bars(n_rows: usize, n_features: usize, seed: u64) -> Array2<f32> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let width = n_features / 8 + 1;
    let mut x = Array2::<f32>::zeros((n_rows, n_features));
    for mut row in x.outer_iter_mut() {
        let start = rng.random_range(0..n_features);
        for j in 0..width {
            row[(start + j) % n_features] = 1.0;
        }
        for j in 0..n_features {
            if rng.random::<f32>() < 0.02 {
                row[j] = 1.0 - row[j];
            }
        }
    }
    x
}
