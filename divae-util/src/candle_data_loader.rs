use candle_core::{Device, Tensor};
use ndarray::Array2;
use rand::prelude::SliceRandom;
use rayon::prelude::*;

pub struct MinibatchData {
    pub input: Tensor,
}

/// `DataLoader` for minibatch learning.
pub trait DataLoader {
    fn minibatch_data(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData>;

    fn num_minibatch(&self) -> usize;

    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()>;
}

/// Conversion of a dense row-major container into per-row tensors.
pub trait RowsToTensorVec {
    fn rows_to_tensor_vec(&self) -> anyhow::Result<Vec<Tensor>>;
}

impl RowsToTensorVec for Array2<f32> {
    fn rows_to_tensor_vec(&self) -> anyhow::Result<Vec<Tensor>> {
        let ncols = self.ncols();
        let host_rows: Vec<Vec<f32>> = self.outer_iter().map(|row| row.to_vec()).collect();
        let rows = host_rows
            .into_par_iter()
            .map(|row| Tensor::from_vec(row, (1, ncols), &Device::Cpu))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl RowsToTensorVec for Vec<Vec<f32>> {
    fn rows_to_tensor_vec(&self) -> anyhow::Result<Vec<Tensor>> {
        let rows = self
            .par_iter()
            .map(|row| Tensor::from_vec(row.clone(), (1, row.len()), &Device::Cpu))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

///
/// A simple data loader for an in-memory 2d matrix. Each row is one feature
/// vector; the number of samples is the number of rows.
///
pub struct InMemoryData {
    rows: Vec<Tensor>,
    chunks: Vec<Vec<usize>>,
}

impl InMemoryData {
    pub fn new<D>(data: &D) -> anyhow::Result<Self>
    where
        D: RowsToTensorVec,
    {
        Ok(InMemoryData {
            rows: data.rows_to_tensor_vec()?,
            chunks: vec![],
        })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl DataLoader for InMemoryData {
    fn minibatch_data(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData> {
        let chunk = self
            .chunks
            .get(batch_idx)
            .ok_or_else(|| anyhow::anyhow!("minibatch #{} out of range", batch_idx))?;
        let rows: Vec<&Tensor> = chunk.iter().map(|&i| &self.rows[i]).collect();
        let input = Tensor::cat(&rows, 0)?.to_device(target_device)?;
        Ok(MinibatchData { input })
    }

    fn num_minibatch(&self) -> usize {
        self.chunks.len()
    }

    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()> {
        if batch_size == 0 {
            anyhow::bail!("batch size must be positive");
        }
        let mut samples: Vec<usize> = (0..self.rows.len()).collect();
        samples.shuffle(&mut rand::rng());
        self.chunks = samples
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        Ok(())
    }
}
