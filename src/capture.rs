//! Persists the encoded side of a round trip for later inspection
use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::error::{HarnessError, Result};

/// Configuration the captured blocks were produced under
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CaptureHeader
{
    pub bit_rate_bps: u32,
    pub sample_rate: u32,
    pub block_len: usize,
}

/// The raw ADPCM bytes of every block one pipeline run produced,
/// in processing order
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EncodedCapture
{
    pub header: CaptureHeader,
    pub blocks: Vec<Vec<u8>>,
}

impl EncodedCapture
{
    pub fn new(header: CaptureHeader) -> Self
    {
        EncodedCapture
        {
            header,
            blocks: Vec::new(),
        }
    }

    /// Record one block's encoded bytes
    pub fn push_block(&mut self, adpcm: &[u8])
    {
        self.blocks.push(adpcm.to_vec());
    }

    /// Total encoded bytes across all captured blocks
    pub fn encoded_bytes(&self) -> usize
    {
        self.blocks.iter().map(|block| block.len()).sum()
    }
}

/// Save a capture to `path`
pub fn save_capture(capture: &EncodedCapture, path: &Path) -> Result<()>
{
    let data = bincode::serialize(capture).map_err(HarnessError::CaptureCodec)?;
    std::fs::write(path, data).map_err(|source| HarnessError::CaptureIo
    {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Load a capture back from `path`
pub fn load_capture(path: &Path) -> Result<EncodedCapture>
{
    let data = std::fs::read(path).map_err(|source| HarnessError::CaptureIo
    {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize(&data).map_err(HarnessError::CaptureCodec)
}
