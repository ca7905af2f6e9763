//! Drives one full transcode-and-measure pass over an input stream
use serde::Serialize;
use tracing::{debug, trace};

use crate::capture::EncodedCapture;
use crate::codec::{BlockDecoder, BlockEncoder};
use crate::error::{HarnessError, Result};
use crate::registry::{HandleRegistry, StreamHandle};
use crate::snr::SnrAccumulator;
use crate::telephony::close_telephony;

/// Frames pulled from the input per iteration (20 ms at 8 kHz)
pub const BLOCK_LEN: usize = 160;

/// Everything one run accumulates: the quality statistic and, when
/// attached, the encoded bytes of every block. Each run gets its own
/// context so independent runs never share state.
#[derive(Default)]
pub struct PipelineContext
{
    pub snr: SnrAccumulator,
    pub capture: Option<EncodedCapture>,
}

impl PipelineContext
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// A context that also records the encoded bitstream
    pub fn with_capture(capture: EncodedCapture) -> Self
    {
        PipelineContext
        {
            snr: SnrAccumulator::new(),
            capture: Some(capture),
        }
    }
}

/// What one completed pass looked like
#[derive(Serialize, Debug, Clone)]
pub struct TranscodeReport
{
    /// Blocks pulled from the input (including a trailing partial one)
    pub blocks: u64,
    /// PCM frames read and pushed through the codec
    pub frames: u64,
    /// ADPCM bytes the encoder produced
    pub encoded_bytes: u64,
    /// Sample pairs folded into the quality statistic
    pub samples_measured: u64,
    /// Final round-trip quality in decibels
    pub snr_db: f64,
}

/// Stream `input` through encode/decode block by block, writing the
/// reconstructed signal to `output` and measuring it against the
/// original. Both handles are closed through the adapter once the input
/// is exhausted.
///
/// The encoder and decoder are two independent codec states; this
/// function uses the first exclusively to encode and the second
/// exclusively to decode.
pub fn run_transcode<E, D>(
    registry: &mut HandleRegistry,
    encoder: &mut E,
    decoder: &mut D,
    input: StreamHandle,
    output: StreamHandle,
    ctx: &mut PipelineContext,
) -> Result<TranscodeReport>
where
    E: BlockEncoder,
    D: BlockDecoder,
{
    // One block of each buffer, reused every iteration. The encoded side
    // never needs more than one byte per sample at any supported rate.
    let mut pcm = vec![0i16; BLOCK_LEN];
    let mut adpcm = vec![0u8; BLOCK_LEN];
    let mut reconstructed = vec![0i16; BLOCK_LEN];

    let mut blocks = 0u64;
    let mut frames = 0u64;
    let mut encoded_bytes = 0u64;

    loop
    {
        let read = registry
            .stream_mut(input)
            .ok_or(HarnessError::UnknownHandle)?
            .read_frames(&mut pcm)?;
        if read == 0
        {
            break;
        }

        let encoded = encoder.encode(&mut adpcm, &pcm[..read]);
        let decoded = decoder.decode(&mut reconstructed[..read], &adpcm[..encoded]);

        registry
            .stream_mut(output)
            .ok_or(HarnessError::UnknownHandle)?
            .write_frames(&reconstructed[..decoded])?;

        for (&original, &recon) in pcm[..read].iter().zip(&reconstructed[..decoded])
        {
            ctx.snr.update(original, recon);
        }

        if let Some(capture) = ctx.capture.as_mut()
        {
            capture.push_block(&adpcm[..encoded]);
        }

        trace!(block = blocks, read, encoded, decoded, "processed block");

        blocks += 1;
        frames += read as u64;
        encoded_bytes += encoded as u64;
    }

    close_telephony(registry, input)?;
    close_telephony(registry, output)?;

    let report = TranscodeReport
    {
        blocks,
        frames,
        encoded_bytes,
        samples_measured: ctx.snr.samples(),
        snr_db: ctx.snr.snr_db(),
    };
    debug!(
        blocks = report.blocks,
        frames = report.frames,
        snr_db = report.snr_db,
        "transcode pass complete"
    );

    Ok(report)
}
