//! Round-trip quality harness for G.726 ADPCM at telephony rates
//!
//! Streams a fixed-rate PCM recording through an encode/decode round
//! trip, block by block, writes the reconstructed signal back out, and
//! reports how much the round trip degraded it (SNR in dB). Every stream
//! opened here is tracked by a handle registry so it is closed exactly
//! once, even when a run is abandoned early.

pub mod capture;
pub mod codec;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod snr;
pub mod telephony;

pub use error::{HarnessError, Result};
pub use pipeline::{BLOCK_LEN, PipelineContext, TranscodeReport, run_transcode};
pub use registry::{HandleRegistry, MAX_OPEN_STREAMS, StreamHandle};
pub use snr::SnrAccumulator;
pub use telephony::{SAMPLE_RATE, close_telephony, open_telephony_read, open_telephony_write};
