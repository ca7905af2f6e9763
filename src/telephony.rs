//! Handles file I/O for telephony-rate PCM audio (WAV containers)
//!
//! Streams opened here are tracked by a [`HandleRegistry`] so that every
//! open file is closed exactly once, even when a run is abandoned early.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use hound;
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::registry::{HandleRegistry, MAX_OPEN_STREAMS, StreamHandle};

/// The one sample rate this harness accepts, in Hz
pub const SAMPLE_RATE: u32 = 8000;

/// Which way a stream moves audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction
{
    Read,
    Write,
}

impl Direction
{
    fn as_str(self) -> &'static str
    {
        match self
        {
            Direction::Read => "reading",
            Direction::Write => "writing",
        }
    }
}

/// Metadata carried alongside every open stream
#[derive(Debug, Clone, Copy)]
pub struct StreamInfo
{
    pub direction: Direction,
    pub sample_rate: u32,
    pub channels: u16,
}

/// One open telephony audio stream, either side of the round trip
pub enum TelephonyStream
{
    Reader
    {
        reader: hound::WavReader<BufReader<File>>,
        info: StreamInfo,
    },
    Writer
    {
        writer: hound::WavWriter<BufWriter<File>>,
        info: StreamInfo,
    },
}

impl TelephonyStream
{
    /// Create a fresh 16-bit linear PCM WAV file for writing
    pub fn create_writer(path: &Path, sample_rate: u32, channels: u16) -> Result<Self>
    {
        let spec = hound::WavSpec
        {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(path, spec).map_err(|source| HarnessError::OpenWrite
        {
            path: path.to_path_buf(),
            source,
        })?;

        let info = StreamInfo
        {
            direction: Direction::Write,
            sample_rate,
            channels,
        };

        Ok(TelephonyStream::Writer { writer, info })
    }

    pub fn info(&self) -> &StreamInfo
    {
        match self
        {
            TelephonyStream::Reader { info, .. } => info,
            TelephonyStream::Writer { info, .. } => info,
        }
    }

    /// Read up to `buf.len()` samples into `buf` and return how many were
    /// actually read. A short read (> 0) is valid mid-stream; 0 means the
    /// stream is exhausted. Samples are interleaved when multi-channel.
    pub fn read_frames(&mut self, buf: &mut [i16]) -> Result<usize>
    {
        let reader = match self
        {
            TelephonyStream::Reader { reader, .. } => reader,
            TelephonyStream::Writer { .. } => return Err(HarnessError::DirectionMismatch
            {
                opened_for: Direction::Write.as_str(),
                requested: Direction::Read.as_str(),
            }),
        };

        let mut count = 0;
        for sample in reader.samples::<i16>().take(buf.len())
        {
            buf[count] = sample.map_err(HarnessError::Read)?;
            count += 1;
        }

        Ok(count)
    }

    /// Append `samples` to the stream
    pub fn write_frames(&mut self, samples: &[i16]) -> Result<()>
    {
        let writer = match self
        {
            TelephonyStream::Writer { writer, .. } => writer,
            TelephonyStream::Reader { .. } => return Err(HarnessError::DirectionMismatch
            {
                opened_for: Direction::Read.as_str(),
                requested: Direction::Write.as_str(),
            }),
        };

        for &sample in samples
        {
            writer.write_sample(sample).map_err(HarnessError::Write)?;
        }

        Ok(())
    }

    /// Push buffered samples out and update the container header in place.
    /// Readers have nothing to flush and always succeed.
    pub fn flush(&mut self) -> std::result::Result<(), hound::Error>
    {
        match self
        {
            TelephonyStream::Reader { .. } => Ok(()),
            TelephonyStream::Writer { writer, .. } => writer.flush(),
        }
    }

    /// Best-effort close used by the registry's exit sweep. Errors are
    /// reported to the caller but there is nothing left to retry; the
    /// stream is consumed either way.
    pub fn force_close(self) -> std::result::Result<(), hound::Error>
    {
        match self
        {
            TelephonyStream::Reader { .. } => Ok(()),
            TelephonyStream::Writer { writer, .. } => writer.finalize(),
        }
    }
}

/// Open `path` for reading under the registry's cleanup guarantee.
///
/// Fails with a distinct error when the file cannot be opened, when its
/// sample rate is not the fixed telephony rate, when its channel count is
/// not the requested one, or when it is not 16-bit linear PCM.
pub fn open_telephony_read(
    registry: &mut HandleRegistry,
    path: &Path,
    channels: u16,
) -> Result<StreamHandle>
{
    let reader = hound::WavReader::open(path).map_err(|source| HarnessError::OpenRead
    {
        path: path.to_path_buf(),
        source,
    })?;

    // Protocol checks before the stream is ever registered
    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE
    {
        return Err(HarnessError::SampleRateMismatch
        {
            path: path.to_path_buf(),
            found: spec.sample_rate,
            expected: SAMPLE_RATE,
        });
    }
    if spec.channels != channels
    {
        return Err(HarnessError::ChannelMismatch
        {
            path: path.to_path_buf(),
            found: spec.channels,
            expected: channels,
        });
    }
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(HarnessError::UnsupportedFormat
        {
            path: path.to_path_buf(),
        });
    }

    let stream = TelephonyStream::Reader
    {
        reader,
        info: StreamInfo
        {
            direction: Direction::Read,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
    };

    let handle = registry.register(stream).map_err(|full|
    {
        // An unregistered stream is outside the cleanup guarantee, so it
        // is dropped (closed) right here rather than leaked.
        drop(full.0);
        HarnessError::RegistryFull { capacity: MAX_OPEN_STREAMS }
    })?;

    debug!(?handle, path = %path.display(), "opened telephony stream for reading");
    Ok(handle)
}

/// Create `path` for writing under the registry's cleanup guarantee.
/// The container is fixed to 16-bit linear PCM at the telephony rate;
/// its length stays unknown until the stream is closed.
pub fn open_telephony_write(
    registry: &mut HandleRegistry,
    path: &Path,
    channels: u16,
) -> Result<StreamHandle>
{
    let stream = TelephonyStream::create_writer(path, SAMPLE_RATE, channels)?;

    let handle = registry.register(stream).map_err(|full|
    {
        drop(full.0);
        HarnessError::RegistryFull { capacity: MAX_OPEN_STREAMS }
    })?;

    debug!(?handle, path = %path.display(), "opened telephony stream for writing");
    Ok(handle)
}

/// Close a registered stream.
///
/// On success the handle is deregistered and the underlying file is
/// closed. On failure the handle stays registered, so the exit sweep
/// still gets a chance to release it.
pub fn close_telephony(registry: &mut HandleRegistry, handle: StreamHandle) -> Result<()>
{
    let stream = registry.stream_mut(handle).ok_or(HarnessError::UnknownHandle)?;

    stream.flush().map_err(HarnessError::Close)?;
    registry.deregister(handle);

    debug!(?handle, "closed telephony stream");
    Ok(())
}
