//! G.726 ADPCM encode/decode, the codec side of the round trip
//!
//! The pipeline only depends on the [`BlockEncoder`] and [`BlockDecoder`]
//! traits; the G.726 [`Encoder`]/[`Decoder`] pair behind them is a
//! floating-point realization of the adaptive quantizer and adaptive
//! predictor. Both sides share one reconstruction path, so a decoder fed
//! an encoder's output tracks the encoder's internal state exactly.

/// Minimum of the logarithmic scale factor
const Y_MIN: f64 = 1.06;
/// Maximum of the logarithmic scale factor
const Y_MAX: f64 = 10.0;

/// Encodes PCM blocks into ADPCM code words
pub trait BlockEncoder
{
    /// Encode `pcm` into `adpcm`, returning the number of bytes written
    fn encode(&mut self, adpcm: &mut [u8], pcm: &[i16]) -> usize;
}

/// Decodes ADPCM code words back into PCM
pub trait BlockDecoder
{
    /// Decode `adpcm` into `pcm`, returning the number of samples written
    fn decode(&mut self, pcm: &mut [i16], adpcm: &[u8]) -> usize;
}

/// The four G.726 operating rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitrate
{
    Kbps16,
    Kbps24,
    Kbps32,
    Kbps40,
}

impl Bitrate
{
    /// Map a bit rate in bit/s to an operating rate
    pub fn from_bps(bps: u32) -> Option<Bitrate>
    {
        match bps
        {
            16000 => Some(Bitrate::Kbps16),
            24000 => Some(Bitrate::Kbps24),
            32000 => Some(Bitrate::Kbps32),
            40000 => Some(Bitrate::Kbps40),
            _ => None,
        }
    }

    pub fn bps(self) -> u32
    {
        match self
        {
            Bitrate::Kbps16 => 16000,
            Bitrate::Kbps24 => 24000,
            Bitrate::Kbps32 => 32000,
            Bitrate::Kbps40 => 40000,
        }
    }

    /// Width of one code word in bits, sign bit included
    pub fn bits_per_code(self) -> u32
    {
        match self
        {
            Bitrate::Kbps16 => 2,
            Bitrate::Kbps24 => 3,
            Bitrate::Kbps32 => 4,
            Bitrate::Kbps40 => 5,
        }
    }

    fn tables(self) -> &'static RateTables
    {
        match self
        {
            Bitrate::Kbps16 => &TABLES_16K,
            Bitrate::Kbps24 => &TABLES_24K,
            Bitrate::Kbps32 => &TABLES_32K,
            Bitrate::Kbps40 => &TABLES_40K,
        }
    }
}

/// How code words are laid out in the encoded byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing
{
    /// One code word per byte, right-justified (the harness's fixed mode)
    None,
    /// Code words packed MSB-first
    Left,
    /// Code words packed LSB-first
    Right,
}

/// Per-rate quantizer behavior, all in the log2 domain used by the
/// scale-factor adaptation. `decision` holds the thresholds between
/// magnitude levels, `recon` the reconstruction level per magnitude
/// (-16.0 marks the dead zone that reconstructs to zero), `weight` the
/// scale-factor multipliers, and `speed` the adaptation-speed function.
struct RateTables
{
    bits: u32,
    decision: &'static [f64],
    recon: &'static [f64],
    weight: &'static [f64],
    speed: &'static [f64],
}

static TABLES_16K: RateTables = RateTables
{
    bits: 2,
    decision: &[2.04],
    recon: &[0.91, 2.85],
    weight: &[-1.375, 27.44],
    speed: &[0.0, 7.0],
};

static TABLES_24K: RateTables = RateTables
{
    bits: 3,
    decision: &[0.0625, 1.703125, 2.5859375],
    recon: &[-16.0, 1.0546875, 2.1328125, 2.9140625],
    weight: &[-0.25, 1.875, 8.5625, 36.375],
    speed: &[0.0, 1.0, 2.0, 7.0],
};

static TABLES_32K: RateTables = RateTables
{
    bits: 4,
    decision: &[-0.96875, 0.625, 1.390625, 1.921875, 2.34375, 2.7265625, 3.125],
    recon: &[
        -16.0, 0.03125, 1.0546875, 1.6640625, 2.1328125, 2.5234375, 2.9140625, 3.3203125,
    ],
    weight: &[-0.75, 1.125, 2.5625, 4.0, 7.0, 12.375, 22.1875, 70.125],
    speed: &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 3.0, 7.0],
};

static TABLES_40K: RateTables = RateTables
{
    bits: 5,
    decision: &[
        -0.953125, -0.125, 0.5234375, 1.078125, 1.5390625, 1.9453125, 2.3203125, 2.640625,
        2.9453125, 3.21875, 3.46875, 3.703125, 3.9140625, 4.1171875, 4.3125,
    ],
    recon: &[
        -16.0, -0.515625, 0.21875, 0.8125, 1.3203125, 1.75, 2.140625, 2.484375, 2.796875,
        3.0859375, 3.3515625, 3.5859375, 3.8125, 4.015625, 4.2109375, 4.421875,
    ],
    weight: &[
        0.4375, 0.4375, 0.75, 1.21875, 1.25, 1.28125, 1.8125, 3.125, 4.40625, 5.59375,
        6.84375, 8.75, 11.1875, 13.75, 16.53125, 21.75,
    ],
    speed: &[
        0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 6.0, 6.0, 6.0, 6.0, 6.0,
    ],
};

fn sgn0(x: f64) -> f64
{
    if x > 0.0
    {
        1.0
    }
    else if x < 0.0
    {
        -1.0
    }
    else
    {
        0.0
    }
}

/// Shared adaptive quantizer + predictor state. The encoder and the
/// decoder both step this through the identical reconstruction path, one
/// code word at a time.
struct AdaptState
{
    tables: &'static RateTables,
    /// Fast (unlocked) part of the scale factor
    yu: f64,
    /// Slow (locked) part of the scale factor
    yl: f64,
    /// Short-term average of the speed-control function
    dms: f64,
    /// Long-term average of the speed-control function
    dml: f64,
    /// Unlimited speed-control parameter
    ap: f64,
    /// Pole coefficients of the adaptive predictor
    a: [f64; 2],
    /// Zero coefficients of the adaptive predictor
    b: [f64; 6],
    /// Past quantized difference signals
    dq_hist: [f64; 6],
    /// Past reconstructed signals
    sr_hist: [f64; 2],
    /// Signs of past partial reconstructions (p = dq + sez)
    pk_hist: [f64; 2],
    /// Tone detected on the previous step
    td: bool,
}

impl AdaptState
{
    fn new(rate: Bitrate) -> Self
    {
        AdaptState
        {
            tables: rate.tables(),
            yu: Y_MIN,
            yl: Y_MIN,
            dms: 0.0,
            dml: 0.0,
            ap: 0.0,
            a: [0.0; 2],
            b: [0.0; 6],
            dq_hist: [0.0; 6],
            sr_hist: [0.0; 2],
            pk_hist: [1.0; 2],
            td: false,
        }
    }

    /// Signal estimate from the six zeroes and two poles.
    /// Returns (se, sez): the full estimate and the zero-only part.
    fn predict(&self) -> (f64, f64)
    {
        let sez: f64 = self.b.iter().zip(&self.dq_hist).map(|(b, dq)| b * dq).sum();
        let se = sez + self.a[0] * self.sr_hist[0] + self.a[1] * self.sr_hist[1];
        (se, sez)
    }

    /// Current quantizer scale factor: fast and slow parts blended by the
    /// limited speed-control parameter
    fn scale(&self) -> f64
    {
        let al = self.ap.min(1.0);
        al * self.yu + (1.0 - al) * self.yl
    }

    /// Quantize a difference signal against the per-rate decision levels
    fn quantize(&self, d: f64, y: f64) -> u8
    {
        let dln = if d == 0.0
        {
            f64::NEG_INFINITY
        }
        else
        {
            d.abs().log2() - y
        };

        let mut magnitude = 0u8;
        for &threshold in self.tables.decision
        {
            if dln >= threshold
            {
                magnitude += 1;
            }
        }

        if d < 0.0
        {
            magnitude | 1 << (self.tables.bits - 1)
        }
        else
        {
            magnitude
        }
    }

    /// Inverse-quantize one code word, reconstruct the signal, and adapt
    /// every piece of state. Returns the reconstructed signal.
    fn reconstruct(&mut self, code: u8, y: f64, se: f64, sez: f64) -> f64
    {
        let sign_bit = 1u8 << (self.tables.bits - 1);
        let magnitude = (code & (sign_bit - 1)) as usize;
        let negative = code & sign_bit != 0;

        let dqln = self.tables.recon[magnitude];
        let mut dq = if dqln <= -16.0 { 0.0 } else { (dqln + y).exp2() };
        if negative
        {
            dq = -dq;
        }

        let sr = se + dq;

        // A large quantized step while a tone is active marks a transition;
        // the predictor restarts rather than chase it
        let tr = self.td && dq.abs() > 24.0 * self.yl.exp2();

        let p = dq + sez;
        let pks = if p < 0.0 { -1.0 } else { 1.0 };

        if tr
        {
            self.a = [0.0; 2];
            self.b = [0.0; 6];
        }
        else
        {
            // Sign-sign gradient with leakage on the two poles
            let f = if self.a[0].abs() <= 0.5
            {
                4.0 * self.a[0]
            }
            else
            {
                2.0 * self.a[0].signum()
            };
            let mut a2 = (1.0 - 1.0 / 128.0) * self.a[1]
                + (pks * self.pk_hist[1] - f * pks * self.pk_hist[0]) / 128.0;
            a2 = a2.clamp(-0.75, 0.75);

            let mut a1 = (1.0 - 1.0 / 256.0) * self.a[0] + 3.0 * pks * self.pk_hist[0] / 256.0;
            let pole_limit = 1.0 - 1.0 / 16.0 - a2;
            a1 = a1.clamp(-pole_limit, pole_limit);

            self.a = [a1, a2];

            // and on the six zeroes
            let dq_sign = sgn0(dq);
            for k in 0..6
            {
                self.b[k] =
                    (1.0 - 1.0 / 256.0) * self.b[k] + dq_sign * sgn0(self.dq_hist[k]) / 128.0;
            }
        }

        for k in (1..6).rev()
        {
            self.dq_hist[k] = self.dq_hist[k - 1];
        }
        self.dq_hist[0] = dq;
        self.sr_hist = [sr, self.sr_hist[0]];
        self.pk_hist = [pks, self.pk_hist[0]];

        self.td = !tr && self.a[1] < -0.71875;

        // Scale factor adaptation: the fast part chases the per-level
        // weight, the slow part chases the fast part
        let w = self.tables.weight[magnitude];
        self.yu = (y + (w - y) / 32.0).clamp(Y_MIN, Y_MAX);
        self.yl += (self.yu - self.yl) / 64.0;

        // Adaptation speed control
        let f_i = self.tables.speed[magnitude];
        self.dms += (f_i - self.dms) / 32.0;
        self.dml += (f_i - self.dml) / 128.0;

        self.ap = if tr
        {
            1.0
        }
        else if y < 3.0 || self.td || (self.dms - self.dml).abs() >= self.dml / 8.0
        {
            (1.0 - 1.0 / 16.0) * self.ap + 1.0 / 8.0
        }
        else
        {
            (1.0 - 1.0 / 16.0) * self.ap
        };

        sr
    }

    fn encode_sample(&mut self, sample: i16) -> u8
    {
        // 16-bit PCM down into the 14-bit working domain
        let x = f64::from(sample) / 4.0;
        let (se, sez) = self.predict();
        let y = self.scale();
        let code = self.quantize(x - se, y);
        self.reconstruct(code, y, se, sez);
        code
    }

    fn decode_sample(&mut self, code: u8) -> i16
    {
        let (se, sez) = self.predict();
        let y = self.scale();
        let sr = self.reconstruct(code, y, se, sez);
        (sr * 4.0).round().clamp(-32768.0, 32767.0) as i16
    }
}

/// G.726 encoder: PCM blocks in, ADPCM code words out
pub struct Encoder
{
    state: AdaptState,
    rate: Bitrate,
    packing: Packing,
}

impl Encoder
{
    pub fn new(rate: Bitrate, packing: Packing) -> Self
    {
        Encoder
        {
            state: AdaptState::new(rate),
            rate,
            packing,
        }
    }

    pub fn bitrate(&self) -> Bitrate
    {
        self.rate
    }

    /// Forget all adaptation history, as if freshly constructed
    pub fn reset(&mut self)
    {
        self.state = AdaptState::new(self.rate);
    }

    /// Bytes needed to encode `samples` PCM samples at this configuration
    pub fn encoded_len(&self, samples: usize) -> usize
    {
        match self.packing
        {
            Packing::None => samples,
            _ => (samples * self.rate.bits_per_code() as usize).div_ceil(8),
        }
    }
}

impl BlockEncoder for Encoder
{
    fn encode(&mut self, adpcm: &mut [u8], pcm: &[i16]) -> usize
    {
        assert!(
            adpcm.len() >= self.encoded_len(pcm.len()),
            "encode output buffer too small: {} bytes for {} samples",
            adpcm.len(),
            pcm.len()
        );

        let bits = self.rate.bits_per_code();
        match self.packing
        {
            Packing::None =>
            {
                for (byte, &sample) in adpcm.iter_mut().zip(pcm)
                {
                    *byte = self.state.encode_sample(sample);
                }
                pcm.len()
            }
            Packing::Left =>
            {
                let mut acc = 0u32;
                let mut pending = 0u32;
                let mut written = 0;
                for &sample in pcm
                {
                    acc = (acc << bits) | u32::from(self.state.encode_sample(sample));
                    pending += bits;
                    while pending >= 8
                    {
                        adpcm[written] = ((acc >> (pending - 8)) & 0xff) as u8;
                        written += 1;
                        pending -= 8;
                    }
                    // keep only the undrained low bits
                    acc &= (1 << pending) - 1;
                }
                if pending > 0
                {
                    // trailing code words sit flush against the MSB
                    adpcm[written] = ((acc << (8 - pending)) & 0xff) as u8;
                    written += 1;
                }
                written
            }
            Packing::Right =>
            {
                let mut acc = 0u32;
                let mut pending = 0u32;
                let mut written = 0;
                for &sample in pcm
                {
                    acc |= u32::from(self.state.encode_sample(sample)) << pending;
                    pending += bits;
                    while pending >= 8
                    {
                        adpcm[written] = (acc & 0xff) as u8;
                        written += 1;
                        acc >>= 8;
                        pending -= 8;
                    }
                }
                if pending > 0
                {
                    adpcm[written] = (acc & 0xff) as u8;
                    written += 1;
                }
                written
            }
        }
    }
}

/// G.726 decoder: ADPCM code words in, reconstructed PCM out.
///
/// With `Packing::Left` or `Packing::Right`, trailing pad bits of a final
/// partial byte decode as extra code words; callers that need exact
/// sample counts keep block sizes byte-aligned or use `Packing::None`.
pub struct Decoder
{
    state: AdaptState,
    rate: Bitrate,
    packing: Packing,
}

impl Decoder
{
    pub fn new(rate: Bitrate, packing: Packing) -> Self
    {
        Decoder
        {
            state: AdaptState::new(rate),
            rate,
            packing,
        }
    }

    pub fn bitrate(&self) -> Bitrate
    {
        self.rate
    }

    /// Forget all adaptation history, as if freshly constructed
    pub fn reset(&mut self)
    {
        self.state = AdaptState::new(self.rate);
    }

    /// Samples produced by decoding `bytes` encoded bytes at this
    /// configuration
    pub fn decoded_len(&self, bytes: usize) -> usize
    {
        match self.packing
        {
            Packing::None => bytes,
            _ => bytes * 8 / self.rate.bits_per_code() as usize,
        }
    }
}

impl BlockDecoder for Decoder
{
    fn decode(&mut self, pcm: &mut [i16], adpcm: &[u8]) -> usize
    {
        assert!(
            pcm.len() >= self.decoded_len(adpcm.len()),
            "decode output buffer too small: {} samples for {} bytes",
            pcm.len(),
            adpcm.len()
        );

        let bits = self.rate.bits_per_code();
        let mask = (1u32 << bits) - 1;
        match self.packing
        {
            Packing::None =>
            {
                for (sample, &byte) in pcm.iter_mut().zip(adpcm)
                {
                    *sample = self.state.decode_sample(byte & mask as u8);
                }
                adpcm.len()
            }
            Packing::Left =>
            {
                let mut acc = 0u32;
                let mut pending = 0u32;
                let mut produced = 0;
                for &byte in adpcm
                {
                    acc = (acc << 8) | u32::from(byte);
                    pending += 8;
                    while pending >= bits
                    {
                        let code = ((acc >> (pending - bits)) & mask) as u8;
                        pcm[produced] = self.state.decode_sample(code);
                        produced += 1;
                        pending -= bits;
                    }
                    // keep only the undrained low bits
                    acc &= (1 << pending) - 1;
                }
                produced
            }
            Packing::Right =>
            {
                let mut acc = 0u32;
                let mut pending = 0u32;
                let mut produced = 0;
                for &byte in adpcm
                {
                    acc |= u32::from(byte) << pending;
                    pending += 8;
                    while pending >= bits
                    {
                        let code = (acc & mask) as u8;
                        acc >>= bits;
                        pending -= bits;
                        pcm[produced] = self.state.decode_sample(code);
                        produced += 1;
                    }
                }
                produced
            }
        }
    }
}
