//! Maps the CLI's `--mode` flag onto [`mml_synth::PcmMode`]'s three axes.

use clap::ValueEnum;
use std::fmt;

use mml_synth::{Channels, PcmMode, SampleWidth, Sign};

/// One of the eight PCM output configurations, named `<width>-<channels>-<sign>`.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PcmModeArg {
    U8MonoUnsigned,
    U8MonoSigned,
    U8StereoUnsigned,
    U8StereoSigned,
    S16MonoUnsigned,
    S16MonoSigned,
    S16StereoUnsigned,
    S16StereoSigned,
}

impl From<PcmModeArg> for PcmMode {
    fn from(arg: PcmModeArg) -> Self {
        let (width, channels, sign) = match arg {
            PcmModeArg::U8MonoUnsigned => (SampleWidth::Eight, Channels::Mono, Sign::Unsigned),
            PcmModeArg::U8MonoSigned => (SampleWidth::Eight, Channels::Mono, Sign::Signed),
            PcmModeArg::U8StereoUnsigned => (SampleWidth::Eight, Channels::Stereo, Sign::Unsigned),
            PcmModeArg::U8StereoSigned => (SampleWidth::Eight, Channels::Stereo, Sign::Signed),
            PcmModeArg::S16MonoUnsigned => (SampleWidth::Sixteen, Channels::Mono, Sign::Unsigned),
            PcmModeArg::S16MonoSigned => (SampleWidth::Sixteen, Channels::Mono, Sign::Signed),
            PcmModeArg::S16StereoUnsigned => (SampleWidth::Sixteen, Channels::Stereo, Sign::Unsigned),
            PcmModeArg::S16StereoSigned => (SampleWidth::Sixteen, Channels::Stereo, Sign::Signed),
        };
        PcmMode::new(width, channels, sign)
    }
}

impl fmt::Display for PcmModeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.to_possible_value().expect("PcmModeArg has no skipped variants");
        write!(f, "{}", value.get_name())
    }
}
