use clap::Parser;

use playout::config::POSITION_PERIOD;
use playout::format::SampleFormat;

#[derive(Parser, Debug)]
#[command(name = "playoutd", version)]
pub struct Args {
    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Output device: an index from --list-devices or a name substring
    #[arg(long)]
    pub device: Option<String>,

    /// Sample format to decode into and open the device with (i16, i32, f32)
    #[arg(long, default_value = "f32")]
    pub sample_format: SampleFormat,

    /// Minimum played time between TIME reports, in milliseconds
    #[arg(long, default_value_t = POSITION_PERIOD.as_millis() as u64)]
    pub position_period_ms: u64,
}
