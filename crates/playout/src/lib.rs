pub mod callback;
pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod format;
pub mod frame;
pub mod output;
pub mod playback;
pub mod player;
pub mod position;
pub mod ring_buffer;
pub mod stream;
pub mod system;

#[cfg(test)]
mod test_support;
