pub mod frame_data;
pub mod source;
#[cfg(test)]
pub mod synthetic;
pub mod video;

pub use frame_data::{ChannelOrder, Frame};
pub use source::{FrameSource, SourceGuard, SourceInfo};
pub use video::VideoDecoder;
