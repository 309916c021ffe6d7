pub mod capture;
pub mod normalize;
pub mod sampler;

pub use capture::{OpenCvVideo, VideoMetadata, VideoSource};
pub use normalize::{ContainerNormalizer, FfmpegRemuxer, NormalizedVideo, Remuxer};
pub use sampler::sample;
