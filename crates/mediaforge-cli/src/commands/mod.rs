pub mod probe;
pub mod split;
pub mod transcode;
