mod client;
pub mod integrity;

pub use client::{Artifact, Downloader, FetchedBody, FileSource, HttpFileSource};
