//! Endpoint classification and transfer direction selection.

use std::fmt;

use url::Url;

/// Prefix marking an object-store endpoint.
pub const OBJECT_STORE_PREFIX: &str = "gs://";

/// One side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Bucket object, kept as the full `gs://bucket/key` URI.
    ObjectStore(String),
    /// Absolute path inside the distributed filesystem.
    DistributedFs(String),
    /// HTTP(S) resource.
    Web(Url),
}

impl Endpoint {
    /// Classifies a command-line location.
    ///
    /// `gs://` prefixes are object-store endpoints, `http(s)://` URLs are web
    /// endpoints, and everything else is a distributed filesystem path.
    /// `hdfs://host:port/path` is reduced to its path.
    pub fn parse(location: &str) -> Self {
        if location.starts_with(OBJECT_STORE_PREFIX) {
            return Self::ObjectStore(location.to_string());
        }
        if let Ok(url) = Url::parse(location) {
            match url.scheme() {
                "http" | "https" => return Self::Web(url),
                "hdfs" => return Self::DistributedFs(url.path().to_string()),
                _ => {}
            }
        }
        Self::DistributedFs(location.to_string())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectStore(uri) => f.write_str(uri),
            Self::DistributedFs(path) => f.write_str(path),
            Self::Web(url) => f.write_str(url.as_str()),
        }
    }
}

/// Descriptor combination no transfer exists for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported transfer {src} -> {dst}: expected gs -> fs, fs -> gs or web -> fs")]
pub struct InputError {
    pub src: String,
    pub dst: String,
}

/// Source and destination of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub source: Endpoint,
    pub destination: Endpoint,
}

/// A supported direction, borrowing its locations from the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection<'a> {
    ObjectToFs { uri: &'a str, path: &'a str },
    FsToObject { path: &'a str, uri: &'a str },
    WebToFs { url: &'a Url, path: &'a str },
}

impl TransferDescriptor {
    pub fn new(source: Endpoint, destination: Endpoint) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Classifies both command-line locations.
    pub fn parse(source: &str, destination: &str) -> Self {
        Self::new(Endpoint::parse(source), Endpoint::parse(destination))
    }

    /// Selects the transfer to run, or rejects the combination.
    pub fn direction(&self) -> Result<TransferDirection<'_>, InputError> {
        match (&self.source, &self.destination) {
            (Endpoint::ObjectStore(uri), Endpoint::DistributedFs(path)) => {
                Ok(TransferDirection::ObjectToFs { uri, path })
            }
            (Endpoint::DistributedFs(path), Endpoint::ObjectStore(uri)) => {
                Ok(TransferDirection::FsToObject { path, uri })
            }
            (Endpoint::Web(url), Endpoint::DistributedFs(path)) => {
                Ok(TransferDirection::WebToFs { url, path })
            }
            (src, dst) => Err(InputError {
                src: src.to_string(),
                dst: dst.to_string(),
            }),
        }
    }
}
