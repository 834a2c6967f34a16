/*!
    Sink configuration.
*/

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hwdec_types::{Error, FlushMode, Result};

/**
    Configuration for a frame sink.

    With an output path set, decoded frames are dumped to that file. With
    checksumming enabled, they are folded into an MD5 digest, optionally
    compared against a reference digest at the end of the stream.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// File to dump raw frames into.
    pub output_path: Option<PathBuf>,
    /// Compute an MD5 digest over all output frames.
    pub checksum: bool,
    /// File whose first line holds the expected hex digest.
    pub checksum_reference: Option<PathBuf>,
}

impl SinkConfig {
    /**
        Create a sink configuration that neither dumps nor checksums.
    */
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Create a sink configuration that dumps frames to `path`.
    */
    pub fn dump_to(path: impl AsRef<Path>) -> Self {
        Self::new().with_output_path(path)
    }

    /**
        Parse a config from JSON. Missing fields take their default values.
    */
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::invalid_parameter(format!("sink config: {e}")))
    }

    pub fn with_output_path(mut self, path: impl AsRef<Path>) -> Self {
        self.output_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /**
        Verify the final digest against the reference file at `path`.

        Implies checksumming.
    */
    pub fn with_checksum_reference(mut self, path: impl AsRef<Path>) -> Self {
        self.checksum = true;
        self.checksum_reference = Some(path.as_ref().to_path_buf());
        self
    }

    /**
        What the sink does with frames drained on reconfiguration.
    */
    pub const fn flush_mode(&self) -> FlushMode {
        FlushMode::select(self.output_path.is_some(), self.checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumping_takes_precedence() {
        let config = SinkConfig::dump_to("out.yuv").with_checksum(true);
        assert_eq!(config.flush_mode(), FlushMode::DumpToFile);
        assert_eq!(
            SinkConfig::new().with_checksum(true).flush_mode(),
            FlushMode::Checksum
        );
        assert_eq!(SinkConfig::new().flush_mode(), FlushMode::None);
    }

    #[test]
    fn reference_enables_checksum() {
        let config = SinkConfig::new().with_checksum_reference("ref.md5");
        assert!(config.checksum);
        assert_eq!(config.flush_mode(), FlushMode::Checksum);
    }

    #[test]
    fn from_json_fills_defaults() {
        let config = SinkConfig::from_json(r#"{ "output_path": "frames.yuv" }"#).unwrap();
        assert_eq!(config.output_path, Some(PathBuf::from("frames.yuv")));
        assert!(!config.checksum);
        assert!(config.checksum_reference.is_none());

        assert!(SinkConfig::from_json("{ \"checksum\": 3 }").is_err());
    }
}
