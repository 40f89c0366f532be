//! Proxy image derivation.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shotvault_common::{Error, Result};
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, OIIOTOOL};

/// Supported proxy image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyFormat {
    Jpeg,
    Png,
}

impl ProxyFormat {
    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            ProxyFormat::Jpeg => "jpg",
            ProxyFormat::Png => "png",
        }
    }
}

impl FromStr for ProxyFormat {
    type Err = Error;

    /// Accepts `jpeg` and `png`, case-insensitively. Anything else is
    /// [`Error::UnsupportedFormat`].
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" => Ok(ProxyFormat::Jpeg),
            "png" => Ok(ProxyFormat::Png),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ProxyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyFormat::Jpeg => f.write_str("jpeg"),
            ProxyFormat::Png => f.write_str("png"),
        }
    }
}

/// Converts one plate frame into a proxy image.
#[async_trait]
pub trait ProxyDeriver: Send + Sync {
    async fn derive(
        &self,
        input: &Path,
        output: &Path,
        format: ProxyFormat,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// [`ProxyDeriver`] backed by OpenImageIO's `oiiotool`.
#[derive(Debug, Clone)]
pub struct OiioProxyDeriver {
    registry: ToolRegistry,
}

impl OiioProxyDeriver {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ProxyDeriver for OiioProxyDeriver {
    async fn derive(
        &self,
        input: &Path,
        output: &Path,
        format: ProxyFormat,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let tool = self.registry.require(OIIOTOOL)?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            %format,
            "Generating proxy"
        );

        ToolCommand::new(tool.path.clone())
            .arg(input.to_string_lossy())
            .arg("-o")
            .arg(output.to_string_lossy())
            .timeout(tool.timeout)
            .cancel_on(cancel.clone())
            .execute()
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("JPEG".parse::<ProxyFormat>().unwrap(), ProxyFormat::Jpeg);
        assert_eq!("png".parse::<ProxyFormat>().unwrap(), ProxyFormat::Png);
        assert_eq!(ProxyFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn other_formats_are_unsupported() {
        for fmt in ["tiff", "jpg", "exr", ""] {
            let err = fmt.parse::<ProxyFormat>().unwrap_err();
            assert!(matches!(err, Error::UnsupportedFormat(_)), "{fmt}");
        }
    }

    #[tokio::test]
    async fn missing_oiiotool_is_a_tool_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let deriver = OiioProxyDeriver::new(ToolRegistry::default());
        let err = deriver
            .derive(
                &tmp.path().join("in.exr"),
                &tmp.path().join("out.jpg"),
                ProxyFormat::Jpeg,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool { .. }));
    }
}
