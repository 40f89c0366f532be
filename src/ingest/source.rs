//! Locating the vendor delivery folders to ingest.
//!
//! Deliveries land at `{source}/{project}/vault/to_mvl/{vendor}/{YYYYMMDD}`.
//! Every missing directory is reported; nothing falls back to a guessed root.

use chrono::NaiveDate;
use shotvault_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Where to look for a delivery.
#[derive(Debug, Clone, Default)]
pub struct SourceRequest {
    pub root: Option<PathBuf>,
    pub project: Option<String>,
    /// Delivery date as `YYYYMMDD`.
    pub input_date: Option<String>,
    pub vendor: Option<String>,
}

/// Validate a `YYYYMMDD` delivery date.
pub fn parse_input_date(date: &str) -> Result<NaiveDate> {
    if date.len() != 8 {
        return Err(Error::configuration(format!(
            "input date '{date}' must be YYYYMMDD"
        )));
    }
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .map_err(|e| Error::configuration(format!("input date '{date}' is invalid: {e}")))
}

fn require_dir(path: &Path, what: &str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "{what} does not exist: {}",
            path.display()
        )))
    }
}

/// Resolve the directories whose trees should be walked.
///
/// Without an input date the source root itself is the tree. With one, the
/// vendor's dated folder is used, or every vendor's when no vendor is given.
pub fn locate_sources(request: &SourceRequest) -> Result<Vec<PathBuf>> {
    let root = request
        .root
        .as_deref()
        .ok_or_else(|| Error::configuration("source root is not set"))?;
    require_dir(root, "source root")?;

    let Some(date) = request.input_date.as_deref() else {
        return Ok(vec![root.to_path_buf()]);
    };
    parse_input_date(date)?;

    let project = request
        .project
        .as_deref()
        .ok_or_else(|| Error::configuration("project is required with an input date"))?;

    let to_mvl = root.join(project).join("vault").join("to_mvl");
    require_dir(&to_mvl, "vault folder")?;

    if let Some(vendor) = request.vendor.as_deref() {
        let dir = to_mvl.join(vendor).join(date);
        require_dir(&dir, "delivery folder")?;
        return Ok(vec![dir]);
    }

    let entries = std::fs::read_dir(&to_mvl).map_err(|source| Error::Discovery {
        path: to_mvl.clone(),
        source,
    })?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path().join(date))
        .filter(|p| p.is_dir())
        .collect();
    found.sort();

    if found.is_empty() {
        return Err(Error::configuration(format!(
            "no vendor delivery for {date} under {}",
            to_mvl.display()
        )));
    }

    tracing::info!(count = found.len(), date, "Located vendor deliveries");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn request(root: &Path) -> SourceRequest {
        SourceRequest {
            root: Some(root.to_path_buf()),
            project: Some("GEN63".to_string()),
            input_date: Some("20240315".to_string()),
            vendor: None,
        }
    }

    #[test]
    fn without_date_uses_root() {
        let tmp = TempDir::new().unwrap();
        let mut req = request(tmp.path());
        req.input_date = None;
        assert_eq!(locate_sources(&req).unwrap(), vec![tmp.path().to_path_buf()]);
    }

    #[test]
    fn vendor_folder() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("GEN63/vault/to_mvl/acme/20240315");
        fs::create_dir_all(&dir).unwrap();

        let mut req = request(tmp.path());
        req.vendor = Some("acme".to_string());
        assert_eq!(locate_sources(&req).unwrap(), vec![dir]);
    }

    #[test]
    fn all_vendors_with_date() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("GEN63/vault/to_mvl");
        fs::create_dir_all(base.join("b_vendor/20240315")).unwrap();
        fs::create_dir_all(base.join("a_vendor/20240315")).unwrap();
        fs::create_dir_all(base.join("c_vendor/20240101")).unwrap();

        let found = locate_sources(&request(tmp.path())).unwrap();
        assert_eq!(
            found,
            vec![base.join("a_vendor/20240315"), base.join("b_vendor/20240315")]
        );
    }

    #[test]
    fn missing_delivery_is_a_configuration_error() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("GEN63/vault/to_mvl/acme")).unwrap();
        let mut req = request(tmp.path());
        req.vendor = Some("acme".to_string());
        assert_matches!(locate_sources(&req), Err(Error::Configuration(_)));

        req.vendor = None;
        assert_matches!(locate_sources(&req), Err(Error::Configuration(_)));
    }

    #[test]
    fn missing_root_is_not_guessed() {
        let tmp = TempDir::new().unwrap();
        let req = SourceRequest {
            root: Some(tmp.path().join("nope")),
            ..Default::default()
        };
        assert_matches!(locate_sources(&req), Err(Error::Configuration(_)));
        assert_matches!(locate_sources(&SourceRequest::default()), Err(Error::Configuration(_)));
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert!(parse_input_date("20240315").is_ok());
        assert!(parse_input_date("20241345").is_err());
        assert!(parse_input_date("2024-03-15").is_err());
        assert!(parse_input_date("240315").is_err());
    }
}
