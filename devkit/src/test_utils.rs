/*!
Test harness for licwatch

Owns a temp directory holding the cluster list and the house license file,
and turns on logging for the test run.
*/

use crate::es_stub::LicenseBuilder;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use time::Duration;

pub struct TestHarness {
    dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        env_logger::try_init().ok();
        Ok(Self { dir: tempfile::tempdir()? })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Nested on purpose, the store has to create `config/` itself
    pub fn cluster_path(&self) -> PathBuf {
        self.dir.path().join("config").join("clusters.json")
    }

    pub fn license_path(&self) -> PathBuf {
        self.dir.path().join("license.json")
    }

    /// Writes a house license file valid for `valid_for` from now
    pub fn write_house_license(&self, uid: &str, valid_for: Duration) -> Result<PathBuf> {
        let path = self.license_path();
        std::fs::write(&path, serde_json::to_vec_pretty(&LicenseBuilder::file(uid, valid_for))?)?;
        log::info!("[HARNESS] house license '{}' written to {}", uid, path.display());
        Ok(path)
    }

    pub fn write_cluster_list(&self, clusters: &Value) -> Result<PathBuf> {
        let path = self.cluster_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_vec_pretty(clusters)?)?;
        Ok(path)
    }

    /// Current cluster list on disk, `Value::Null` when never written
    pub fn read_cluster_list(&self) -> Result<Value> {
        let path = self.cluster_path();
        if !path.exists() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&std::fs::read(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_list_round_trip() {
        let harness = TestHarness::new().unwrap();
        assert_eq!(harness.read_cluster_list().unwrap(), Value::Null);

        let list = serde_json::json!([{ "hostname": "es1.example.com", "usessl": true, "username": "elastic", "password": "changeme" }]);
        harness.write_cluster_list(&list).unwrap();
        assert_eq!(harness.read_cluster_list().unwrap(), list);
    }

    #[test]
    fn test_house_license_file_shape() {
        let harness = TestHarness::new().unwrap();
        let path = harness.write_house_license("house", Duration::days(365)).unwrap();
        let file: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(file["license"]["uid"], "house");
        assert!(file["license"]["expiry_date_in_millis"].as_i64().unwrap() > 0);
    }
}
