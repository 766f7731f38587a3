/*!
# Licwatch DevKit - Stubs and helpers for tests

Lets the monitor be exercised end to end without a real Elasticsearch:
- Stub cluster serving health and license endpoints over HTTP
- Builders for license documents
- Temp directory harness for cluster lists and house license files
*/

pub mod es_stub;
pub mod test_utils;

pub use es_stub::{LicenseBuilder, StubCluster};
pub use test_utils::TestHarness;
