use crate::model::RawFinding;
use crate::page::PageHandle;
use async_trait::async_trait;

pub mod annotations;

/// Passthrough options for the external rule engine.
#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    pub compliance_level: Option<String>,
    pub config: serde_json::Value,
}

/// Boundary to the external detection rule engine.
///
/// The core treats it as a pure function of the current page condition
/// and makes no assumption about how many rules exist or how they
/// detect issues.
#[async_trait]
pub trait DetectionSuite: Send + Sync {
    async fn detect(
        &self,
        page: &dyn PageHandle,
        options: &DetectOptions,
    ) -> anyhow::Result<Vec<RawFinding>>;

    fn suite_name(&self) -> &'static str;
}
