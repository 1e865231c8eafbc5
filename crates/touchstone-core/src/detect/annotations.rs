use super::{DetectOptions, DetectionSuite};
use crate::model::RawFinding;
use crate::page::fake::FakePage;
use crate::page::PageHandle;
use async_trait::async_trait;

/// Suite backed by the findings annotated on a replay/fake page model.
///
/// Emits exactly the findings of elements that are currently rendered,
/// so a dismissed banner's findings disappear with it. Used by tests
/// and `touchstone run` against snapshots; live deployments plug a real
/// rule engine into [`DetectionSuite`] instead.
#[derive(Clone)]
pub struct AnnotationSuite {
    page: FakePage,
}

impl AnnotationSuite {
    pub fn new(page: FakePage) -> Self {
        AnnotationSuite { page }
    }
}

#[async_trait]
impl DetectionSuite for AnnotationSuite {
    async fn detect(
        &self,
        _page: &dyn PageHandle,
        _options: &DetectOptions,
    ) -> anyhow::Result<Vec<RawFinding>> {
        let elapsed = self.page.elapsed_since_load();
        let model = self.page.model();
        let m = model.lock().unwrap();
        Ok(m.visible_findings(elapsed))
    }

    fn suite_name(&self) -> &'static str {
        "annotations"
    }
}
