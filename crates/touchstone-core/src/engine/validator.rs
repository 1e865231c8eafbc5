use crate::model::{FindingCategory, RawFinding};
use crate::page::PageHandle;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    ExpectedElementMissing,
    ExpectedElementStillVisible,
}

#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub selector: String,
}

impl Discrepancy {
    /// Warning-level finding carrying the originating state's
    /// description, ready to merge into that state's result.
    pub fn into_finding(self, state_description: &str) -> RawFinding {
        let issue_id = match self.kind {
            DiscrepancyKind::ExpectedElementMissing => "state-validation/expected-element-missing",
            DiscrepancyKind::ExpectedElementStillVisible => {
                "state-validation/expected-element-still-visible"
            }
        };
        RawFinding {
            issue_id: issue_id.to_string(),
            category: FindingCategory::Warning,
            touchpoint: "state-validation".to_string(),
            location: self.selector,
            snippet: String::new(),
            metadata: serde_json::json!({ "state": state_description }),
        }
    }
}

/// Compares declared expectations against the rendered condition.
///
/// Visibility is rendered-box based: an element that exists but is
/// CSS-hidden does not violate an "expected hidden" declaration.
pub async fn validate(
    page: &dyn PageHandle,
    expected_visible: &[String],
    expected_hidden: &[String],
) -> anyhow::Result<Vec<Discrepancy>> {
    let mut discrepancies = Vec::new();

    for selector in expected_visible {
        let visible = page.exists(selector).await? && page.is_visible(selector).await?;
        if !visible {
            discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::ExpectedElementMissing,
                selector: selector.clone(),
            });
        }
    }

    for selector in expected_hidden {
        if page.exists(selector).await? && page.is_visible(selector).await? {
            discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::ExpectedElementStillVisible,
                selector: selector.clone(),
            });
        }
    }

    Ok(discrepancies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::fake::{ElementSpec, FakePage, PageModel};

    #[tokio::test]
    async fn css_hidden_element_satisfies_expected_hidden() {
        let page = FakePage::new(
            PageModel::new("https://example.test").element(".banner", ElementSpec::hidden()),
        );
        let out = validate(&page, &[], &[".banner".to_string()]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn rendered_element_violates_expected_hidden() {
        let page = FakePage::new(
            PageModel::new("https://example.test").element(".banner", ElementSpec::visible()),
        );
        let out = validate(&page, &[], [".banner".to_string()].as_slice())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, DiscrepancyKind::ExpectedElementStillVisible);
        assert_eq!(out[0].selector, ".banner");
    }

    #[tokio::test]
    async fn missing_or_collapsed_element_violates_expected_visible() {
        let page = FakePage::new(
            PageModel::new("https://example.test").element(".modal", ElementSpec::hidden()),
        );
        let out = validate(
            &page,
            &[".modal".to_string(), ".gone".to_string()],
            &[],
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out
            .iter()
            .all(|d| d.kind == DiscrepancyKind::ExpectedElementMissing));
    }

    #[tokio::test]
    async fn discrepancy_becomes_warning_finding_with_state_context() {
        let d = Discrepancy {
            kind: DiscrepancyKind::ExpectedElementStillVisible,
            selector: ".banner".to_string(),
        };
        let f = d.into_finding("after cookie dismissal");
        assert_eq!(f.category, FindingCategory::Warning);
        assert_eq!(f.location, ".banner");
        assert_eq!(f.metadata["state"], "after cookie dismissal");
    }
}
