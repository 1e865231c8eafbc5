/// Page snapshot matching the sample config written by `init`: a
/// checkout page with an annotated cookie banner, a dismiss button, and
/// a help dialog behind a click.
pub const SAMPLE_SNAPSHOT: &str = r##"{
  "url": "https://example.test/checkout",
  "elements": [
    {
      "selector": "#cookie-banner",
      "findings": [
        {
          "issue_id": "banner/low-contrast",
          "category": "violation",
          "touchpoint": "color",
          "location": "#cookie-banner .legal"
        },
        {
          "issue_id": "banner/no-label",
          "category": "violation",
          "touchpoint": "forms",
          "location": "#cookie-banner button"
        }
      ]
    },
    {
      "selector": "#cookie-accept",
      "on_click": [
        { "effect": "hide", "target": "#cookie-banner" }
      ]
    },
    {
      "selector": "main",
      "findings": [
        {
          "issue_id": "img/missing-alt",
          "category": "violation",
          "touchpoint": "images",
          "location": "main img#product"
        },
        {
          "issue_id": "lang/present",
          "category": "pass",
          "touchpoint": "language",
          "location": "html"
        }
      ]
    },
    {
      "selector": "#open-help",
      "on_click": [
        { "effect": "show", "target": "#help-dialog" }
      ]
    },
    {
      "selector": "#help-dialog",
      "visible": false,
      "findings": [
        {
          "issue_id": "dialog/no-accessible-name",
          "category": "warning",
          "touchpoint": "dialogs",
          "location": "#help-dialog"
        }
      ]
    }
  ]
}
"##;
