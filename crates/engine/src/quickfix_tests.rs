use super::*;
use warden_core::test_support::issue_json;

struct FixedOracle(Result<bool, String>);

#[async_trait]
impl QuickFixOracle for FixedOracle {
    async fn decide_quick_fix_routing(&self, _issue: &IssueJson) -> Result<bool, String> {
        self.0.clone()
    }
}

#[test]
fn eligible_requires_first_iteration() {
    let issue = issue_json("design_draft");
    assert!(!eligible(2, None, &issue, "design_draft"));
}

#[test]
fn eligible_requires_no_workflow_override() {
    let issue = issue_json("design_draft");
    assert!(!eligible(1, Some("quick-fix"), &issue, "design_draft"));
}

#[test]
fn eligible_requires_default_workflow() {
    let mut issue = issue_json("design_draft");
    issue.workflow = "quick-fix".to_string();
    assert!(!eligible(1, None, &issue, "design_draft"));
}

#[test]
fn eligible_requires_phase_at_default_start() {
    let issue = issue_json("design_plan");
    assert!(!eligible(1, None, &issue, "design_draft"));
}

#[test]
fn eligible_true_when_all_conditions_met() {
    let issue = issue_json("design_draft");
    assert!(eligible(1, None, &issue, "design_draft"));
}

#[tokio::test]
async fn route_rewrites_workflow_and_phase_on_true() {
    let oracle = FixedOracle(Ok(true));
    let mut issue = issue_json("design_draft");

    let outcome =
        route(&oracle, 1, None, &mut issue, "design_draft", "quick-fix", "quick_fix").await;

    assert_eq!(
        outcome,
        RouteOutcome::Routed { workflow: "quick-fix".to_string(), phase: "quick_fix".to_string() }
    );
    assert_eq!(issue.workflow, "quick-fix");
    assert_eq!(issue.phase.as_deref(), Some("quick_fix"));
}

#[tokio::test]
async fn route_leaves_issue_untouched_on_false() {
    let oracle = FixedOracle(Ok(false));
    let mut issue = issue_json("design_draft");

    let outcome =
        route(&oracle, 1, None, &mut issue, "design_draft", "quick-fix", "quick_fix").await;

    assert_eq!(outcome, RouteOutcome::Declined);
    assert_eq!(issue.workflow, "default");
    assert_eq!(issue.phase.as_deref(), Some("design_draft"));
}

#[tokio::test]
async fn route_is_non_fatal_on_oracle_error() {
    let oracle = FixedOracle(Err("oracle unavailable".to_string()));
    let mut issue = issue_json("design_draft");

    let outcome =
        route(&oracle, 1, None, &mut issue, "design_draft", "quick-fix", "quick_fix").await;

    assert_eq!(outcome, RouteOutcome::OracleError("oracle unavailable".to_string()));
    assert_eq!(issue.workflow, "default");
}

#[tokio::test]
async fn route_skips_oracle_entirely_when_not_eligible() {
    let oracle = FixedOracle(Err("should not be called".to_string()));
    let mut issue = issue_json("design_plan");

    let outcome =
        route(&oracle, 1, None, &mut issue, "design_draft", "quick-fix", "quick_fix").await;

    assert_eq!(outcome, RouteOutcome::NotEligible);
}
