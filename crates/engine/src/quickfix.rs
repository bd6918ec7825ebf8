// SPDX-License-Identifier: MIT

//! Quick-Fix Router: on iteration 1 of a fresh issue, optionally redirects
//! to the `"quick-fix"` workflow based on an external oracle. Errors from
//! the oracle are non-fatal -- the run simply proceeds on the default
//! workflow.

use async_trait::async_trait;
use warden_core::IssueJson;

/// The external decision oracle this router consults. Production wires this
/// to whatever heuristic/LLM call decides routing; tests supply a fixed
/// answer.
#[async_trait]
pub trait QuickFixOracle: Send + Sync {
    async fn decide_quick_fix_routing(&self, issue: &IssueJson) -> Result<bool, String>;
}

/// Whether the router is even eligible to run this iteration: only on
/// iteration 1, when no workflow override is passed,
/// `issueJson.workflow == "default"`, and `issueJson.phase` equals the
/// default workflow's start.
pub fn eligible(
    iteration: u32,
    workflow_override: Option<&str>,
    issue: &IssueJson,
    default_workflow_start: &str,
) -> bool {
    iteration == 1
        && workflow_override.is_none()
        && issue.workflow == "default"
        && issue.phase.as_deref() == Some(default_workflow_start)
}

/// Outcome of consulting the router: either the issue is rewritten onto the
/// quick-fix workflow, or it's left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    NotEligible,
    Declined,
    Routed { workflow: String, phase: String },
    OracleError(String),
}

/// Consult the oracle and, on `route=true`, rewrite `issue.workflow`/
/// `issue.phase` in place. The caller is responsible for atomically
/// persisting `issue` afterward and logging `[QUICK_FIX]`.
pub async fn route(
    oracle: &dyn QuickFixOracle,
    iteration: u32,
    workflow_override: Option<&str>,
    issue: &mut IssueJson,
    default_workflow_start: &str,
    quick_fix_workflow: &str,
    quick_fix_start: &str,
) -> RouteOutcome {
    if !eligible(iteration, workflow_override, issue, default_workflow_start) {
        return RouteOutcome::NotEligible;
    }

    match oracle.decide_quick_fix_routing(issue).await {
        Ok(true) => {
            issue.workflow = quick_fix_workflow.to_string();
            issue.phase = Some(quick_fix_start.to_string());
            RouteOutcome::Routed {
                workflow: quick_fix_workflow.to_string(),
                phase: quick_fix_start.to_string(),
            }
        }
        Ok(false) => RouteOutcome::Declined,
        Err(e) => RouteOutcome::OracleError(e),
    }
}

#[cfg(test)]
#[path = "quickfix_tests.rs"]
mod tests;
