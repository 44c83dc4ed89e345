/// Plan Executor - Run and Suite Orchestration
///
/// **Responsibility:**
/// Drive every suite of a plan through its main container lifecycle and fold
/// test results into suite and run outcomes.
///
/// **Architecture:**
/// 1. Run: suites in file order, 1-based, one at a time (run_plan)
/// 2. Suite: create main → start → readiness gate → tests → teardown (run_suite)
/// 3. Test: delegated to the test runner (runner.rs)
///
/// Failures are folded into outcomes at the scope they happen in; a failing
/// suite never stops the next one from running.

use crate::capture;
use crate::context::RunContext;
use crate::engine::{ContainerGuard, ContainerSpec, EngineResult};
use crate::evaluator::{summarize, verdict_line};
use crate::readiness::await_ready;
use crate::runner::run_test;
use dit_common::artifacts;
use dit_common::plan::{PlanSpec, SuiteSpec};
use dit_common::types::{RunOutcome, SuiteOutcome, TestOutcome};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{info, instrument};

/// Execute every suite of the plan and report the aggregate verdict
pub async fn run_plan(ctx: &RunContext, plan: &PlanSpec) -> RunOutcome {
    let mut suites = Vec::with_capacity(plan.suites.len());

    for (idx, suite) in plan.suites.iter().enumerate() {
        suites.push(run_suite(ctx, suite, idx + 1).await);
    }

    let outcome = RunOutcome::from_suites(suites);
    let summary = summarize(&outcome);
    info!(
        suites_run = summary.suites_run,
        suites_failed = summary.suites_failed,
        tests_run = summary.tests_run,
        tests_failed = summary.tests_failed,
        "Run completed"
    );

    ctx.console(verdict_line(&outcome));
    outcome
}

/// Run one suite against its own main container.
///
/// Never fails. The main container, once created, is torn down (logs
/// captured, then force-removed) on every path, including a panic while the
/// tests run.
#[instrument(skip_all, fields(suite = index, name = %suite.name))]
pub async fn run_suite(ctx: &RunContext, suite: &SuiteSpec, index: usize) -> SuiteOutcome {
    ctx.console(&suite.name);
    ctx.log(&format!("Creating main container from image {}", suite.image));

    let spec = ContainerSpec::new(&suite.image).with_env(suite.env_pairs());
    let client = ctx.client();
    let handle = match client.create(&spec).await {
        Ok(handle) => handle,
        Err(e) => {
            ctx.console(&format!("    Unexpected error {}", e));
            return SuiteOutcome::failed(index, &suite.name, Vec::new(), e.to_string());
        }
    };
    let guard = ContainerGuard::new(client, handle);

    let mut tests = Vec::with_capacity(suite.tests.len());
    let exercised = AssertUnwindSafe(exercise(ctx, suite, index, &guard, &mut tests))
        .catch_unwind()
        .await;

    let outcome = match exercised {
        Ok(Ok(())) => SuiteOutcome::completed(index, &suite.name, tests),
        Ok(Err(e)) => {
            ctx.console(&format!("    Unexpected error {}", e));
            SuiteOutcome::failed(index, &suite.name, tests, e.to_string())
        }
        Err(panic) => {
            let reason = panic_message(&*panic);
            ctx.console(&format!("    Unexpected error {}", reason));
            SuiteOutcome::failed(index, &suite.name, tests, reason)
        }
    };

    let artifact = artifacts::suite_artifact(index, guard.handle().id());
    capture::teardown(ctx, guard, &artifact, "main").await;

    outcome
}

/// Start the main container, gate on readiness, then run the tests in order.
/// Test outcomes are pushed as they complete so a later failure keeps them.
async fn exercise(
    ctx: &RunContext,
    suite: &SuiteSpec,
    suite_index: usize,
    guard: &ContainerGuard,
    tests: &mut Vec<TestOutcome>,
) -> EngineResult<()> {
    let main = guard.handle();

    ctx.log(&format!("Starting main container {}", main));
    guard.client().start(main).await?;
    await_ready(ctx, guard.client(), main, suite).await?;

    for (idx, test) in suite.tests.iter().enumerate() {
        let test_index = idx + 1;
        ctx.log(&format!("test {}", test_index));
        tests.push(run_test(ctx, test, main, suite_index, test_index).await);
    }

    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic while running tests".to_string()
    }
}
