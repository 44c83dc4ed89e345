// Test runner: one test container against a suite's main container
use crate::capture;
use crate::context::RunContext;
use crate::engine::{ContainerGuard, ContainerHandle, ContainerSpec, EngineResult};
use crate::evaluator::classify_wait;
use dit_common::artifacts;
use dit_common::config::MAIN_ALIAS;
use dit_common::plan::TestSpec;
use dit_common::types::{TestExit, TestOutcome};
use tracing::instrument;

/// Run one test to completion and classify it.
///
/// Never fails: creation, start and wait errors become a failed outcome, and
/// the test container is torn down before this returns.
#[instrument(skip_all, fields(suite = suite_index, test = test_index, image = %test.image))]
pub async fn run_test(
    ctx: &RunContext,
    test: &TestSpec,
    main: &ContainerHandle,
    suite_index: usize,
    test_index: usize,
) -> TestOutcome {
    ctx.console(&format!("    {}", test.ensures_that));
    ctx.log(&format!(
        "Creating test container from image {} with command {}",
        test.image,
        test.command.as_deref().unwrap_or("<image default>")
    ));

    let spec = ContainerSpec::new(&test.image)
        .with_cmd(test.argv())
        .linked_to(main, MAIN_ALIAS);

    let client = ctx.client();
    let handle = match client.create(&spec).await {
        Ok(handle) => handle,
        Err(e) => {
            ctx.console(&format!("    Unexpected error {}", e));
            return report(ctx, TestOutcome::new(test_index, TestExit::Errored));
        }
    };
    let guard = ContainerGuard::new(client, handle);

    let timeout = test.timeout().unwrap_or_else(|| ctx.default_timeout());
    let result = execute(ctx, &guard, timeout).await;
    if let Err(e) = &result {
        ctx.log(&e.to_string());
    }
    let outcome = report(ctx, TestOutcome::new(test_index, classify_wait(&result)));

    let artifact = artifacts::test_artifact(suite_index, test_index, guard.handle().id());
    capture::teardown(ctx, guard, &artifact, "test").await;

    outcome
}

async fn execute(
    ctx: &RunContext,
    guard: &ContainerGuard,
    timeout: std::time::Duration,
) -> EngineResult<i64> {
    let handle = guard.handle();

    ctx.log(&format!("Starting test container {}", handle));
    guard.client().start(handle).await?;

    ctx.log(&format!(
        "Waiting for test container {} (timeout {}s)",
        handle,
        timeout.as_secs()
    ));
    guard.client().wait(handle, timeout).await
}

fn report(ctx: &RunContext, outcome: TestOutcome) -> TestOutcome {
    if outcome.passed {
        ctx.console("    [Pass]");
    } else {
        ctx.console("    [Fail]");
        ctx.log(&format!("Exit code {}", outcome.exit_code()));
    }
    outcome
}
