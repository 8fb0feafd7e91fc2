//! BDD scenarios for the environment lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Build an environment and connect every host"
)]
fn scenario_eager_build(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Defer connections in lazy mode"
)]
fn scenario_lazy_build(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Reject a document without domains"
)]
fn scenario_missing_domains(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Reject an unsupported operating system before connecting"
)]
fn scenario_unsupported_os(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Stop role setup at the first failing utility"
)]
fn scenario_setup_fail_fast(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Tear down every utility and report all failures"
)]
fn scenario_teardown_aggregates(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Collect artifacts from hosts that declare them"
)]
fn scenario_collect_artifacts(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}
