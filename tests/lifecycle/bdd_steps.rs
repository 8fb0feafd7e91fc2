//! BDD step definitions for the environment lifecycle.

use std::fs::File;
use std::rc::Rc;

use base64::{Engine as _, engine::general_purpose};
use flate2::read::GzDecoder;
use multihost::test_support::RecordingUtility;
use multihost::{FixtureContext, LifecycleError, Role, RoleBase};
use rstest_bdd_macros::{given, then, when};
use serde_json::{Value, json};

use super::test_helpers::{FixtureError, LifecycleContext, Outcome, split_list, tarball};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[derive(Debug)]
struct ClientRole {
    base: RoleBase,
}

impl Role for ClientRole {
    fn base(&self) -> &RoleBase {
        &self.base
    }
}

fn set_field(document: &mut Value, pointer: &str, value: Value) -> Result<(), StepError> {
    let target = document
        .pointer_mut(pointer)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| StepError::Assertion(format!("document has no object at {pointer}")))?;
    let (key, field) = value
        .as_object()
        .and_then(|map| map.iter().next())
        .ok_or_else(|| StepError::Assertion(String::from("field update must be an object")))?;
    target.insert(key.clone(), field.clone());
    Ok(())
}

fn outcome(ctx: &LifecycleContext) -> Result<&Outcome, StepError> {
    ctx.outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

fn client_role(ctx: &LifecycleContext) -> Result<ClientRole, StepError> {
    let config = ctx
        .build()
        .map_err(|err| StepError::Assertion(format!("configuration should build: {err}")))?;
    let host = config
        .domain("ldap")
        .and_then(|domain| domain.hosts_by_role("client").pop())
        .ok_or_else(|| StepError::Assertion(String::from("missing client host")))?;

    let mut base = RoleBase::new(Rc::new(FixtureContext::new("lifecycle")), "client", host);
    for name in &ctx.utilities {
        let mut utility = RecordingUtility::new(base.host(), name, &ctx.calls);
        if ctx.failing_setup.contains(name) {
            utility = utility.failing_setup();
        }
        if ctx.failing_teardown.contains(name) {
            utility = utility.failing_teardown();
        }
        base.register(name.as_str(), utility);
    }
    Ok(ClientRole { base })
}

#[given("a lab with an ldap and an ad domain")]
fn lab(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context
}

#[given("a document without domains")]
fn document_without_domains(mut lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.document = json!({});
    lifecycle_context
}

#[given("lazy connections are enabled")]
fn lazy_connections(mut lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.lazy = true;
    lifecycle_context
}

#[given("the ad host declares os \"{os}\"")]
fn ad_host_os(
    mut lifecycle_context: LifecycleContext,
    os: String,
) -> Result<LifecycleContext, StepError> {
    set_field(
        &mut lifecycle_context.document,
        "/domains/1/hosts/0",
        json!({ "os": os }),
    )?;
    Ok(lifecycle_context)
}

#[given("the client role carries utilities \"{names}\"")]
fn client_utilities(mut lifecycle_context: LifecycleContext, names: String) -> LifecycleContext {
    lifecycle_context.utilities = split_list(&names);
    lifecycle_context
}

#[given("utilities \"{names}\" fail setup")]
fn failing_setup(mut lifecycle_context: LifecycleContext, names: String) -> LifecycleContext {
    lifecycle_context.failing_setup = split_list(&names);
    lifecycle_context
}

#[given("utilities \"{names}\" fail teardown")]
fn failing_teardown(mut lifecycle_context: LifecycleContext, names: String) -> LifecycleContext {
    lifecycle_context.failing_teardown = split_list(&names);
    lifecycle_context
}

#[given("the ldap server declares artifacts \"{pattern}\"")]
fn ldap_artifacts(
    mut lifecycle_context: LifecycleContext,
    pattern: String,
) -> Result<LifecycleContext, StepError> {
    set_field(
        &mut lifecycle_context.document,
        "/domains/0/hosts/0",
        json!({ "artifacts": [pattern] }),
    )?;
    Ok(lifecycle_context)
}

#[given("the archive command returns a tarball containing \"{file}\"")]
fn archive_returns_tarball(
    mut lifecycle_context: LifecycleContext,
    file: String,
) -> Result<LifecycleContext, StepError> {
    lifecycle_context.archive = Some(tarball(&file, b"collected by multihost\n")?);
    Ok(lifecycle_context)
}

#[when("I build the configuration")]
fn build_configuration(mut lifecycle_context: LifecycleContext) -> LifecycleContext {
    let outcome = match lifecycle_context.build() {
        Ok(config) => Outcome {
            domains: config.domains().len(),
            ..Outcome::default()
        },
        Err(err) => Outcome {
            config_error: Some(err.to_string()),
            ..Outcome::default()
        },
    };
    lifecycle_context.outcome = Some(outcome);
    lifecycle_context
}

#[when("I set up the client role")]
fn set_up_client_role(
    mut lifecycle_context: LifecycleContext,
) -> Result<LifecycleContext, StepError> {
    let role = client_role(&lifecycle_context)?;
    let setup_error = match role.setup() {
        Ok(()) => None,
        Err(LifecycleError::Setup { utility, .. }) => Some(utility),
        Err(err) => return Err(StepError::Assertion(format!("unexpected error: {err}"))),
    };
    lifecycle_context.outcome = Some(Outcome {
        setup_error,
        ..Outcome::default()
    });
    Ok(lifecycle_context)
}

#[when("I tear down the client role")]
fn tear_down_client_role(
    mut lifecycle_context: LifecycleContext,
) -> Result<LifecycleContext, StepError> {
    let role = client_role(&lifecycle_context)?;
    let teardown_failures = match role.teardown() {
        Ok(()) => Vec::new(),
        Err(LifecycleError::Teardown(errors)) => errors
            .into_failures()
            .into_iter()
            .map(|failure| failure.utility)
            .collect(),
        Err(err) => return Err(StepError::Assertion(format!("unexpected error: {err}"))),
    };
    lifecycle_context.outcome = Some(Outcome {
        teardown_failures,
        ..Outcome::default()
    });
    Ok(lifecycle_context)
}

#[when("I collect artifacts")]
fn collect_artifacts(
    mut lifecycle_context: LifecycleContext,
) -> Result<LifecycleContext, StepError> {
    let config = lifecycle_context
        .build()
        .map_err(|err| StepError::Assertion(format!("configuration should build: {err}")))?;
    if let Some(ref archive) = lifecycle_context.archive {
        lifecycle_context.runner.push_output(
            Some(0),
            general_purpose::STANDARD.encode(archive),
            "",
        );
    }

    let mut collected = Vec::new();
    for domain in config.domains() {
        for host in domain.hosts() {
            let path = host
                .collect_artifacts(&lifecycle_context.artifacts_dir)
                .map_err(|err| StepError::Assertion(format!("collection failed: {err}")))?;
            collected.extend(path);
        }
    }

    lifecycle_context.outcome = Some(Outcome {
        collected,
        ..Outcome::default()
    });
    Ok(lifecycle_context)
}

#[then("the configuration has \"{count}\" domains")]
fn configuration_has_domains(
    lifecycle_context: &LifecycleContext,
    count: usize,
) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    if outcome.domains == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} domains, got {} (error: {:?})",
            outcome.domains, outcome.config_error
        )))
    }
}

#[then("every host was probed once")]
fn every_host_probed(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let commands: Vec<String> = lifecycle_context
        .runner
        .invocations()
        .iter()
        .filter_map(|invocation| invocation.remote_command())
        .collect();
    if commands == ["exit 0", "exit 0", "exit 0"] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected one probe per host, got {commands:?}"
        )))
    }
}

#[then("no host was contacted")]
fn no_host_contacted(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let invocations = lifecycle_context.runner.invocations();
    if invocations.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no ssh invocations, got {invocations:?}"
        )))
    }
}

#[then("the configuration error mentions \"{text}\"")]
fn configuration_error_mentions(
    lifecycle_context: &LifecycleContext,
    text: String,
) -> Result<(), StepError> {
    match outcome(lifecycle_context)?.config_error {
        Some(ref message) if message.contains(&text) => Ok(()),
        ref other => Err(StepError::Assertion(format!(
            "expected configuration error mentioning {text:?}, got {other:?}"
        ))),
    }
}

#[then("the setup failure names \"{name}\"")]
fn setup_failure_names(lifecycle_context: &LifecycleContext, name: String) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    if outcome.setup_error.as_deref() == Some(name.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected setup of {name} to fail, got {:?}",
            outcome.setup_error
        )))
    }
}

#[then("the teardown failures are \"{names}\"")]
fn teardown_failures_are(
    lifecycle_context: &LifecycleContext,
    names: String,
) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    let expected = split_list(&names);
    if outcome.teardown_failures == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected teardown failures {expected:?}, got {:?}",
            outcome.teardown_failures
        )))
    }
}

#[then("the utility calls are \"{calls}\"")]
fn utility_calls_are(lifecycle_context: &LifecycleContext, calls: String) -> Result<(), StepError> {
    let expected = split_list(&calls);
    let actual = lifecycle_context.calls.borrow().clone();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected utility calls {expected:?}, got {actual:?}"
        )))
    }
}

#[then("\"{count}\" archive was collected")]
fn archives_collected(lifecycle_context: &LifecycleContext, count: usize) -> Result<(), StepError> {
    let collected = &outcome(lifecycle_context)?.collected;
    if collected.len() == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} archive(s), got {collected:?}"
        )))
    }
}

#[then("the archive \"{file}\" contains \"{entry}\"")]
fn archive_contains(
    lifecycle_context: &LifecycleContext,
    file: String,
    entry: String,
) -> Result<(), StepError> {
    let path = lifecycle_context.artifacts_dir.join(&file);
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(&path)?));
    let mut names = Vec::new();
    for item in archive.entries()? {
        let archived = item?;
        names.push(archived.path()?.to_string_lossy().into_owned());
    }

    if names.contains(&entry) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {path} to contain {entry}, found {names:?}"
        )))
    }
}
