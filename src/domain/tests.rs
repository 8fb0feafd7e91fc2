//! Tests for domain construction and role resolution.

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::config::ConfigError;
use crate::host::GENERIC_HOST_TYPE;
use crate::role::PlainRole;
use crate::test_support::ScriptedRunner;

#[derive(Debug)]
struct ServerHost;

impl HostType for ServerHost {
    fn name(&self) -> &str {
        "server"
    }
}

#[derive(Debug)]
struct LdapProvider;

impl DomainProvider for LdapProvider {
    fn host_type(&self, role: &str) -> Option<Box<dyn HostType>> {
        match role {
            "ldap" => Some(Box::new(ServerHost)),
            _ => None,
        }
    }

    fn role_type(&self, role: &str) -> Option<RoleConstructor> {
        match role {
            "client" | "ldap" => Some(PlainRole::construct),
            _ => None,
        }
    }
}

#[fixture]
fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
}

fn context(runner: &ScriptedRunner) -> DomainContext {
    DomainContext::new(
        "",
        tracing::Span::none(),
        true,
        Rc::new(runner.session_factory()),
    )
}

fn host(hostname: &str, role: &str) -> Value {
    json!({
        "hostname": hostname,
        "role": role,
        "username": "root",
        "password": "Secret123",
    })
}

fn ldap_domain(runner: &ScriptedRunner) -> Domain {
    let document = json!({
        "type": "ldap",
        "hosts": [
            host("client2.test", "client"),
            host("master.ldap.test", "ldap"),
            host("client1.test", "client"),
            host("nfs.test", "nfs"),
        ],
    });
    Domain::new(&context(runner), &document, Box::new(LdapProvider)).expect("domain should build")
}

#[rstest]
#[case::missing_type(json!({ "hosts": [] }), "type")]
#[case::blank_type(json!({ "type": " ", "hosts": [] }), "type")]
#[case::missing_hosts(json!({ "type": "ldap" }), "hosts")]
fn missing_domain_field_is_rejected(
    runner: ScriptedRunner,
    #[case] document: Value,
    #[case] field: &str,
) {
    let err = Domain::new(&context(&runner), &document, Box::new(LdapProvider))
        .expect_err("domain should not build");

    assert_eq!(err, ConfigError::missing("domain", field));
}

#[rstest]
fn empty_host_list_is_allowed(runner: ScriptedRunner) {
    let document = json!({ "type": "ldap", "hosts": [] });

    let domain =
        Domain::new(&context(&runner), &document, Box::new(LdapProvider)).expect("domain builds");

    assert!(domain.hosts().is_empty());
    assert!(domain.roles().is_empty());
}

#[rstest]
fn host_without_role_is_rejected_before_host_type_lookup(runner: ScriptedRunner) {
    let document = json!({
        "type": "ldap",
        "hosts": [{ "hostname": "x.test", "username": "root", "password": "pw" }],
    });

    let err = Domain::new(&context(&runner), &document, Box::new(LdapProvider))
        .expect_err("role is required");

    assert_eq!(err, ConfigError::missing("host", "role"));
}

#[rstest]
fn hosts_carry_domain_type_and_mapped_host_types(runner: ScriptedRunner) {
    let domain = ldap_domain(&runner);

    assert_eq!(domain.domain_type(), "ldap");
    let kinds: Vec<(&str, &str)> = domain
        .hosts()
        .iter()
        .map(|host| (host.hostname(), host.kind().name()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("client2.test", GENERIC_HOST_TYPE),
            ("master.ldap.test", "server"),
            ("client1.test", GENERIC_HOST_TYPE),
            ("nfs.test", GENERIC_HOST_TYPE),
        ]
    );
    assert!(domain.hosts().iter().all(|host| host.domain_type() == "ldap"));
}

#[rstest]
fn roles_are_sorted_and_unique(runner: ScriptedRunner) {
    let domain = ldap_domain(&runner);

    assert_eq!(domain.roles(), vec!["client", "ldap", "nfs"]);
}

#[rstest]
#[case::clients("client", &["client2.test", "client1.test"])]
#[case::server("ldap", &["master.ldap.test"])]
#[case::absent("kdc", &[])]
fn hosts_by_role_keeps_declaration_order(
    runner: ScriptedRunner,
    #[case] role: &str,
    #[case] expected: &[&str],
) {
    let domain = ldap_domain(&runner);

    let hostnames: Vec<String> = domain
        .hosts_by_role(role)
        .iter()
        .map(|host| host.hostname().to_owned())
        .collect();
    assert_eq!(hostnames, expected);
}

#[rstest]
fn create_role_wraps_host(runner: ScriptedRunner) {
    let domain = ldap_domain(&runner);
    let fixture = Rc::new(FixtureContext::new("test_roles"));
    let host = domain
        .hosts_by_role("ldap")
        .pop()
        .expect("ldap host present");

    let role = domain.create_role(&fixture, &host).expect("role builds");

    assert_eq!(role.base().role(), "ldap");
    assert!(Rc::ptr_eq(role.base().host(), &host));
    assert_eq!(role.base().fixture().test_name(), "test_roles");
    assert!(role.downcast_ref::<PlainRole>().is_some());
}

#[rstest]
fn create_role_rejects_unmapped_role(runner: ScriptedRunner) {
    let domain = ldap_domain(&runner);
    let fixture = Rc::new(FixtureContext::new("test_roles"));
    let host = domain.hosts_by_role("nfs").pop().expect("nfs host present");

    let err = domain
        .create_role(&fixture, &host)
        .expect_err("nfs has no role type");

    assert_eq!(err.to_string(), "unexpected role: nfs");
}
