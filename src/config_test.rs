use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_apply_when_only_endpoint_is_set() {
    let cfg = GraphQlConfig::from_lookup(lookup(&[(ENV_GRAPHQL_URL, "https://api.example.com/graphql/")])).unwrap();
    assert_eq!(cfg.endpoint, "https://api.example.com/graphql");
    assert_eq!(cfg.token, None);
    assert_eq!(cfg.timeouts, SourceTimeouts::default());
    assert!(!cfg.supports_unassign);
}

#[test]
fn overrides_are_parsed() {
    let cfg = GraphQlConfig::from_lookup(lookup(&[
        (ENV_GRAPHQL_URL, "http://localhost:4000/graphql"),
        (ENV_API_TOKEN, "secret"),
        (ENV_REQUEST_TIMEOUT_SECS, "42"),
        (ENV_CONNECT_TIMEOUT_SECS, " 7 "),
        (ENV_SUPPORTS_UNASSIGN, "true"),
    ]))
    .unwrap();
    assert_eq!(cfg.token.as_deref(), Some("secret"));
    assert_eq!(cfg.timeouts, SourceTimeouts { request_secs: 42, connect_secs: 7 });
    assert!(cfg.supports_unassign);
}

#[test]
fn missing_endpoint_is_an_error() {
    let err = GraphQlConfig::from_lookup(lookup(&[])).unwrap_err();
    assert!(matches!(err, SourceError::Config(msg) if msg.contains(ENV_GRAPHQL_URL)));
}

#[test]
fn malformed_endpoint_is_an_error() {
    assert!(GraphQlConfig::from_lookup(lookup(&[(ENV_GRAPHQL_URL, "not a url")])).is_err());
}

#[test]
fn bad_timeout_is_an_error() {
    let err = GraphQlConfig::from_lookup(lookup(&[
        (ENV_GRAPHQL_URL, "http://localhost/graphql"),
        (ENV_REQUEST_TIMEOUT_SECS, "soon"),
    ]))
    .unwrap_err();
    assert!(err.to_string().contains(ENV_REQUEST_TIMEOUT_SECS));
}

#[test]
fn blank_token_is_treated_as_absent() {
    let cfg = GraphQlConfig::from_lookup(lookup(&[(ENV_GRAPHQL_URL, "http://localhost/graphql"), (ENV_API_TOKEN, "  ")]))
        .unwrap();
    assert_eq!(cfg.token, None);
}

#[test]
fn unassign_flag_rejects_garbage() {
    assert!(parse_bool(Some("maybe")).is_err());
    assert!(!parse_bool(Some("0")).unwrap());
    assert!(!parse_bool(None).unwrap());
}

#[test]
fn unset_env_var_reads_as_absent() {
    assert_eq!(env_var("CURATOR_TEST_DEFINITELY_UNSET_7F3A"), None);
}
