use async_trait::async_trait;
use domain::Snapshot;
use iot2alexa_backend::{Backend, BackendError, BackendLookup, BackendRegistry, MqttBackend};
use iot2alexa_config::{OutputConfig, SkillConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

struct NamedBackend(&'static str);

#[async_trait]
impl Backend for NamedBackend {
    fn name(&self) -> &str {
        self.0
    }

    async fn init(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn data(&self) -> Result<Snapshot, BackendError> {
        Ok(Snapshot::new())
    }
}

fn section_backend(
    config: &SkillConfig,
    name: &'static str,
) -> Result<Option<Arc<dyn Backend>>, BackendError> {
    Ok(config
        .section(name)
        .map(|_| Arc::new(NamedBackend(name)) as Arc<dyn Backend>))
}

fn lookup_alpha(config: &SkillConfig) -> Result<Option<Arc<dyn Backend>>, BackendError> {
    section_backend(config, "alpha")
}

fn lookup_beta(config: &SkillConfig) -> Result<Option<Arc<dyn Backend>>, BackendError> {
    section_backend(config, "beta")
}

fn lookup_broken(config: &SkillConfig) -> Result<Option<Arc<dyn Backend>>, BackendError> {
    match config.section("broken") {
        Some(_) => Err(BackendError::config("broken", "no topic set")),
        None => Ok(None),
    }
}

fn registry() -> BackendRegistry {
    BackendRegistry::new(vec![
        BackendLookup {
            name: "alpha",
            construct: lookup_alpha,
        },
        BackendLookup {
            name: "beta",
            construct: lookup_beta,
        },
        BackendLookup {
            name: "broken",
            construct: lookup_broken,
        },
    ])
}

fn skill(yaml: &str) -> SkillConfig {
    let sections: BTreeMap<String, serde_yml::Value> = serde_yml::from_str(yaml).expect("yaml");
    SkillConfig::new("app", "/alexa", OutputConfig::default(), sections)
}

#[test]
fn single_configured_backend_is_selected() {
    let backend = registry().lookup(&skill("beta:\n  x: 1\n")).expect("backend");
    assert_eq!(backend.name(), "beta");
}

#[test]
fn no_configured_backend_lists_known_names() {
    let err = registry()
        .lookup(&skill("other:\n  x: 1\n"))
        .err()
        .expect("no backend");
    assert!(matches!(err, BackendError::NoBackend { .. }));
    assert_eq!(
        err.to_string(),
        "no backend configured (known backends: alpha, beta, broken)"
    );
}

#[test]
fn two_configured_backends_are_rejected_by_name() {
    let err = registry()
        .lookup(&skill("alpha:\n  x: 1\nbeta:\n  y: 2\n"))
        .err()
        .expect("ambiguous");
    match &err {
        BackendError::MultipleBackends { found } => {
            assert_eq!(found, &vec!["alpha".to_string(), "beta".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("alpha"));
    assert!(message.contains("beta"));
    assert!(message.contains("please configure only a single backend"));
}

#[test]
fn empty_section_counts_as_absent() {
    let backend = registry()
        .lookup(&skill("alpha:\nbeta:\n  y: 2\n"))
        .expect("backend");
    assert_eq!(backend.name(), "beta");
}

#[test]
fn malformed_section_aborts_lookup() {
    let err = registry()
        .lookup(&skill("alpha:\n  x: 1\nbroken:\n  z: 3\n"))
        .err()
        .expect("config error");
    assert_eq!(
        err.to_string(),
        "invalid broken backend configuration: no topic set"
    );
}

#[test]
fn builtin_registry_knows_mqtt() {
    let registry = BackendRegistry::builtin();
    assert_eq!(registry.names(), vec!["mqtt"]);
    assert_eq!(MqttBackend::registration().name, "mqtt");
}

#[test]
fn builtin_registry_constructs_mqtt_without_connecting() {
    let config = skill(
        "mqtt:\n  host: localhost\n  topic: sensors/garden\n  mapping:\n    - key: temp\n      path: $.value\n",
    );
    let backend = BackendRegistry::builtin().lookup(&config).expect("backend");
    assert_eq!(backend.name(), "mqtt");
    assert_eq!(backend.state(), "disconnected");
    assert!(backend.data().expect("data").is_empty());
}
