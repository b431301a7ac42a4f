use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use hostcensus_inventory::*;

/// How one fake host behaves
#[derive(Clone, Default)]
struct HostScript {
    alive: bool,
    identity_ok: bool,
    open_ok: bool,
    query_ok: bool,
    items: Vec<Value>,
    /// Simulated latency of the query
    delay_ms: u64,
}

impl HostScript {
    fn healthy(items: Vec<Value>) -> Self {
        Self {
            alive: true,
            identity_ok: true,
            open_ok: true,
            query_ok: true,
            items,
            delay_ms: 0,
        }
    }

    fn unreachable() -> Self {
        Self::default()
    }
}

/// Transport whose hosts follow scripts and which logs every call
struct ScriptedTransport {
    hosts: HashMap<String, HostScript>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    fn new(hosts: &[(&str, HostScript)]) -> Arc<Self> {
        Arc::new(Self {
            hosts: hosts
                .iter()
                .map(|(name, script)| ((*name).to_string(), script.clone()))
                .collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn script(&self, host: &str) -> HostScript {
        let short = host.split('.').next().unwrap_or(host).to_lowercase();
        self.hosts.get(&short).cloned().unwrap_or_default()
    }
}

fn remote_err(msg: &str) -> TransportError {
    TransportError::Remote {
        status: 1,
        stderr: msg.to_string(),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn probe(&self, host: &str, _timeout: Duration) -> Result<(), TransportError> {
        self.log(format!("probe {host}"));
        if self.script(host).alive {
            Ok(())
        } else {
            Err(TransportError::Timeout(Duration::from_millis(1000)))
        }
    }

    async fn identity(&self, host: &str) -> Result<SystemIdentity, TransportError> {
        self.log(format!("identity {host}"));
        if self.script(host).identity_ok {
            Ok(SystemIdentity {
                hostname: host.to_uppercase(),
                domain: "corp.local".to_string(),
            })
        } else {
            Err(remote_err("Access is denied"))
        }
    }

    async fn open_session(
        &self,
        endpoint: &str,
        label: &str,
    ) -> Result<Box<dyn Session>, TransportError> {
        self.log(format!("open {endpoint}"));
        let script = self.script(endpoint);
        if !script.open_ok {
            return Err(remote_err("WinRM cannot complete the operation"));
        }
        Ok(Box::new(ScriptedSession {
            label: label.to_string(),
            script,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct ScriptedSession {
    label: String,
    script: HostScript,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Session for ScriptedSession {
    fn label(&self) -> &str {
        &self.label
    }

    async fn query(&mut self, _query: &InventoryQuery) -> Result<Vec<Value>, TransportError> {
        self.calls.lock().unwrap().push(format!("query {}", self.label));
        if self.script.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.script.delay_ms)).await;
        }
        if self.script.query_ok {
            Ok(self.script.items.clone())
        } else {
            Err(TransportError::Timeout(Duration::from_secs(60)))
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(format!("close {}", self.label));
        Ok(())
    }
}

fn service(name: &str, run_as: Option<&str>) -> Value {
    json!({
        "Name": name,
        "State": "Running",
        "StartName": run_as,
        "Description": format!("{name} service"),
    })
}

fn task(name: &str, path: &str) -> Value {
    json!({
        "TaskName": name,
        "TaskPath": path,
        "State": "Ready",
        "RunAs": "CORP\\svc-jobs",
        "Description": null,
        "Author": "CORP\\ops",
    })
}

fn collector(transport: &Arc<ScriptedTransport>) -> InventoryCollector {
    InventoryCollector::new(transport.clone(), Duration::from_millis(1000))
}

#[tokio::test]
async fn unreachable_host_is_skipped_and_defaults_filtered() {
    let transport = ScriptedTransport::new(&[
        ("a", HostScript::unreachable()),
        (
            "b",
            HostScript::healthy(vec![
                service("AppPool", Some("CORP\\svc-app")),
                service("Spooler", Some("LocalSystem")),
                service("Ingest", Some(".\\ingest")),
            ]),
        ),
    ]);

    let request = CollectionRequest::new(CollectionKind::Services)
        .with_hosts(["A", "B"])
        .skip_defaults(true);
    let result = collector(&transport).run(&request).await.unwrap();

    assert_eq!(result.records.len(), 2);
    assert!(result.records.iter().all(|r| r.host() == "B"));
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].host(), "A");
    assert_eq!(result.hosts_succeeded(), 1);

    // A never reached the executor
    let calls = transport.calls();
    assert!(calls.contains(&"probe A".to_string()));
    assert!(!calls.iter().any(|c| c == "identity A" || c.starts_with("open A")));
}

#[tokio::test]
async fn session_open_failure_yields_empty_result() {
    let transport = ScriptedTransport::new(&[(
        "c",
        HostScript {
            open_ok: false,
            ..HostScript::healthy(vec![service("AppPool", Some("CORP\\svc-app"))])
        },
    )]);

    let request = CollectionRequest::new(CollectionKind::Services).with_hosts(["C"]);
    let result = collector(&transport).run(&request).await.unwrap();

    assert!(result.records.is_empty());
    assert_eq!(result.failures.len(), 1);
    assert!(matches!(
        &result.failures[0],
        HostFailure::Query(QueryFailure { stage: QueryStage::SessionOpen, .. })
    ));

    let calls = transport.calls();
    assert!(calls.contains(&"open C.corp.local".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("query") || c.starts_with("close")));
}

#[tokio::test]
async fn conflicting_sources_make_no_network_calls() {
    let transport = ScriptedTransport::new(&[("x", HostScript::healthy(vec![]))]);

    let request = CollectionRequest::new(CollectionKind::Services)
        .with_hosts(["X"])
        .with_host_file("f.txt");
    let result = collector(&transport).run(&request).await;

    assert!(matches!(result, Err(ConfigError::ConflictingHostSource)));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn no_source_is_an_empty_run() {
    let transport = ScriptedTransport::new(&[]);

    let request = CollectionRequest::new(CollectionKind::ScheduledTasks);
    let result = collector(&transport).run(&request).await.unwrap();

    assert!(result.records.is_empty());
    assert!(result.failures.is_empty());
    assert_eq!(result.hosts_attempted, 0);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn query_failure_contributes_nothing_but_closes() {
    let transport = ScriptedTransport::new(&[
        (
            "d",
            HostScript {
                query_ok: false,
                ..HostScript::healthy(vec![])
            },
        ),
        ("e", HostScript::healthy(vec![task("Rotate", "\\Ops\\")])),
    ]);

    let request = CollectionRequest::new(CollectionKind::ScheduledTasks).with_hosts(["d", "e"]);
    let result = collector(&transport).run(&request).await.unwrap();

    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].host(), "e");
    assert!(transport.calls().contains(&"close d".to_string()));
}

#[tokio::test]
async fn task_filter_drops_vendor_and_root_paths() {
    let transport = ScriptedTransport::new(&[(
        "srv01",
        HostScript::healthy(vec![
            task("Defrag", "\\Microsoft\\Windows\\Defrag\\"),
            task("Orphan", "\\"),
            task("Rotate", "\\Ops\\"),
        ]),
    )]);

    let base = CollectionRequest::new(CollectionKind::ScheduledTasks).with_hosts(["srv01"]);

    let all = collector(&transport).run(&base).await.unwrap();
    assert_eq!(all.records.len(), 3);

    let filtered = collector(&transport)
        .run(&base.clone().skip_defaults(true))
        .await
        .unwrap();
    assert_eq!(filtered.records.len(), 1);
    assert!(matches!(&filtered.records[0], InventoryRecord::Task(t) if t.task_name == "Rotate"));
}

#[tokio::test]
async fn parallel_run_keeps_host_order() {
    // first host is slowest so completion order is reversed
    let transport = ScriptedTransport::new(&[
        (
            "h1",
            HostScript {
                delay_ms: 60,
                ..HostScript::healthy(vec![service("One", Some("CORP\\a")), service("Two", Some("CORP\\b"))])
            },
        ),
        (
            "h2",
            HostScript {
                delay_ms: 30,
                ..HostScript::healthy(vec![service("Three", Some("CORP\\c"))])
            },
        ),
        ("h3", HostScript::unreachable()),
        ("h4", HostScript::healthy(vec![service("Four", Some("CORP\\d"))])),
    ]);

    let request =
        CollectionRequest::new(CollectionKind::Services).with_hosts(["h1", "h2", "h3", "h4"]);

    let sequential = collector(&transport).run(&request).await.unwrap();
    let parallel = collector(&transport)
        .with_concurrency(4)
        .run(&request)
        .await
        .unwrap();

    assert_eq!(sequential.records, parallel.records);
    let names: Vec<String> = parallel
        .records
        .iter()
        .map(|r| r.values()[1].clone())
        .collect();
    assert_eq!(names, vec!["One", "Two", "Three", "Four"]);
    assert_eq!(parallel.failures.len(), 1);
    assert_eq!(parallel.failures[0].host(), "h3");
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let transport = ScriptedTransport::new(&[
        ("p", HostScript::healthy(vec![service("AppPool", Some("CORP\\svc"))])),
        ("q", HostScript::healthy(vec![service("Ingest", Some("CORP\\ing"))])),
    ]);
    let request = CollectionRequest::new(CollectionKind::Services).with_hosts(["p", "q"]);

    let first = collector(&transport).run(&request).await.unwrap();
    let second = collector(&transport).run(&request).await.unwrap();

    assert_eq!(first.records, second.records);
}
