// ABOUTME: Runs the external migration engine executable as a child process
// ABOUTME: Sends the client pool and options as JSON, streams lifecycle events back

use super::{EngineOptions, EventSink, LifecycleEvent, MigrationEngine};
use crate::cluster::{ClientPool, ClusterClient};
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use which::which;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Migrate,
    Clean,
    Info,
    Validate,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Migrate => "migrate",
            Operation::Clean => "clean",
            Operation::Info => "info",
            Operation::Validate => "validate",
        }
    }
}

#[derive(Serialize)]
struct EngineRequest<'a> {
    operation: &'static str,
    options: &'a EngineOptions,
    clients: Vec<ClientDescriptor<'a>>,
}

#[derive(Serialize)]
struct ClientDescriptor<'a> {
    contact_points: Vec<String>,
    local_data_center: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyspace: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls: Option<TlsDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<AuthDescriptor<'a>>,
}

/// TLS material, base64 encoded
#[derive(Serialize)]
struct TlsDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    ca: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

#[derive(Serialize)]
struct AuthDescriptor<'a> {
    username: &'a str,
    password: &'a str,
}

impl<'a> ClientDescriptor<'a> {
    fn from_client(client: &'a ClusterClient) -> Self {
        let encode = |bytes: &Option<Vec<u8>>| bytes.as_ref().map(|b| STANDARD.encode(b));

        Self {
            contact_points: client
                .contact_points()
                .iter()
                .map(ToString::to_string)
                .collect(),
            local_data_center: client.local_data_center(),
            keyspace: client.keyspace(),
            tls: client.tls().map(|tls| TlsDescriptor {
                ca: encode(&tls.ca),
                cert: encode(&tls.cert),
                key: encode(&tls.key),
            }),
            auth: client.auth_provider().map(|auth| AuthDescriptor {
                username: auth.username(),
                password: auth.password(),
            }),
        }
    }
}

/// [`MigrationEngine`] backed by an external executable.
///
/// Every operation runs `<program> [args...] <operation>`. The child receives
/// a single JSON document on stdin describing the operation, the engine
/// options, and every client in the pool. Each stdout line that parses as a
/// tagged [`LifecycleEvent`] is forwarded as that event; any other line is
/// forwarded as [`LifecycleEvent::Output`]. A non-zero exit status fails the
/// operation with whatever the child wrote to stderr; after a successful run
/// any stderr output is logged as a warning.
#[derive(Debug)]
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
    pool: ClientPool,
    options: EngineOptions,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>, pool: ClientPool, options: EngineOptions) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            pool,
            options,
        }
    }

    /// Arguments placed before the operation name
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    fn request_payload(&self, operation: Operation) -> Result<Vec<u8>> {
        let request = EngineRequest {
            operation: operation.as_str(),
            options: &self.options,
            clients: self.pool.iter().map(ClientDescriptor::from_client).collect(),
        };
        serde_json::to_vec(&request).context("Failed to serialize engine request")
    }

    async fn run(&self, operation: Operation, events: EventSink) -> Result<()> {
        let program = which(&self.program).with_context(|| {
            format!(
                "Migration engine '{}' not found. Install it or point --engine / MIGRATION_ENGINE at it",
                self.program
            )
        })?;

        let payload = self.request_payload(operation)?;

        tracing::debug!(
            "Running {} {} {}",
            program.display(),
            self.args.join(" "),
            operation.as_str()
        );

        let mut child = tokio::process::Command::new(&program)
            .args(&self.args)
            .arg(operation.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start migration engine {}", program.display()))?;

        let mut stdin = child.stdin.take().context("Engine stdin was not captured")?;
        let stdout = child.stdout.take().context("Engine stdout was not captured")?;
        let mut stderr = child.stderr.take().context("Engine stderr was not captured")?;

        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut buffer).await {
                tracing::debug!("Failed to read engine stderr: {}", e);
            }
            String::from_utf8_lossy(&buffer).into_owned()
        });

        // A child that never reads its request is allowed; its exit status decides.
        let stdin_task = tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!("Engine did not accept request on stdin: {}", e);
            }
        });

        forward_output(stdout, &events).await;

        let status = child
            .wait()
            .await
            .context("Failed to wait for migration engine")?;
        let _ = stdin_task.await;
        let stderr_output = stderr_task.await.unwrap_or_default();
        let detail = stderr_output.trim();

        if !status.success() {
            if detail.is_empty() {
                bail!("Migration engine exited with {}", status);
            }
            bail!("Migration engine exited with {}: {}", status, detail);
        }

        for line in detail.lines().filter(|l| !l.trim().is_empty()) {
            tracing::warn!("Migration engine: {}", line);
        }

        Ok(())
    }
}

/// Forward every stdout line as an event until the stream closes.
///
/// Lines are decoded lossily so stray non-UTF-8 bytes never cut the engine
/// short. A read error stops forwarding but leaves the outcome to the exit
/// status.
async fn forward_output<R>(stdout: R, events: &EventSink)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut segments = BufReader::new(stdout).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes)
                    .trim_end_matches('\r')
                    .to_string();
                let event = serde_json::from_str::<LifecycleEvent>(&line)
                    .unwrap_or(LifecycleEvent::Output { line });
                let _ = events.send(event);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read engine output: {}", e);
                break;
            }
        }
    }
}

impl MigrationEngine for ProcessEngine {
    async fn migrate(&mut self, events: EventSink) -> Result<()> {
        self.run(Operation::Migrate, events).await
    }

    async fn clean(&mut self, events: EventSink) -> Result<()> {
        self.run(Operation::Clean, events).await
    }

    async fn info(&mut self, events: EventSink) -> Result<()> {
        self.run(Operation::Info, events).await
    }

    async fn validate(&mut self, events: EventSink) -> Result<()> {
        self.run(Operation::Validate, events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::auth::PlainTextAuthProvider;
    use crate::cluster::ConnectionConfig;
    use crate::config::TlsMaterial;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn pool(count: usize) -> ClientPool {
        let config = ConnectionConfig {
            contact_points: vec!["127.0.0.1".to_string()],
            local_data_center: Some("dc1".to_string()),
            keyspace: Some("app".to_string()),
            tls: None,
            auth_provider: Some(PlainTextAuthProvider::new("cassandra", "secret")),
        };
        ClientPool::create(&config, count).unwrap()
    }

    fn options() -> EngineOptions {
        EngineOptions {
            ensure_keyspace: true,
            migrations_dir: PathBuf::from("migrations"),
        }
    }

    fn shell_engine(script: &str) -> ProcessEngine {
        ProcessEngine::new("sh", pool(2), options()).with_args(["-c", script])
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn request_describes_every_client() {
        let engine = ProcessEngine::new("cassandra-shift", pool(3), options());
        let payload = engine.request_payload(Operation::Migrate).unwrap();
        let request: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(request["operation"], "migrate");
        assert_eq!(request["options"]["ensure_keyspace"], true);
        assert_eq!(request["clients"].as_array().unwrap().len(), 3);
        assert_eq!(request["clients"][0]["contact_points"][0], "127.0.0.1:9042");
        assert_eq!(request["clients"][0]["local_data_center"], "dc1");
        assert_eq!(request["clients"][0]["auth"]["username"], "cassandra");
        assert!(request["clients"][0].get("tls").is_none());
    }

    #[test]
    fn tls_section_is_present_when_tls_is_configured() {
        let config = ConnectionConfig {
            contact_points: vec!["127.0.0.1".to_string()],
            local_data_center: Some("dc1".to_string()),
            tls: Some(TlsMaterial::default()),
            ..ConnectionConfig::default()
        };
        let engine = ProcessEngine::new(
            "cassandra-shift",
            ClientPool::create(&config, 1).unwrap(),
            options(),
        );

        let payload = engine.request_payload(Operation::Info).unwrap();
        let request: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert!(request["clients"][0]["tls"].is_object());
        assert!(request["clients"][0].get("auth").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn forwards_events_and_plain_output() {
        let mut engine = shell_engine(
            r#"cat > /dev/null
echo '{"event":"ensuredKeyspace"}'
echo '{"event":"appliedMigration","version":"1","name":"init","type":"cql"}'
echo 'plain text'"#,
        );
        let (tx, rx) = mpsc::unbounded_channel();

        engine.migrate(tx).await.unwrap();

        assert_eq!(
            drain(rx),
            vec![
                LifecycleEvent::EnsuredKeyspace,
                LifecycleEvent::AppliedMigration {
                    version: "1".to_string(),
                    name: "init".to_string(),
                    kind: "cql".to_string(),
                },
                LifecycleEvent::Output {
                    line: "plain text".to_string()
                },
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn operation_name_is_passed_to_the_engine() {
        // With `sh -c`, the first trailing argument becomes $0
        let mut engine = shell_engine(r#"cat > /dev/null; echo "op=$0""#);
        let (tx, rx) = mpsc::unbounded_channel();

        engine.validate(tx).await.unwrap();

        assert_eq!(
            drain(rx),
            vec![LifecycleEvent::Output {
                line: "op=validate".to_string()
            }]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_fails_with_stderr() {
        let mut engine = shell_engine("cat > /dev/null; echo 'keyspace app missing' >&2; exit 3");
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = engine.clean(tx).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("keyspace app missing"), "{}", message);
    }

    #[tokio::test]
    async fn missing_engine_program_is_reported() {
        let mut engine = ProcessEngine::new("definitely-not-a-shift-engine", pool(1), options());
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = engine.info(tx).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_does_not_stop_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let mut engine = shell_engine(&format!(
            "cat > /dev/null; printf 'Applied caf\\351\\n'; sleep 1; touch '{}'; exit 0",
            marker.display()
        ));
        let (tx, rx) = mpsc::unbounded_channel();

        engine.migrate(tx).await.unwrap();

        assert!(marker.exists());
        assert_eq!(
            drain(rx),
            vec![LifecycleEvent::Output {
                line: "Applied caf\u{FFFD}".to_string()
            }]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_request_does_not_block_early_output() {
        // Output is produced before the request has been read; a 64 KiB pipe
        // would fill up if the request were written first.
        let script = "i=0; while [ $i -lt 20000 ]; do echo progress; i=$((i+1)); done; cat > /dev/null";
        let mut engine = ProcessEngine::new("sh", pool(2000), options()).with_args(["-c", script]);
        assert!(engine.request_payload(Operation::Info).unwrap().len() > 128 * 1024);
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::time::timeout(std::time::Duration::from_secs(30), engine.info(tx))
            .await
            .expect("engine deadlocked")
            .unwrap();

        assert_eq!(drain(rx).len(), 20000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_of_successful_engine_is_not_an_error() {
        let mut engine = shell_engine("cat > /dev/null; echo 'deprecated option' >&2; echo done");
        let (tx, rx) = mpsc::unbounded_channel();

        engine.validate(tx).await.unwrap();
        assert_eq!(
            drain(rx),
            vec![LifecycleEvent::Output {
                line: "done".to_string()
            }]
        );
    }
}
