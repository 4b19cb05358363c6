//! MCP transport implementations.
//!
//! [`StdioTransport`] talks to a child process over stdin/stdout with
//! request-ID multiplexing and framing negotiation; [`HttpTransport`]
//! POSTs JSON-RPC bodies (and accepts event-stream replies, reduced to
//! the same request/response shape).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use super::framing::{read_frame, write_frame, FramingMode};
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::error::{Result, ServiceError};

/// Budget for the initialize reply in header mode.
pub const HEADER_INIT_TIMEOUT: Duration = Duration::from_secs(8);

/// Budget for the initialize reply after falling back to line mode.
pub const LINE_INIT_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-request budget once the framing is negotiated.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport layer for MCP JSON-RPC communication.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for the matching response.
    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Send a notification (no `id`, no response expected).
    async fn send_notification(&self, method: &str, params: serde_json::Value) -> Result<()>;

    /// Tear down the transport (kill subprocess, drop connections).
    async fn close(&self);
}

/// Pending response registry: request id → oneshot sender.
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Transport over a child process's stdin/stdout.
///
/// Writing uses the framing mode pinned at negotiation time; reading
/// is always tolerant (see [`framing`](super::framing)). A background
/// reader task parses frames, matches responses on `id`, and delivers
/// them through per-request oneshot channels; non-matching frames are
/// discarded. A request timeout kills the subprocess so the client is
/// never left wedged.
pub struct StdioTransport {
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<ChildStdin>>,
    mode: FramingMode,
    pending: PendingMap,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl StdioTransport {
    /// Spawn the server and negotiate the stdio framing with the given
    /// `initialize` request.
    ///
    /// The client starts in auto mode: a header-mode attempt with an
    /// 8-second budget; on timeout the child is killed, respawned, and
    /// the initialize is retried in line mode with a 20-second budget.
    /// The first mode that produces a reply is pinned for the client's
    /// lifetime. Returns the transport together with the initialize
    /// response.
    pub async fn connect(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        init_request: JsonRpcRequest,
    ) -> Result<(Self, JsonRpcResponse)> {
        Self::connect_with_timeouts(
            command,
            args,
            env,
            init_request,
            HEADER_INIT_TIMEOUT,
            LINE_INIT_TIMEOUT,
        )
        .await
    }

    /// [`connect`](Self::connect) with explicit negotiation budgets.
    pub async fn connect_with_timeouts(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        init_request: JsonRpcRequest,
        header_timeout: Duration,
        line_timeout: Duration,
    ) -> Result<(Self, JsonRpcResponse)> {
        match Self::try_mode(
            command,
            args,
            env,
            FramingMode::Header,
            header_timeout,
            init_request.clone(),
        )
        .await
        {
            Ok(ok) => {
                debug!(command, "stdio framing pinned: header mode");
                Ok(ok)
            }
            Err(e) => {
                debug!(command, error = %e, "header-mode initialize failed, retrying in line mode");
                let ok = Self::try_mode(
                    command,
                    args,
                    env,
                    FramingMode::Line,
                    line_timeout,
                    init_request,
                )
                .await?;
                debug!(command, "stdio framing pinned: line mode");
                Ok(ok)
            }
        }
    }

    /// One negotiation attempt: spawn, initialize, keep or kill.
    async fn try_mode(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        mode: FramingMode,
        timeout: Duration,
        init_request: JsonRpcRequest,
    ) -> Result<(Self, JsonRpcResponse)> {
        let transport = Self::spawn(command, args, env, mode)?;
        match transport.request_with_timeout(init_request, timeout).await {
            Ok(response) => Ok((transport, response)),
            Err(e) => {
                transport.close().await;
                Err(e)
            }
        }
    }

    /// Spawn the child and start the background reader.
    fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        mode: FramingMode,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ServiceError::McpTransport(format!("failed to spawn {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ServiceError::McpTransport("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ServiceError::McpTransport("failed to capture stdout".into()))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let reader_pending = Arc::clone(&pending);
        let reader_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(frame)) => match serde_json::from_str::<JsonRpcResponse>(&frame) {
                        Ok(response) => {
                            let id = response.id;
                            let mut map = reader_pending.lock().await;
                            match map.remove(&id) {
                                Some(tx) => {
                                    let _ = tx.send(response);
                                }
                                None => {
                                    debug!(id, "discarding response with no pending request");
                                }
                            }
                        }
                        Err(e) => {
                            // Server-initiated notifications and
                            // malformed lines fall through here.
                            debug!(error = %e, "ignoring non-response frame");
                        }
                    },
                    Ok(None) => {
                        debug!("child closed stdout");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdio read error, reader exiting");
                        break;
                    }
                }
            }
            // Fail all pending requests by dropping their senders.
            let mut map = reader_pending.lock().await;
            map.clear();
        });

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            stdin: Arc::new(Mutex::new(stdin)),
            mode,
            pending,
            reader_handle,
        })
    }

    /// The negotiated framing mode.
    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    async fn request_with_timeout(
        &self,
        request: JsonRpcRequest,
        timeout: Duration,
    ) -> Result<JsonRpcResponse> {
        let id = request.id;
        let payload = serde_json::to_string(&request)?;
        debug!(method = %request.method, id, "sending stdio request");

        let (tx, rx) = oneshot::channel::<JsonRpcResponse>();
        {
            let mut map = self.pending.lock().await;
            map.insert(id, tx);
        }

        {
            let mut stdin = self.stdin.lock().await;
            write_frame(&mut *stdin, self.mode, &payload)
                .await
                .map_err(|e| ServiceError::McpTransport(format!("stdin write failed: {e}")))?;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ServiceError::McpTransport(
                "child closed stdout before responding".into(),
            )),
            Err(_) => {
                // Timed out: kill the child so the client is never
                // wedged, then surface a protocol error.
                {
                    let mut map = self.pending.lock().await;
                    map.remove(&id);
                }
                self.kill_child().await;
                Err(ServiceError::McpTransport(format!(
                    "request {id} timed out after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    async fn kill_child(&self) {
        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            debug!(error = %e, "child already exited");
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.request_with_timeout(request, REQUEST_TIMEOUT).await
    }

    async fn send_notification(&self, method: &str, params: serde_json::Value) -> Result<()> {
        let notif = JsonRpcNotification::new(method, params);
        let payload = serde_json::to_string(&notif)?;
        debug!(method, "sending stdio notification");

        let mut stdin = self.stdin.lock().await;
        write_frame(&mut *stdin, self.mode, &payload)
            .await
            .map_err(|e| ServiceError::McpTransport(format!("stdin write failed: {e}")))
    }

    async fn close(&self) {
        self.kill_child().await;
        self.reader_handle.abort();
        let mut map = self.pending.lock().await;
        map.clear();
    }
}

/// Transport over HTTP POST.
///
/// One POST per request with the JSON-RPC body. SSE servers are
/// intentionally reduced to the same request/response shape: when the
/// reply is an event stream, the first `data:` JSON object is taken as
/// the response.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    headers: HashMap<String, String>,
}

impl HttpTransport {
    /// Create a transport targeting the given endpoint with extra
    /// headers merged into every request.
    pub fn new(endpoint: String, headers: HashMap<String, String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            headers,
        }
    }

    fn post(&self) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        debug!(method = %request.method, id = request.id, endpoint = %self.endpoint, "sending http request");

        let resp = self
            .post()
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::McpTransport(format!("http request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::McpTransport(format!("HTTP {status}: {body}")));
        }

        let is_event_stream = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        if is_event_stream {
            let body = resp
                .text()
                .await
                .map_err(|e| ServiceError::McpTransport(format!("failed to read stream: {e}")))?;
            for line in body.lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    let data = data.trim();
                    if data.starts_with('{') {
                        return Ok(serde_json::from_str(data)?);
                    }
                }
            }
            return Err(ServiceError::McpProtocol(
                "event stream contained no JSON-RPC response".into(),
            ));
        }

        let response: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::McpTransport(format!("failed to parse response: {e}")))?;
        Ok(response)
    }

    async fn send_notification(&self, method: &str, params: serde_json::Value) -> Result<()> {
        let notif = JsonRpcNotification::new(method, params);
        debug!(method, endpoint = %self.endpoint, "sending http notification");

        let resp = self
            .post()
            .json(&notif)
            .send()
            .await
            .map_err(|e| ServiceError::McpTransport(format!("http notification failed: {e}")))?;

        // Notifications are fire-and-forget; log but never fail.
        if !resp.status().is_success() {
            debug!(method, status = %resp.status(), "notification got non-success status");
        }
        Ok(())
    }

    async fn close(&self) {}
}

/// A mock transport for testing: pre-programmed responses returned in
/// order, sent requests and notifications recorded.
#[cfg(test)]
pub struct MockTransport {
    responses: Mutex<Vec<JsonRpcResponse>>,
    requests: Mutex<Vec<JsonRpcRequest>>,
    notifications: Mutex<Vec<JsonRpcNotification>>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new(responses: Vec<JsonRpcResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<JsonRpcRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn notifications(&self) -> Vec<JsonRpcNotification> {
        self.notifications.lock().await.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl McpTransport for MockTransport {
    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.requests.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            Err(ServiceError::McpTransport("no more mock responses".into()))
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn send_notification(&self, method: &str, params: serde_json::Value) -> Result<()> {
        self.notifications
            .lock()
            .await
            .push(JsonRpcNotification::new(method, params));
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_request() -> JsonRpcRequest {
        JsonRpcRequest::new(
            1,
            "initialize",
            serde_json::json!({"protocolVersion": super::super::MCP_PROTOCOL_VERSION}),
        )
    }

    /// A line-mode-only server: replies to any line starting with `{`,
    /// never understands header framing.
    #[cfg(unix)]
    fn line_only_server() -> (String, Vec<String>) {
        let script = r#"while IFS= read -r line; do
  case "$line" in
    '{'*) printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"line-server","version":"1.0"}}}' ;;
  esac
done"#;
        ("sh".to_string(), vec!["-c".to_string(), script.to_string()])
    }

    /// Negotiation: a server that only speaks line mode is eventually
    /// used in line mode after the header attempt times out.
    #[cfg(unix)]
    #[tokio::test]
    async fn negotiation_falls_back_to_line_mode() {
        let (command, args) = line_only_server();
        let (transport, response) = StdioTransport::connect_with_timeouts(
            &command,
            &args,
            &HashMap::new(),
            init_request(),
            Duration::from_millis(300),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(transport.mode(), FramingMode::Line);
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "line-server");

        transport.close().await;
    }

    /// A server that answers nothing fails both attempts promptly and
    /// leaves no child running (kill-on-timeout + kill_on_drop).
    #[cfg(unix)]
    #[tokio::test]
    async fn silent_server_fails_both_modes() {
        let result = StdioTransport::connect_with_timeouts(
            "sh",
            &["-c".to_string(), "sleep 60".to_string()],
            &HashMap::new(),
            init_request(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
        .await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_failure_is_transport_error() {
        let result = StdioTransport::connect_with_timeouts(
            "/nonexistent/mcp-server-binary",
            &[],
            &HashMap::new(),
            init_request(),
            Duration::from_millis(100),
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(ServiceError::McpTransport(_))));
    }

    /// Requests after negotiation reuse the pinned line mode.
    #[cfg(unix)]
    #[tokio::test]
    async fn pinned_mode_survives_later_requests() {
        let (command, args) = line_only_server();
        let (transport, _) = StdioTransport::connect_with_timeouts(
            &command,
            &args,
            &HashMap::new(),
            init_request(),
            Duration::from_millis(300),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        // The scripted server always answers id 1; the reader matches
        // on id, so send id 1 again.
        let response = transport
            .request_with_timeout(
                JsonRpcRequest::new(1, "tools/list", serde_json::json!({})),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(response.result.is_some());

        transport.close().await;
    }

    #[tokio::test]
    async fn mock_transport_returns_responses_in_order() {
        let transport = MockTransport::new(vec![
            JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: 1,
                result: Some(serde_json::json!({"a": 1})),
                error: None,
            },
            JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: 2,
                result: Some(serde_json::json!({"b": 2})),
                error: None,
            },
        ]);

        let r1 = transport
            .send_request(JsonRpcRequest::new(1, "x", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(r1.result.unwrap()["a"], 1);

        let r2 = transport
            .send_request(JsonRpcRequest::new(2, "y", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(r2.result.unwrap()["b"], 2);

        assert!(transport
            .send_request(JsonRpcRequest::new(3, "z", serde_json::json!({})))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn mock_transport_records_notifications() {
        let transport = MockTransport::new(vec![]);
        transport
            .send_notification("notifications/initialized", serde_json::json!({}))
            .await
            .unwrap();
        let notifs = transport.notifications().await;
        assert_eq!(notifs.len(), 1);
        assert_eq!(notifs[0].method, "notifications/initialized");
    }
}
