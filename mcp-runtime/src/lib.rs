use std::io;
use std::sync::Arc;

use chrono::SecondsFormat;
use clap::{Args, Subcommand};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use perch_core::error::codes;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub mod args;
pub mod collector;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod media;
pub mod session;
pub mod thread;
pub mod tools;
pub mod transport;
pub mod upstream;
pub mod util;
pub mod x_api;

#[cfg(test)]
mod testing;

use dispatch::{Dispatcher, ToolCall};
use session::{Credentials, SessionManager};
use transport::{Frame, Framing, read_frame, write_frame};
use upstream::Connector;
use util::{CredentialArgs, UpstreamArgs};
use x_api::XApiConnector;

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "perch-mcp";
const INBOUND_QUEUE_DEPTH: usize = 64;

#[derive(Subcommand)]
pub enum McpCommands {
    /// Log in and run the MCP server over stdio
    Serve(McpSessionArgs),
    /// Run the two-tier login once and print the resulting session status
    Check(McpSessionArgs),
}

#[derive(Args, Clone)]
pub struct McpSessionArgs {
    #[command(flatten)]
    pub credentials: CredentialArgs,
    #[command(flatten)]
    pub upstream: UpstreamArgs,
}

/// Run a command to completion and return the process exit code.
pub async fn run(command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve(args) => {
            let connector = XApiConnector::new(args.upstream.config());
            let credentials = args.credentials.credentials();
            let reader = BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            serve(&connector, &credentials, reader, &mut stdout).await
        }
        McpCommands::Check(args) => {
            let connector = XApiConnector::new(args.upstream.config());
            let credentials = args.credentials.credentials();
            let mut manager = SessionManager::new();
            let outcome = manager
                .initialize(&connector, &credentials)
                .await
                .map(|_| ())
                .map_err(|err| err.to_string());
            let session = manager.session();
            let report = json!({
                "state": manager.state().as_str(),
                "loginTier": session.map(|s| s.tier().as_str()),
                "authenticatedAt": session
                    .map(|s| s.authenticated_at().to_rfc3339_opts(SecondsFormat::Secs, true)),
                "error": outcome.as_ref().err(),
            });
            println!("{}", to_pretty_json(&report));
            if outcome.is_ok() { 0 } else { 1 }
        }
    }
}

/// Authenticate, then serve MCP requests from `reader` until end of input.
///
/// Returns 1 without reading anything when neither credential tier logs in.
pub async fn serve<R, W>(
    connector: &dyn Connector,
    credentials: &Credentials,
    reader: R,
    writer: &mut W,
) -> i32
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let mut session = SessionManager::new();
    if let Err(err) = session.initialize(connector, credentials).await {
        let payload = json!({
            "error": codes::AUTHENTICATION_FAILED,
            "message": err.to_string(),
        });
        eprintln!("{}", to_pretty_json(&payload));
        return 1;
    }

    let server = McpServer::new(Dispatcher::new(Arc::new(session)));
    match server.serve_io(reader, writer).await {
        Ok(()) => 0,
        Err(err) => {
            error!(error = %err, "MCP server stopped");
            let payload = json!({
                "error": "mcp_server_error",
                "message": err,
            });
            eprintln!("{}", to_pretty_json(&payload));
            1
        }
    }
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

struct McpServer {
    dispatcher: Dispatcher,
}

impl McpServer {
    fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Requests are handled concurrently on the current task; replies are
    /// written as each one completes.
    async fn serve_io<R, W>(&self, reader: R, writer: &mut W) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        let reader_task = tokio::spawn(read_frames(reader, tx));
        info!(
            server = MCP_SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            "MCP server ready"
        );

        let mut in_flight = FuturesUnordered::new();
        let mut input_open = true;
        let mut failure: Option<String> = None;
        'serve: loop {
            tokio::select! {
                incoming = rx.recv(), if input_open => match incoming {
                    Some(Ok(frame)) => in_flight.push(self.handle_frame(frame)),
                    Some(Err(err)) => {
                        failure = Some(format!("Failed to read MCP message: {err}"));
                        input_open = false;
                    }
                    None => {
                        debug!("input closed");
                        input_open = false;
                    }
                },
                Some((framing, responses)) = in_flight.next(), if !in_flight.is_empty() => {
                    for response in responses {
                        if let Err(err) = write_frame(writer, framing, &response).await {
                            failure = Some(format!("Failed to write MCP response: {err}"));
                            break 'serve;
                        }
                    }
                }
                else => break,
            }
        }

        reader_task.abort();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn handle_frame(&self, frame: Frame) -> (Framing, Vec<Value>) {
        let responses = match frame.payload {
            Ok(incoming) => self.handle_incoming_message(incoming).await,
            Err(message) => {
                warn!(error = %message, "undecodable MCP message");
                vec![error_response(Value::Null, RpcError::parse_error(message))]
            }
        };
        (frame.framing, responses)
    }

    async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A response to a request we never sent.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => {
                let result = self.handle_request(method, params).await;
                Some(match result {
                    Ok(payload) => success_response(id, payload),
                    Err(err) => error_response(id, err),
                })
            }
            None => {
                debug!(method, "notification ignored");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": format!(
                "Tools act on one authenticated X account (session: {}). Counts are capped at 50 items per call.",
                self.dispatcher.session().state().as_str()
            )
        })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let envelope = self.dispatcher.dispatch(ToolCall::new(name, args)).await;
        Ok(envelope.to_value())
    }
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tools::tools()
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name.as_str(),
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

async fn read_frames<R>(mut reader: R, tx: mpsc::Sender<Result<Frame, io::Error>>)
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                if tx.send(Ok(frame)).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                let _ = tx.send(Err(err)).await;
                break;
            }
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
