//! Externally loaded decode script, run as a sandboxed child process.
//!
//! Protocol (one JSON object per line):
//! - stdout: one entry per line. Output entries are either `{"payload":"<base64>"}`
//!   or `{"text":"..."}`, each with optional `"metadata"`, and are appended to
//!   `outputs` as they arrive. A fetch request `{"fetch":"<path>"}` asks the
//!   decoder to fetch from `source`; an empty path fetches the endpoint itself.
//! - stdin, depending on [FetchMode]:
//!   - `Prefetch`: every payload fetched from `source` before the script
//!     started, as `{"payload":"<base64>","metadata":{..}}` lines, then EOF.
//!   - `OnDemand`: nothing up front. Each fetch request is answered with one line,
//!     `{"payloads":[{"payload":"<base64>","metadata":{..}},..]}` or
//!     `{"error":"..."}`. Stdin closes once the script closes stdout.
//! - stderr: free text, copied line by line to `log`.
//!
//! The child sees a cleared environment apart from `PATH`, `RECEIVER_NAME` and
//! `CYCLE_ID`, and is killed if the cycle is dropped (timeout or stop).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tracing::instrument;

use super::Decoder;
use crate::binding::BindingContext;
use crate::error::{DecodeError, FetchError};
use crate::types::{Metadata, Payload, ValidatedConfig};

/// Interpreter used when none is configured.
pub const DEFAULT_INTERPRETER: &str = "sh";

/// How a script reaches the `source` binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
  /// One fetch before the script starts; results arrive on stdin.
  #[default]
  Prefetch,
  /// The script issues zero or more fetch requests itself.
  OnDemand,
}

#[derive(Serialize)]
struct InputLine<'a> {
  payload: String,
  metadata: Option<&'a Metadata>,
}

impl<'a> InputLine<'a> {
  fn from_payload(p: &'a Payload) -> Self {
    Self {
      payload: STANDARD.encode(&p.data),
      metadata: p.metadata.as_ref(),
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum FetchReply<'a> {
  Payloads(Vec<InputLine<'a>>),
  Error(String),
}

#[derive(Deserialize)]
struct OutputLine {
  #[serde(default)]
  payload: Option<String>,
  #[serde(default)]
  text: Option<String>,
  #[serde(default)]
  metadata: Option<Metadata>,
  #[serde(default)]
  fetch: Option<String>,
}

/// One parsed stdout line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScriptLine {
  Output(Payload),
  Fetch(String),
}

/// Runs `<interpreter> <script>` once per cycle.
#[derive(Debug, Clone)]
pub struct ScriptDecoder {
  script: PathBuf,
  interpreter: String,
  fetch_mode: FetchMode,
}

impl ScriptDecoder {
  pub fn new(script: impl Into<PathBuf>) -> Self {
    Self {
      script: script.into(),
      interpreter: DEFAULT_INTERPRETER.to_string(),
      fetch_mode: FetchMode::default(),
    }
  }

  /// Uses the configured script reference as the script path.
  pub fn from_config(config: &ValidatedConfig) -> Self {
    Self::new(&config.script)
  }

  pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
    self.interpreter = interpreter.into();
    self
  }

  pub fn with_fetch_mode(mut self, mode: FetchMode) -> Self {
    self.fetch_mode = mode;
    self
  }

  pub fn script(&self) -> &Path {
    &self.script
  }

  pub fn fetch_mode(&self) -> FetchMode {
    self.fetch_mode
  }

  fn script_name(&self) -> String {
    self.script.display().to_string()
  }

  fn command(&self, ctx: &BindingContext) -> Command {
    let mut cmd = Command::new(&self.interpreter);
    cmd
      .arg(&self.script)
      .env_clear()
      .env("RECEIVER_NAME", ctx.log.receiver())
      .env("CYCLE_ID", ctx.log.cycle_id().to_string())
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(path) = std::env::var_os("PATH") {
      cmd.env("PATH", path);
    }
    cmd
  }

  fn invalid(&self, line: usize, reason: impl Into<String>) -> DecodeError {
    DecodeError::InvalidOutput {
      script: self.script_name(),
      line,
      reason: reason.into(),
    }
  }
}

/// Encodes fetched payloads as the script's stdin.
pub(crate) fn encode_input(payloads: &[Payload]) -> String {
  let mut out = String::new();
  for p in payloads {
    // Serializing a String and a string map cannot fail.
    if let Ok(json) = serde_json::to_string(&InputLine::from_payload(p)) {
      out.push_str(&json);
      out.push('\n');
    }
  }
  out
}

/// Encodes the single stdin line answering one fetch request.
pub(crate) fn encode_reply(result: &Result<Vec<Payload>, FetchError>) -> String {
  let reply = match result {
    Ok(payloads) => FetchReply::Payloads(payloads.iter().map(InputLine::from_payload).collect()),
    Err(e) => FetchReply::Error(e.to_string()),
  };
  let mut line = serde_json::to_string(&reply)
    .unwrap_or_else(|e| format!("{{\"error\":\"unable to encode reply: {}\"}}", e));
  line.push('\n');
  line
}

/// Parses one stdout line into an output entry or a fetch request.
pub(crate) fn parse_script_line(line: &str) -> Result<ScriptLine, String> {
  let parsed: OutputLine = serde_json::from_str(line).map_err(|e| e.to_string())?;
  if let Some(path) = parsed.fetch {
    if parsed.payload.is_some() || parsed.text.is_some() {
      return Err("'fetch' cannot be combined with an output entry".to_string());
    }
    return Ok(ScriptLine::Fetch(path));
  }
  let data = match (parsed.payload, parsed.text) {
    (Some(b64), None) => STANDARD.decode(b64.trim()).map_err(|e| e.to_string())?,
    (None, Some(text)) => text.into_bytes(),
    (Some(_), Some(_)) => return Err("both 'payload' and 'text' given".to_string()),
    (None, None) => return Err("missing 'payload', 'text' or 'fetch'".to_string()),
  };
  Ok(ScriptLine::Output(Payload {
    data: data.into(),
    metadata: parsed.metadata,
  }))
}

/// Runs one fetch request against `source` and writes the reply to the script.
async fn answer_fetch(
  ctx: &BindingContext,
  stdin: &mut ChildStdin,
  path: &str,
) -> Option<FetchError> {
  let result = if path.is_empty() {
    ctx.source.fetch().await
  } else {
    ctx.source.fetch_path(path).await
  };
  let failure = match &result {
    Ok(payloads) => {
      ctx.log.trace(format!("script fetch '{}' returned {} payload(s)", path, payloads.len()));
      None
    }
    Err(e) => {
      ctx.log.warn(format!("script fetch '{}' failed: {}", path, e));
      Some(e.clone())
    }
  };
  let reply = encode_reply(&result);
  // The script may have stopped reading; its exit status decides the cycle.
  if let Err(e) = stdin.write_all(reply.as_bytes()).await {
    ctx.log.debug(format!("unable to deliver fetch reply: {}", e));
  } else if let Err(e) = stdin.flush().await {
    ctx.log.debug(format!("unable to deliver fetch reply: {}", e));
  }
  failure
}

#[async_trait]
impl Decoder for ScriptDecoder {
  #[instrument(level = "trace", skip(self, ctx), fields(script = %self.script.display()))]
  async fn decode(&self, ctx: &mut BindingContext) -> Result<(), DecodeError> {
    let prefetched = match self.fetch_mode {
      FetchMode::Prefetch => Some(ctx.source.fetch().await?),
      FetchMode::OnDemand => None,
    };
    ctx.log.debug(format!(
      "About to execute '{}' ({:?}, {} prefetched payload(s))",
      self.script_name(),
      self.fetch_mode,
      prefetched.as_ref().map_or(0, Vec::len)
    ));

    let mut child = self.command(ctx).spawn().map_err(|e| DecodeError::Spawn {
      script: self.script_name(),
      reason: e.to_string(),
    })?;
    let (Some(stdin), Some(stdout), Some(stderr)) =
      (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
      return Err(DecodeError::Spawn {
        script: self.script_name(),
        reason: "child stdio not captured".to_string(),
      });
    };

    // Prefetch hands stdin to a writer and closes it; on demand keeps it for replies.
    let (writer, mut requests) = match prefetched {
      Some(fetched) => {
        let input = encode_input(&fetched);
        let mut stdin = stdin;
        // The script may exit without reading stdin; a broken pipe here is not a failure.
        let writer = tokio::spawn(async move {
          let _ = stdin.write_all(input.as_bytes()).await;
          let _ = stdin.shutdown().await;
        });
        (Some(writer), None)
      }
      None => (None, Some(stdin)),
    };

    let script_log = ctx.log.clone();
    let stderr_task = tokio::spawn(async move {
      let mut lines = BufReader::new(stderr).lines();
      while let Ok(Some(line)) = lines.next_line().await {
        script_log.info(format!("script: {}", line));
      }
    });

    let mut lines = BufReader::new(stdout).lines();
    let mut line_no = 0;
    let mut failure = None;
    let mut fetch_failure = None;
    loop {
      let line = match lines.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) => break,
        Err(e) => {
          failure = Some(DecodeError::Script(format!("reading script output: {}", e)));
          break;
        }
      };
      line_no += 1;
      if line.trim().is_empty() {
        continue;
      }
      match parse_script_line(&line) {
        Ok(ScriptLine::Output(payload)) => ctx.outputs.push(payload),
        Ok(ScriptLine::Fetch(path)) => match requests.as_mut() {
          Some(stdin) => {
            if let Some(e) = answer_fetch(ctx, stdin, &path).await {
              fetch_failure.get_or_insert(e);
            }
          }
          None => {
            failure = Some(self.invalid(line_no, "fetch requests need on-demand fetch mode"));
            break;
          }
        },
        Err(reason) => {
          failure = Some(self.invalid(line_no, reason));
          break;
        }
      }
    }
    drop(requests);

    if let Some(err) = failure {
      let _ = child.kill().await;
      if let Some(writer) = writer {
        writer.abort();
      }
      stderr_task.abort();
      return Err(err);
    }

    let status = child
      .wait()
      .await
      .map_err(|e| DecodeError::Script(format!("waiting for script: {}", e)))?;
    if let Some(writer) = writer {
      let _ = writer.await;
    }
    let _ = stderr_task.await;
    if !status.success() {
      // A script that gives up after a failed fetch is a fetch failure, retried next tick.
      if let Some(e) = fetch_failure {
        return Err(DecodeError::Fetch(e));
      }
      return Err(DecodeError::ScriptExit {
        script: self.script_name(),
        code: status.code(),
      });
    }
    ctx.log.trace(format!("script produced {} payload(s)", ctx.outputs.len()));
    Ok(())
  }

  fn kind(&self) -> &'static str {
    "script"
  }
}
