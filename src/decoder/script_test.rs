//! Tests for `ScriptDecoder`.

use std::path::PathBuf;
use std::sync::Arc;

use super::script::{ScriptLine, encode_input, encode_reply, parse_script_line};
use super::{Decoder, FetchMode, ScriptDecoder};
use crate::binding::BindingContext;
use crate::cycle_log::ReceiverLog;
use crate::error::{DecodeError, FetchError};
use crate::test_support::{FailingSource, PathSource, StaticSource};
use crate::types::{Payload, ReceiverConfig};

fn write_script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
  let path = dir.path().join("decode.sh");
  std::fs::write(&path, body).unwrap();
  path
}

fn ctx(fetched: Vec<Payload>) -> BindingContext {
  BindingContext::build(
    Arc::new(StaticSource::new(fetched)),
    ReceiverLog::new("rest-poller", "decode.sh").for_cycle(4),
  )
}

fn output(line: &str) -> Payload {
  match parse_script_line(line).unwrap() {
    ScriptLine::Output(p) => p,
    other => panic!("expected an output entry, got {other:?}"),
  }
}

fn on_demand(script: PathBuf) -> ScriptDecoder {
  ScriptDecoder::new(script).with_fetch_mode(FetchMode::OnDemand)
}

#[test]
fn parse_text_line() {
  let p = output(r#"{"text":"hello","metadata":{"seq":"1"}}"#);
  assert_eq!(p.data.as_ref(), b"hello");
  assert_eq!(p.metadata_value("seq"), Some("1"));
}

#[test]
fn parse_base64_line() {
  let p = output(r#"{"payload":"AP8="}"#);
  assert_eq!(p.data.as_ref(), &[0x00, 0xff]);
  assert!(p.metadata.is_none());
}

#[test]
fn parse_rejects_ambiguous_and_empty_lines() {
  assert!(parse_script_line(r#"{"payload":"AA==","text":"x"}"#).is_err());
  assert!(parse_script_line(r#"{"metadata":{}}"#).is_err());
  assert!(parse_script_line("not json").is_err());
  assert!(parse_script_line(r#"{"payload":"***"}"#).is_err());
}

#[test]
fn parse_fetch_request() {
  assert_eq!(
    parse_script_line(r#"{"fetch":"devices/7"}"#),
    Ok(ScriptLine::Fetch("devices/7".to_string()))
  );
  assert_eq!(parse_script_line(r#"{"fetch":""}"#), Ok(ScriptLine::Fetch(String::new())));
  assert!(parse_script_line(r#"{"fetch":"x","text":"y"}"#).is_err());
}

#[test]
fn reply_lines_carry_payloads_or_error() {
  let ok = encode_reply(&Ok(vec![Payload::new("hi").meta("k", "v")]));
  assert!(ok.ends_with('\n'));
  let ok: serde_json::Value = serde_json::from_str(ok.trim_end()).unwrap();
  assert_eq!(ok["payloads"][0]["payload"], "aGk=");
  assert_eq!(ok["payloads"][0]["metadata"]["k"], "v");

  let empty: serde_json::Value = serde_json::from_str(encode_reply(&Ok(vec![])).trim_end()).unwrap();
  assert_eq!(empty["payloads"], serde_json::json!([]));

  let err = encode_reply(&Err(FetchError::Status { status: 503 }));
  let err: serde_json::Value = serde_json::from_str(err.trim_end()).unwrap();
  assert_eq!(err["error"], "source returned status 503");
}

#[test]
fn encode_input_is_one_line_per_payload() {
  let input = encode_input(&[Payload::new("hi").meta("k", "v"), Payload::new("yo")]);
  let lines: Vec<&str> = input.lines().collect();
  assert_eq!(lines.len(), 2);
  let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
  assert_eq!(first["payload"], "aGk=");
  assert_eq!(first["metadata"]["k"], "v");
  let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
  assert!(second["metadata"].is_null());
}

#[test]
fn from_config_uses_script_reference() {
  let config = ReceiverConfig::new("r", "http://localhost/x", 10, "scripts/poll.sh");
  let decoder = ScriptDecoder::from_config(&config.validate().unwrap());
  assert_eq!(decoder.script(), std::path::Path::new("scripts/poll.sh"));
  assert_eq!(decoder.kind(), "script");
  assert_eq!(decoder.fetch_mode(), FetchMode::Prefetch);
}

#[tokio::test]
async fn echoed_input_comes_back_as_outputs() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(&dir, "cat\n");
  let fetched = vec![Payload::new("one").meta("seq", "1"), Payload::new(vec![0_u8, 1, 2])];
  let mut c = ctx(fetched.clone());
  ScriptDecoder::new(script).decode(&mut c).await.unwrap();
  assert_eq!(c.into_outputs(), fetched);
}

#[tokio::test]
async fn text_entries_with_metadata() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(
    &dir,
    "echo '{\"text\":\"hello\",\"metadata\":{\"seq\":\"1\"}}'\necho ''\necho '{\"text\":\"world\"}'\n",
  );
  let mut c = ctx(vec![]);
  ScriptDecoder::new(script).decode(&mut c).await.unwrap();
  let out = c.into_outputs();
  assert_eq!(out.len(), 2);
  assert_eq!(out[0].data.as_ref(), b"hello");
  assert_eq!(out[0].metadata_value("seq"), Some("1"));
  assert_eq!(out[1].data.as_ref(), b"world");
}

#[tokio::test]
async fn failing_script_keeps_partial_outputs() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(
    &dir,
    "echo '{\"text\":\"a\"}'\necho '{\"text\":\"b\"}'\necho 'about to fail' >&2\nexit 3\n",
  );
  let mut c = ctx(vec![]);
  let err = ScriptDecoder::new(script).decode(&mut c).await.unwrap_err();
  assert!(matches!(err, DecodeError::ScriptExit { code: Some(3), .. }));
  assert_eq!(c.outputs.len(), 2);
}

#[tokio::test]
async fn invalid_line_stops_reading() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(&dir, "echo '{\"text\":\"a\"}'\necho garbage\necho '{\"text\":\"c\"}'\n");
  let mut c = ctx(vec![]);
  let err = ScriptDecoder::new(script).decode(&mut c).await.unwrap_err();
  match err {
    DecodeError::InvalidOutput { line, .. } => assert_eq!(line, 2),
    other => panic!("unexpected error: {other:?}"),
  }
  assert_eq!(c.outputs.len(), 1);
}

#[tokio::test]
async fn environment_is_sandboxed() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(
    &dir,
    "echo \"{\\\"text\\\":\\\"$RECEIVER_NAME/$CYCLE_ID/${HOME:-none}\\\"}\"\n",
  );
  let mut c = ctx(vec![]);
  ScriptDecoder::new(script).decode(&mut c).await.unwrap();
  let out = c.into_outputs();
  assert_eq!(out[0].data.as_ref(), b"rest-poller/4/none");
}

#[tokio::test]
async fn missing_script_fails_cycle() {
  let dir = tempfile::tempdir().unwrap();
  let mut c = ctx(vec![]);
  let err = ScriptDecoder::new(dir.path().join("absent.sh"))
    .decode(&mut c)
    .await
    .unwrap_err();
  assert!(matches!(err, DecodeError::ScriptExit { .. }));
}

#[tokio::test]
async fn missing_interpreter_is_spawn_error() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(&dir, "true\n");
  let mut c = ctx(vec![]);
  let err = ScriptDecoder::new(script)
    .with_interpreter("/nonexistent/interpreter")
    .decode(&mut c)
    .await
    .unwrap_err();
  assert!(matches!(err, DecodeError::Spawn { .. }));
}

#[tokio::test]
async fn prefetch_failure_skips_script() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(&dir, "echo '{\"text\":\"never\"}'\n");
  let mut c = BindingContext::build(
    Arc::new(FailingSource::new(FetchError::Status { status: 500 })),
    ReceiverLog::new("r", "s").for_cycle(1),
  );
  let err = ScriptDecoder::new(script).decode(&mut c).await.unwrap_err();
  assert!(err.is_fetch());
  assert!(c.outputs.is_empty());
}

#[tokio::test]
async fn fetch_request_in_prefetch_mode_is_invalid() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(&dir, "echo '{\"fetch\":\"devices\"}'\n");
  let mut c = ctx(vec![]);
  let err = ScriptDecoder::new(script).decode(&mut c).await.unwrap_err();
  assert!(matches!(err, DecodeError::InvalidOutput { line: 1, .. }));
}

const TWO_FETCHES: &str = r#"echo '{"fetch":"devices/1"}'
read -r first
echo '{"fetch":"devices/2"}'
read -r second
for reply in "$first" "$second"; do
  b64=$(printf '%s\n' "$reply" | sed 's/.*"payload":"\([^"]*\)".*/\1/')
  printf '{"payload":"%s","metadata":{"via":"fetch"}}\n' "$b64"
done
"#;

#[tokio::test]
async fn script_issues_its_own_fetches() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(&dir, TWO_FETCHES);
  let source = Arc::new(
    PathSource::new()
      .route("devices/1", vec![Payload::new("temp=21")])
      .route("devices/2", vec![Payload::new("temp=19")]),
  );
  let mut c = BindingContext::build(source.clone(), ReceiverLog::new("r", "s").for_cycle(1));

  on_demand(script).decode(&mut c).await.unwrap();

  assert_eq!(source.requested(), vec!["devices/1", "devices/2"]);
  let out = c.into_outputs();
  assert_eq!(out.len(), 2);
  assert_eq!(out[0].data.as_ref(), b"temp=21");
  assert_eq!(out[1].data.as_ref(), b"temp=19");
  assert_eq!(out[1].metadata_value("via"), Some("fetch"));
}

#[tokio::test]
async fn script_without_fetches_never_touches_source() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(&dir, "echo '{\"text\":\"heartbeat\"}'\n");
  let source = Arc::new(PathSource::new());
  let mut c = BindingContext::build(source.clone(), ReceiverLog::new("r", "s").for_cycle(1));

  on_demand(script).decode(&mut c).await.unwrap();

  assert!(source.requested().is_empty());
  assert_eq!(c.into_outputs(), vec![Payload::new("heartbeat")]);
}

#[tokio::test]
async fn on_demand_script_runs_even_when_source_is_down() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(
    &dir,
    r#"echo '{"fetch":""}'
read -r reply
case "$reply" in *'"error"'*) echo '{"text":"source down"}' ;; esac
"#,
  );
  let mut c = BindingContext::build(
    Arc::new(FailingSource::new(FetchError::Status { status: 500 })),
    ReceiverLog::new("r", "s").for_cycle(1),
  );

  on_demand(script).decode(&mut c).await.unwrap();
  assert_eq!(c.into_outputs(), vec![Payload::new("source down")]);
}

#[tokio::test]
async fn script_giving_up_after_failed_fetch_is_fetch_error() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(
    &dir,
    r#"echo '{"fetch":"devices/9"}'
read -r reply
case "$reply" in *'"error"'*) echo "no data: $reply" >&2; exit 1 ;; esac
"#,
  );
  let mut c = BindingContext::build(Arc::new(PathSource::new()), ReceiverLog::new("r", "s").for_cycle(1));

  let err = on_demand(script).decode(&mut c).await.unwrap_err();
  assert_eq!(err, DecodeError::Fetch(FetchError::Status { status: 404 }));
  assert!(c.outputs.is_empty());
}
