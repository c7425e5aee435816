//! Line-delimited JSON protocol spoken with the interpreter driver.
//!
//! Every request carries a monotonically increasing id. Responses with an id
//! lower than the pending request belong to an abandoned exchange and are
//! discarded.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{InterpreterError, InterpreterResult};
use crate::outcome::{CapturedResult, ExecutionFailure};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Request {
    Exec {
        code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        deadline_ms: Option<u64>,
    },
    Get {
        name: String,
    },
    Set {
        name: String,
        value: Value,
    },
    Names,
    Reset,
    Ping,
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ErrorPayload {
    pub(crate) kind: String,
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) traceback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Response {
    pub(crate) id: u64,
    pub(crate) status: ResponseStatus,
    #[serde(default)]
    pub(crate) stdout: String,
    #[serde(default)]
    pub(crate) stderr: String,
    #[serde(default)]
    pub(crate) error: Option<ErrorPayload>,
    #[serde(default)]
    pub(crate) found: bool,
    #[serde(default)]
    pub(crate) value: Value,
    #[serde(default)]
    pub(crate) names: Vec<String>,
}

impl Response {
    /// Converts an `exec` answer into a captured result.
    pub(crate) fn into_captured(self) -> InterpreterResult<CapturedResult> {
        match self.status {
            ResponseStatus::Ok => Ok(CapturedResult::success(self.stdout, self.stderr)),
            ResponseStatus::Error => {
                let payload = self.error.ok_or_else(|| InterpreterError::Protocol {
                    reason: format!("response {} has error status without details", self.id),
                })?;
                let mut failure = ExecutionFailure::new(payload.kind, payload.message);
                if let Some(traceback) = payload.traceback {
                    failure = failure.with_traceback(traceback);
                }
                Ok(CapturedResult::failure(self.stdout, self.stderr, failure))
            }
        }
    }

    /// Returns the error message of a failed non-`exec` answer.
    pub(crate) fn error_message(&self) -> Option<String> {
        match self.status {
            ResponseStatus::Ok => None,
            ResponseStatus::Error => Some(
                self.error
                    .as_ref()
                    .map_or_else(|| "unspecified error".to_owned(), |e| e.message.clone()),
            ),
        }
    }
}

/// Writes one request line and flushes it.
pub(crate) async fn write_request<W>(writer: &mut W, id: u64, request: &Request) -> InterpreterResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(&Envelope { id, request })?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads lines until the response for `expected` arrives.
///
/// `pending` holds bytes of a partially read line and must persist between
/// calls; reading is cancel-safe as long as the same buffer is reused.
pub(crate) async fn read_response<R>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    expected: u64,
) -> InterpreterResult<Response>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let read = reader.read_until(b'\n', pending).await?;
        if read == 0 {
            return Err(InterpreterError::Exited);
        }
        if pending.last() != Some(&b'\n') {
            continue;
        }

        let line = std::mem::take(pending);
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        let response: Response =
            serde_json::from_slice(trimmed).map_err(|err| InterpreterError::Protocol {
                reason: format!("malformed response: {err}"),
            })?;

        match response.id.cmp(&expected) {
            Ordering::Less => {
                debug!(stale = response.id, expected, "discarding stale interpreter response");
            }
            Ordering::Equal => return Ok(response),
            Ordering::Greater => {
                return Err(InterpreterError::Protocol {
                    reason: format!(
                        "response id {} is ahead of pending request {expected}",
                        response.id
                    ),
                });
            }
        }
    }
}
