//! Subprocess doc-writing adapter.
//!
//! Invokes a configured command once per document: the request is
//! serialized as JSON on the child's stdin and the artifact content is
//! read from stdout. A non-zero exit is an agent failure for that
//! document alone.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use docwave_core::writer::{DocArtifact, DocRequest, DocWriter};

pub struct CommandWriter {
    program: String,
    args: Vec<String>,
    out_dir: Option<PathBuf>,
}

impl CommandWriter {
    /// Split a shell-style command line into program and arguments.
    /// When `out_dir` is set, each artifact is also written to
    /// `<out_dir>/<doc_id>.md`.
    pub fn new(command_line: &str, out_dir: Option<PathBuf>) -> Result<Self> {
        let mut parts = shell_words::split(command_line)
            .with_context(|| format!("failed to parse writer command: {command_line:?}"))?;
        if parts.is_empty() {
            bail!("writer command is empty");
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
            out_dir,
        })
    }
}

#[async_trait]
impl DocWriter for CommandWriter {
    fn name(&self) -> &str {
        "command"
    }

    async fn write(&self, request: &DocRequest) -> Result<DocArtifact> {
        let payload = serde_json::to_vec(request).context("failed to serialize doc request")?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("DOCWAVE_DOC_ID", &request.doc_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "failed to spawn writer command {:?} for {}",
                    self.program, request.doc_id
                )
            })?;

        // Write the request and close stdin so the writer starts.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .context("failed to write request to writer stdin")?;
            drop(stdin);
        }

        // Read both pipes while waiting so a chatty writer cannot fill the
        // pipe buffer and deadlock.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let read_stdout = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stdout_pipe {
                pipe.read_to_end(&mut buf).await.ok();
            }
            String::from_utf8_lossy(&buf).into_owned()
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stderr_pipe {
                pipe.read_to_end(&mut buf).await.ok();
            }
            String::from_utf8_lossy(&buf).into_owned()
        };

        let (status, stdout, stderr) = tokio::join!(child.wait(), read_stdout, read_stderr);
        let status = status
            .with_context(|| format!("failed to wait on writer for {}", request.doc_id))?;

        if !status.success() {
            bail!(
                "writer exited with {} for {}: {}",
                status,
                request.doc_id,
                snippet(&stderr, 1024)
            );
        }

        let artifact = DocArtifact {
            doc_id: request.doc_id.clone(),
            content: stdout,
        };

        if let Some(dir) = &self.out_dir {
            let path = dir.join(format!("{}.md", request.doc_id));
            tokio::fs::write(&path, &artifact.content)
                .await
                .with_context(|| format!("failed to write artifact to {}", path.display()))?;
        }

        Ok(artifact)
    }
}

/// Truncate a string to at most `max_bytes` bytes, appending "..." if
/// truncated.
fn snippet(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.trim_end().to_owned();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = s[..end].to_owned();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(doc_id: &str) -> DocRequest {
        DocRequest {
            doc_id: doc_id.to_owned(),
            title: "Test Document".to_owned(),
            wave: 1,
            decisions: vec![],
            context: vec![],
        }
    }

    #[test]
    fn rejects_empty_command() {
        assert!(CommandWriter::new("", None).is_err());
        assert!(CommandWriter::new("   ", None).is_err());
    }

    #[tokio::test]
    async fn captures_stdout_as_artifact() {
        let writer =
            CommandWriter::new("sh -c 'cat >/dev/null; echo generated'", None).expect("should parse");
        let artifact = writer
            .write(&request("overview"))
            .await
            .expect("should succeed");
        assert_eq!(artifact.doc_id, "overview");
        assert_eq!(artifact.content.trim(), "generated");
    }

    #[tokio::test]
    async fn request_json_arrives_on_stdin() {
        // `cat` echoes the request back; the artifact content must parse as
        // the request we sent.
        let writer = CommandWriter::new("cat", None).expect("should parse");
        let sent = request("api-reference");
        let artifact = writer.write(&sent).await.expect("should succeed");
        let received: DocRequest =
            serde_json::from_str(&artifact.content).expect("stdin should carry the request JSON");
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error_with_stderr() {
        let writer = CommandWriter::new("sh -c 'cat >/dev/null; echo boom >&2; exit 3'", None)
            .expect("should parse");
        let err = writer.write(&request("overview")).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("boom"), "got: {message}");
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let writer =
            CommandWriter::new("this_command_does_not_exist_docwave_test", None).expect("should parse");
        assert!(writer.write(&request("overview")).await.is_err());
    }

    #[tokio::test]
    async fn writes_artifact_into_out_dir() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let writer = CommandWriter::new(
            "sh -c 'cat >/dev/null; echo persisted'",
            Some(dir.path().to_path_buf()),
        )
        .expect("should parse");

        writer
            .write(&request("data-model"))
            .await
            .expect("should succeed");

        let content = std::fs::read_to_string(dir.path().join("data-model.md"))
            .expect("artifact file should exist");
        assert_eq!(content.trim(), "persisted");
    }

    #[test]
    fn snippet_truncates_long_output() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("abcdefghij", 5), "abcde...");
    }
}
