//! The `DocWriter` trait -- the adapter interface for external doc-writing
//! agents.
//!
//! The scheduler hands a writer one request per manifest entry and awaits a
//! single success/failure result; it never inspects agent internals. The
//! trait is object-safe so schedulers can hold `Arc<dyn DocWriter>`.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::decision::DecisionRecord;

/// Everything an agent needs to write one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRequest {
    /// Manifest entry id (per-feature instances carry their suffix).
    pub doc_id: String,
    /// Human-readable document title.
    pub title: String,
    /// The wave this document belongs to.
    pub wave: u8,
    /// The decision record for each required topic, in requirement order.
    pub decisions: Vec<DecisionRecord>,
    /// Prior-wave artifacts this document type declared as context.
    #[serde(default)]
    pub context: Vec<DocArtifact>,
}

/// The product of a successful agent invocation. This core does not define
/// the content's internal shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocArtifact {
    pub doc_id: String,
    pub content: String,
}

/// Adapter interface for doc-writing agents.
///
/// Implementors wrap whatever produces prose (an LLM CLI, an HTTP service,
/// a template engine) behind a single awaitable call.
#[async_trait]
pub trait DocWriter: Send + Sync {
    /// Human-readable name for this writer (e.g. "command").
    fn name(&self) -> &str;

    /// Generate one document. An `Err` is recorded as an agent failure for
    /// that entry alone.
    async fn write(&self, request: &DocRequest) -> Result<DocArtifact>;
}

// Compile-time assertion: DocWriter must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn DocWriter) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    /// A trivial writer that echoes the request, used only to prove the
    /// trait can be implemented and used as `dyn DocWriter`.
    struct EchoWriter;

    #[async_trait]
    impl DocWriter for EchoWriter {
        fn name(&self) -> &str {
            "echo"
        }

        async fn write(&self, request: &DocRequest) -> Result<DocArtifact> {
            Ok(DocArtifact {
                doc_id: request.doc_id.clone(),
                content: format!("# {}\n", request.title),
            })
        }
    }

    #[test]
    fn writer_is_object_safe() {
        let writer: Box<dyn DocWriter> = Box::new(EchoWriter);
        assert_eq!(writer.name(), "echo");
    }

    #[tokio::test]
    async fn echo_writer_produces_artifact() {
        let writer: Box<dyn DocWriter> = Box::new(EchoWriter);
        let request = DocRequest {
            doc_id: "project-overview".to_owned(),
            title: "Project Overview".to_owned(),
            wave: 1,
            decisions: vec![],
            context: vec![],
        };

        let artifact = writer.write(&request).await.expect("should write");
        assert_eq!(artifact.doc_id, "project-overview");
        assert!(artifact.content.contains("Project Overview"));
    }

    #[test]
    fn request_json_roundtrip() {
        let request = DocRequest {
            doc_id: "api-reference".to_owned(),
            title: "API Reference".to_owned(),
            wave: 2,
            decisions: vec![],
            context: vec![DocArtifact {
                doc_id: "architecture".to_owned(),
                content: "...".to_owned(),
            }],
        };
        let json = serde_json::to_string(&request).expect("should serialize");
        let back: DocRequest = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back, request);
    }
}
