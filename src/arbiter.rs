//! Semantic merge arbitration.
//!
//! Files the auto-merge engine cannot resolve are delegated to the
//! external reasoning engine: one structured prompt per file, issued
//! through a worker pool with bounded concurrency and a per-call timeout.
//! Responses must be strict JSON (fences and surrounding prose are
//! tolerated and stripped); any deviation marks the file unresolved —
//! the arbiter never falls back to an arbitrary side.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::classify;
use crate::config::EngineConfig;
use crate::edit::EditOperation;
use crate::engine::{EngineRequest, ReasoningEngine};
use crate::error::{Error, Result};
use crate::group::FileConflictContext;
use crate::hunk::apply_hunks;
use crate::outcome::{IntegratorInput, IntegratorOutput, MergedFile, MergeStrategy, UnresolvedFile};
use crate::progress::CancelToken;

/// Version tag for the fixed system instruction; bump when the prompt
/// contract changes.
pub const PROMPT_VERSION: &str = "ei.arbiter.v1";

const SYSTEM_PROMPT: &str = "\
You are a merge arbiter for concurrent code edits. Multiple autonomous \
agents edited the same file from a common base; their changes overlap and \
could not be merged mechanically. Decide how to combine them.

Respond with a single JSON object and nothing else:
{
  \"strategy\": \"MERGE_BOTH\" | \"REFACTOR\" | \"TAKE_A\" | \"TAKE_B\",
  \"merged_content\": \"<the complete merged file content>\",
  \"reasoning\": \"<one or two sentences explaining the decision>\"
}

Preserve the intent of every edit when possible (MERGE_BOTH or REFACTOR). \
Choose TAKE_A or TAKE_B only when the edits are mutually exclusive. Do not \
invent changes no agent proposed.";

/// Pool limits for the arbitration fan-out.
#[derive(Debug, Clone, Copy)]
pub struct ArbiterOptions {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for ArbiterOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            concurrency: 4,
        }
    }
}

impl From<&EngineConfig> for ArbiterOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            concurrency: config.concurrency.max(1),
        }
    }
}

/// A validated engine decision for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbiterResolution {
    pub strategy: MergeStrategy,
    pub merged_content: String,
    pub reasoning: String,
}

/// Build the structured prompt for one unresolved file.
pub fn build_request(context: &FileConflictContext) -> EngineRequest {
    let mut user = String::new();
    user.push_str(&format!("File: {}\n\n", context.file_path));
    user.push_str("Original content (common base):\n");
    user.push_str("```\n");
    user.push_str(&context.original_content);
    if !context.original_content.ends_with('\n') && !context.original_content.is_empty() {
        user.push('\n');
    }
    user.push_str("```\n");

    for (index, edit) in context.edits.iter().enumerate() {
        let side = side_label(index);
        user.push_str(&format!(
            "\nEdit {side} (agent {}, operation {}):\n",
            edit.agent_id,
            edit.operation.label()
        ));
        if let Some(rationale) = &edit.rationale {
            user.push_str(&format!("Stated intent: {rationale}\n"));
        }
        user.push_str(&edit_result_block(context, edit));
    }

    user.push_str("\nProduce the merged file per the response contract.\n");

    EngineRequest {
        system: format!("{SYSTEM_PROMPT}\n\nResponse contract version: {PROMPT_VERSION}"),
        user,
    }
}

fn side_label(index: usize) -> String {
    // A, B, C... matches the TAKE_A / TAKE_B strategy vocabulary.
    let letter = (b'A' + (index % 26) as u8) as char;
    letter.to_string()
}

fn edit_result_block(context: &FileConflictContext, edit: &crate::edit::EditStreamEntry) -> String {
    match edit.operation {
        EditOperation::Delete => "Proposed result: delete the file.\n".to_string(),
        EditOperation::Rename => format!(
            "Proposed result: rename the file to {}.\n",
            edit.rename_to.as_deref().unwrap_or("<missing target>")
        ),
        EditOperation::Create | EditOperation::Update => {
            let resulting = if edit.has_hunks() {
                let hunks = edit.diff_hunks.as_deref().unwrap_or_default();
                apply_hunks(&context.file_path, &context.original_content, hunks)
                    .unwrap_or_else(|err| format!("<hunks not mechanically applicable: {err}>"))
            } else {
                edit.new_content.clone().unwrap_or_default()
            };
            let mut block = String::from("Proposed result:\n```\n");
            block.push_str(&resulting);
            if !resulting.ends_with('\n') && !resulting.is_empty() {
                block.push('\n');
            }
            block.push_str("```\n");
            block
        }
    }
}

/// Parse and validate one raw engine response.
///
/// Tolerates code fences and prose around the JSON object, but the object
/// itself must carry every required field with a recognized strategy.
pub fn parse_response(file_path: &str, raw: &str) -> Result<ArbiterResolution> {
    let value = extract_json(raw)?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::ArbitrationParse("response is not a JSON object".to_string()))?;

    if let Some(reported) = object.get("file_path").and_then(|v| v.as_str()) {
        if reported != file_path {
            return Err(Error::ArbitrationParse(format!(
                "response names '{reported}' but '{file_path}' was requested"
            )));
        }
    }

    let strategy = match object.get("strategy").and_then(|v| v.as_str()) {
        Some("MERGE_BOTH") => MergeStrategy::MergeBoth,
        Some("REFACTOR") => MergeStrategy::Refactor,
        Some("TAKE_A") => MergeStrategy::TakeA,
        Some("TAKE_B") => MergeStrategy::TakeB,
        Some("AUTO") => {
            return Err(Error::ArbitrationParse(
                "engine may not report AUTO; that label is reserved for mechanical merges"
                    .to_string(),
            ))
        }
        Some(other) => {
            return Err(Error::ArbitrationParse(format!(
                "unknown strategy '{other}'"
            )))
        }
        None => {
            return Err(Error::ArbitrationParse(
                "missing required field 'strategy'".to_string(),
            ))
        }
    };

    let merged_content = object
        .get("merged_content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            Error::ArbitrationParse("missing required field 'merged_content'".to_string())
        })?
        .to_string();

    let reasoning = object
        .get("reasoning")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::ArbitrationParse("missing required field 'reasoning'".to_string()))?
        .to_string();

    Ok(ArbiterResolution {
        strategy,
        merged_content,
        reasoning,
    })
}

fn extract_json(raw: &str) -> Result<serde_json::Value> {
    if let Some(block) = fenced_block(raw) {
        if let Ok(value) = serde_json::from_str(block) {
            return Ok(value);
        }
    }

    let first = raw.find('{');
    let last = raw.rfind('}');
    if let (Some(first), Some(last)) = (first, last) {
        if last > first {
            if let Ok(value) = serde_json::from_str(raw[first..=last].trim()) {
                return Ok(value);
            }
        }
    }

    Err(Error::ArbitrationParse(
        "no parseable JSON object in response".to_string(),
    ))
}

fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after_open = &raw[open + 3..];
    // Skip an optional language tag up to the first newline.
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// Arbitrate every context in the input through the engine pool.
///
/// `on_file` fires once per finished file, resolved or not, so callers can
/// surface per-file progress. Results are sorted by path for determinism
/// regardless of completion order.
pub async fn arbitrate<E>(
    input: IntegratorInput,
    engine: Arc<E>,
    options: ArbiterOptions,
    cancel: CancelToken,
    mut on_file: impl FnMut(&str),
) -> IntegratorOutput
where
    E: ReasoningEngine + 'static,
{
    let mut output = IntegratorOutput::new();
    let semaphore = Arc::new(Semaphore::new(options.concurrency));
    let timeout_secs = options.timeout.as_secs();
    let mut tasks: JoinSet<(String, Vec<crate::classify::ConflictType>, Result<ArbiterResolution>)> =
        JoinSet::new();

    for context in input.contexts {
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let timeout = options.timeout;
        let conflict_types = classify::classify_context(&context);
        let request = build_request(&context);
        let file_path = context.file_path.clone();

        tasks.spawn(async move {
            let result = resolve_one(
                &file_path,
                request,
                engine,
                semaphore,
                cancel,
                timeout,
                timeout_secs,
            )
            .await;
            (file_path, conflict_types, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (file_path, conflict_types, result) = match joined {
            Ok(done) => done,
            Err(err) => {
                tracing::warn!(error = %err, "arbitration task aborted");
                continue;
            }
        };

        on_file(&file_path);
        match result {
            Ok(resolution) => output.push_merged(MergedFile {
                file_path,
                content: Some(resolution.merged_content),
                renamed_to: None,
                strategy: resolution.strategy,
                reasoning: resolution.reasoning,
            }),
            Err(err) => output.push_unresolved(UnresolvedFile {
                file_path,
                conflict_types,
                error: err.to_string(),
            }),
        }
    }

    output.merged_files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    output.unresolved.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    output
}

async fn resolve_one<E: ReasoningEngine>(
    file_path: &str,
    request: EngineRequest,
    engine: Arc<E>,
    semaphore: Arc<Semaphore>,
    cancel: CancelToken,
    timeout: Duration,
    timeout_secs: u64,
) -> Result<ArbiterResolution> {
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|_| Error::OperationFailed("arbiter pool closed".to_string()))?;

    if cancel.is_cancelled() {
        return Err(Error::OperationFailed(
            "merge run cancelled before arbitration".to_string(),
        ));
    }

    tracing::debug!(file = file_path, "dispatching arbitration call");
    let raw = tokio::time::timeout(timeout, engine.resolve(request))
        .await
        .map_err(|_| Error::EngineTimeout(timeout_secs))??;

    parse_response(file_path, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::EditStreamEntry;
    use crate::hunk::DiffHunk;

    fn conflicted_context() -> FileConflictContext {
        let a = EditStreamEntry::new("agent-a", "server.go", EditOperation::Update)
            .with_hunks(vec![DiffHunk::replace_line(2, "line 2", "limit = 20")])
            .with_rationale("raise the page limit");
        let b = EditStreamEntry::new("agent-b", "server.go", EditOperation::Update)
            .with_hunks(vec![DiffHunk::replace_line(2, "line 2", "limit = 50")]);
        FileConflictContext {
            file_path: "server.go".to_string(),
            original_content: "line 1\nline 2\nline 3\n".to_string(),
            edits: vec![a, b],
        }
    }

    #[test]
    fn request_interpolates_base_edits_and_rationale() {
        let request = build_request(&conflicted_context());
        assert!(request.system.contains("merge arbiter"));
        assert!(request.user.contains("File: server.go"));
        assert!(request.user.contains("line 2"));
        assert!(request.user.contains("limit = 20"));
        assert!(request.user.contains("limit = 50"));
        assert!(request.user.contains("raise the page limit"));
        assert!(request.user.contains("Edit A (agent agent-a"));
        assert!(request.user.contains("Edit B (agent agent-b"));
    }

    #[test]
    fn request_describes_delete_and_rename_sides() {
        let delete = EditStreamEntry::new("agent-a", "legacy.py", EditOperation::Delete);
        let rename = EditStreamEntry::new("agent-b", "legacy.py", EditOperation::Rename)
            .with_rename_to("modern.py");
        let context = FileConflictContext {
            file_path: "legacy.py".to_string(),
            original_content: "x\n".to_string(),
            edits: vec![delete, rename],
        };

        let request = build_request(&context);
        assert!(request.user.contains("delete the file"));
        assert!(request.user.contains("rename the file to modern.py"));
    }

    #[test]
    fn parses_fenced_response_with_prose() {
        let raw = "Here is my decision after weighing both edits.\n\
                   ```json\n\
                   {\"strategy\": \"MERGE_BOTH\", \"merged_content\": \"merged\\n\", \"reasoning\": \"both edits are compatible\"}\n\
                   ```\n\
                   Let me know if you need anything else.";
        let resolution = parse_response("server.go", raw).unwrap();
        assert_eq!(resolution.strategy, MergeStrategy::MergeBoth);
        assert_eq!(resolution.merged_content, "merged\n");
        assert_eq!(resolution.reasoning, "both edits are compatible");
    }

    #[test]
    fn parses_bare_json_with_surrounding_prose() {
        let raw = "Decision: {\"strategy\": \"TAKE_B\", \"merged_content\": \"b\", \"reasoning\": \"A is stale\"} done.";
        let resolution = parse_response("f.rs", raw).unwrap();
        assert_eq!(resolution.strategy, MergeStrategy::TakeB);
    }

    #[test]
    fn missing_field_is_rejected() {
        let raw = "{\"strategy\": \"REFACTOR\", \"reasoning\": \"rewrote the block\"}";
        let err = parse_response("f.rs", raw).unwrap_err();
        match err {
            Error::ArbitrationParse(msg) => assert!(msg.contains("merged_content")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn auto_strategy_is_rejected() {
        let raw = "{\"strategy\": \"AUTO\", \"merged_content\": \"x\", \"reasoning\": \"r\"}";
        assert!(matches!(
            parse_response("f.rs", raw),
            Err(Error::ArbitrationParse(_))
        ));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let raw = "{\"strategy\": \"KEEP_BOTH\", \"merged_content\": \"x\", \"reasoning\": \"r\"}";
        assert!(matches!(
            parse_response("f.rs", raw),
            Err(Error::ArbitrationParse(_))
        ));
    }

    #[test]
    fn path_mismatch_is_rejected() {
        let raw = "{\"file_path\": \"other.rs\", \"strategy\": \"TAKE_A\", \"merged_content\": \"x\", \"reasoning\": \"r\"}";
        assert!(matches!(
            parse_response("f.rs", raw),
            Err(Error::ArbitrationParse(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_response("f.rs", "I could not decide, sorry."),
            Err(Error::ArbitrationParse(_))
        ));
    }

    mod pool {
        use super::*;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct ScriptedEngine {
            response: String,
            in_flight: Arc<AtomicUsize>,
            max_in_flight: Arc<AtomicUsize>,
            delay: Duration,
        }

        impl ScriptedEngine {
            fn answering(response: &str) -> Self {
                Self {
                    response: response.to_string(),
                    in_flight: Arc::new(AtomicUsize::new(0)),
                    max_in_flight: Arc::new(AtomicUsize::new(0)),
                    delay: Duration::from_millis(20),
                }
            }
        }

        impl ReasoningEngine for ScriptedEngine {
            fn resolve(
                &self,
                _request: EngineRequest,
            ) -> impl std::future::Future<Output = Result<String>> + Send {
                let response = self.response.clone();
                let in_flight = Arc::clone(&self.in_flight);
                let max_in_flight = Arc::clone(&self.max_in_flight);
                let delay = self.delay;
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(response)
                }
            }
        }

        fn contexts(count: usize) -> Vec<FileConflictContext> {
            (0..count)
                .map(|index| {
                    let mut context = conflicted_context();
                    context.file_path = format!("file-{index}.go");
                    for edit in &mut context.edits {
                        edit.file_path = context.file_path.clone();
                    }
                    context
                })
                .collect()
        }

        #[tokio::test]
        async fn pool_bounds_in_flight_calls() {
            let engine = Arc::new(ScriptedEngine::answering(
                "{\"strategy\": \"TAKE_A\", \"merged_content\": \"a\", \"reasoning\": \"r\"}",
            ));
            let max_in_flight = Arc::clone(&engine.max_in_flight);

            let options = ArbiterOptions {
                timeout: Duration::from_secs(5),
                concurrency: 2,
            };
            let output = arbitrate(
                IntegratorInput {
                    contexts: contexts(8),
                },
                engine,
                options,
                CancelToken::new(),
                |_| {},
            )
            .await;

            assert!(output.success);
            assert_eq!(output.merged_files.len(), 8);
            assert!(max_in_flight.load(Ordering::SeqCst) <= 2);
        }

        #[tokio::test]
        async fn timeout_marks_file_unresolved() {
            struct StallingEngine;
            impl ReasoningEngine for StallingEngine {
                fn resolve(
                    &self,
                    _request: EngineRequest,
                ) -> impl std::future::Future<Output = Result<String>> + Send {
                    async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(String::new())
                    }
                }
            }

            let options = ArbiterOptions {
                timeout: Duration::from_millis(20),
                concurrency: 2,
            };
            let output = arbitrate(
                IntegratorInput {
                    contexts: contexts(1),
                },
                Arc::new(StallingEngine),
                options,
                CancelToken::new(),
                |_| {},
            )
            .await;

            assert!(!output.success);
            assert_eq!(output.unresolved.len(), 1);
            assert!(output.unresolved[0].error.contains("timed out"));
        }

        #[tokio::test]
        async fn cancelled_run_leaves_pending_files_unresolved() {
            let engine = Arc::new(ScriptedEngine::answering(
                "{\"strategy\": \"TAKE_A\", \"merged_content\": \"a\", \"reasoning\": \"r\"}",
            ));
            let cancel = CancelToken::new();
            cancel.cancel();

            let output = arbitrate(
                IntegratorInput {
                    contexts: contexts(3),
                },
                engine,
                ArbiterOptions::default(),
                cancel,
                |_| {},
            )
            .await;

            assert!(!output.success);
            assert_eq!(output.unresolved.len(), 3);
            assert!(output.unresolved[0].error.contains("cancelled"));
        }

        #[tokio::test]
        async fn results_are_sorted_by_path() {
            let engine = Arc::new(ScriptedEngine::answering(
                "{\"strategy\": \"REFACTOR\", \"merged_content\": \"x\", \"reasoning\": \"r\"}",
            ));
            let output = arbitrate(
                IntegratorInput {
                    contexts: contexts(5),
                },
                engine,
                ArbiterOptions::default(),
                CancelToken::new(),
                |_| {},
            )
            .await;

            let paths: Vec<&str> = output
                .merged_files
                .iter()
                .map(|file| file.file_path.as_str())
                .collect();
            let mut sorted = paths.clone();
            sorted.sort();
            assert_eq!(paths, sorted);
        }
    }
}
