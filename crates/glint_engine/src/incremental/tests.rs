use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::channel::Receiver;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use glint_core::{AnalysisKey, DocumentId, ProjectId, Span};
use glint_diagnostic::{DiagnosticData, Severity};

use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::DiagnosticsEvent;
use crate::storage::MemoryStorage;
use crate::testing::{TestAnalyzer, SEMANTIC_RULE, SYNTAX_RULE};
use crate::workspace::Solution;

use super::{BuildDiagnostic, IncrementalAnalyzer};

struct Fixture {
    engine: IncrementalAnalyzer,
    solution: Solution,
    analyzer: Arc<TestAnalyzer>,
    events: Receiver<DiagnosticsEvent>,
    project: ProjectId,
    doc: DocumentId,
    token: CancellationToken,
}

/// Route engine logs through the test harness; `RUST_LOG` filters them.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture_with_config(config: EngineConfig, analyzer: TestAnalyzer, text: &str) -> Fixture {
    init_logging();
    let engine = IncrementalAnalyzer::new(config, Arc::new(MemoryStorage::new()));
    let analyzer = Arc::new(analyzer);
    engine.register_host_analyzer("glint", analyzer.clone());
    let mut solution = Solution::new();
    let project = solution.add_project("app", "glint");
    let doc = solution
        .add_document(project, "a.gl", text)
        .unwrap_or_else(|| panic!("document not added"));
    let events = engine.subscribe();
    Fixture {
        engine,
        solution,
        analyzer,
        events,
        project,
        doc,
        token: CancellationToken::none(),
    }
}

fn fixture(analyzer: TestAnalyzer, text: &str) -> Fixture {
    fixture_with_config(EngineConfig::default(), analyzer, text)
}

fn drain(events: &Receiver<DiagnosticsEvent>) -> Vec<DiagnosticsEvent> {
    events.try_iter().collect()
}

fn sorted_spans(items: &[DiagnosticData]) -> Vec<Span> {
    let mut spans: Vec<Span> = items.iter().map(|item| item.span).collect();
    spans.sort_by_key(|span| (span.start, span.end));
    spans
}

#[test]
fn test_analysis_publishes_update_once() {
    let f = fixture(TestAnalyzer::new("t").with_semantics(), "a flag b\n");

    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    let events = drain(&f.events);
    assert_eq!(events.len(), 1);
    match &events[0] {
        DiagnosticsEvent::Updated { key, items } => {
            assert_eq!(&*key.analyzer, "t");
            assert_eq!(key.key, AnalysisKey::from(f.doc));
            assert_eq!(items.len(), 1);
        }
        other => panic!("expected update, got {other:?}"),
    }

    // A second pass over an unchanged workspace is silent.
    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    assert!(drain(&f.events).is_empty());
    assert_eq!(f.analyzer.semantic_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_open_document_repeat_pass_is_silent() {
    let mut f = fixture(TestAnalyzer::new("t").with_semantics(), "a flag b\n");
    // Default retention keeps an open document's results in memory.
    f.solution.open_document(f.doc);

    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    assert_eq!(drain(&f.events).len(), 1);

    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    // The second pass is a pure cache hit: no analyzer run, no event.
    assert!(drain(&f.events).is_empty());
    assert_eq!(f.analyzer.semantic_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_emptied_set_publishes_removal() {
    let mut f = fixture(TestAnalyzer::new("t").with_semantics(), "a flag b\n");
    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    drain(&f.events);

    f.solution.edit_document(f.doc, "a b\n");
    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    let events = drain(&f.events);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], DiagnosticsEvent::Removed { key } if key.key == AnalysisKey::from(f.doc)));
}

#[test]
fn test_project_analysis_slices_by_document() {
    let f = fixture(TestAnalyzer::new("p").with_project(), "a flag b\n");

    let project_diags = f
        .engine
        .get_diagnostics(&f.solution, AnalysisKey::from(f.project), false, &f.token)
        .unwrap_or_else(|e| panic!("query failed: {e}"));
    assert_eq!(project_diags.len(), 1);
    assert!(project_diags[0].is_project_only());

    let doc_diags = f
        .engine
        .get_diagnostics(&f.solution, AnalysisKey::from(f.doc), false, &f.token)
        .unwrap_or_else(|e| panic!("query failed: {e}"));
    assert_eq!(doc_diags.len(), 1);
    assert_eq!(doc_diags[0].document, Some(f.doc));

    // The document query was served from the project run's cached slice.
    assert_eq!(f.analyzer.project_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dependency_edit_invalidates_dependents() {
    let engine = IncrementalAnalyzer::new(EngineConfig::default(), Arc::new(MemoryStorage::new()));
    let analyzer = Arc::new(TestAnalyzer::new("t").with_semantics());
    engine.register_host_analyzer("glint", analyzer.clone());
    let token = CancellationToken::none();

    let mut solution = Solution::new();
    let lib = solution.add_project("lib", "glint");
    let app = solution.add_project("app", "glint");
    solution.add_project_reference(app, lib);
    let lib_doc = solution
        .add_document(lib, "lib.gl", "fn util() {}\n")
        .unwrap_or_else(|| panic!("document not added"));
    let app_doc = solution
        .add_document(app, "app.gl", "a flag b\n")
        .unwrap_or_else(|| panic!("document not added"));

    engine
        .analyze_document(&solution, app_doc, &token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    assert_eq!(analyzer.semantic_runs.load(Ordering::SeqCst), 1);

    solution.edit_document(lib_doc, "fn util() { 2 }\n");
    engine
        .analyze_document(&solution, app_doc, &token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    assert_eq!(analyzer.semantic_runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_remove_document_clears_and_notifies() {
    let mut f = fixture(TestAnalyzer::new("t").with_semantics(), "a flag b\n");
    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    drain(&f.events);

    f.engine
        .remove_document(&f.solution, f.doc)
        .unwrap_or_else(|e| panic!("removal failed: {e}"));
    f.solution.remove_document(f.doc);

    let events = drain(&f.events);
    assert_eq!(events.len(), 1);
    let leaves = events
        .into_iter()
        .flat_map(DiagnosticsEvent::flatten)
        .collect::<Vec<_>>();
    assert!(!leaves.is_empty());
    assert!(leaves
        .iter()
        .all(|event| matches!(event, DiagnosticsEvent::Removed { .. })));
    assert!(!f
        .engine
        .has_cached_diagnostics(&f.solution, AnalysisKey::from(f.doc)));
}

#[test]
fn test_removed_analyzer_clears_its_diagnostics() {
    let engine = IncrementalAnalyzer::new(EngineConfig::default(), Arc::new(MemoryStorage::new()));
    let analyzer = Arc::new(TestAnalyzer::new("extra").with_semantics());
    let token = CancellationToken::none();
    let mut solution = Solution::new();
    let project = solution.add_project("app", "glint");
    let doc = solution
        .add_document(project, "a.gl", "a flag b\n")
        .unwrap_or_else(|| panic!("document not added"));
    solution.add_analyzer_reference(project, analyzer.clone());
    let events = engine.subscribe();

    engine
        .analyze_document(&solution, doc, &token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    assert_eq!(drain(&events).len(), 1);
    assert!(engine.has_cached_diagnostics(&solution, AnalysisKey::from(doc)));

    solution.remove_analyzer_reference(project, "extra");
    engine
        .analyze_document(&solution, doc, &token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    let batch: Vec<DiagnosticsEvent> = drain(&events)
        .into_iter()
        .flat_map(DiagnosticsEvent::flatten)
        .collect();
    assert!(!batch.is_empty());
    assert!(batch
        .iter()
        .all(|event| matches!(event, DiagnosticsEvent::Removed { key } if &*key.analyzer == "extra")));
    assert!(!engine.has_cached_diagnostics(&solution, AnalysisKey::from(doc)));
}

#[test]
fn test_get_diagnostics_for_ids_skips_unrelated_analyzers() {
    let engine = IncrementalAnalyzer::new(EngineConfig::default(), Arc::new(MemoryStorage::new()));
    let semantic = Arc::new(TestAnalyzer::new("semantic").with_semantics());
    let syntax = Arc::new(TestAnalyzer::new("syntax").with_syntax());
    engine.register_host_analyzer("glint", semantic.clone());
    engine.register_host_analyzer("glint", syntax.clone());
    let token = CancellationToken::none();
    let mut solution = Solution::new();
    let project = solution.add_project("app", "glint");
    let doc = solution
        .add_document(project, "a.gl", "a flag b\n")
        .unwrap_or_else(|| panic!("document not added"));

    let items = engine
        .get_diagnostics_for_ids(&solution, AnalysisKey::from(doc), &[SYNTAX_RULE], false, &token)
        .unwrap_or_else(|e| panic!("query failed: {e}"));

    assert_eq!(items.len(), 1);
    assert_eq!(&*items[0].id, SYNTAX_RULE);
    // The semantic analyzer cannot produce the requested id and never ran.
    assert_eq!(semantic.semantic_runs.load(Ordering::SeqCst), 0);
    assert_eq!(syntax.syntax_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_span_query_does_not_populate_caches() {
    let f = fixture(
        TestAnalyzer::new("t").with_span_support(),
        "fn a() { flag }\n\nfn b() { flag }\n",
    );

    let items = f
        .engine
        .get_diagnostics_for_span(&f.solution, f.doc, Span::new(0, 15), false, &f.token)
        .unwrap_or_else(|e| panic!("query failed: {e}"));

    assert_eq!(sorted_spans(&items), vec![Span::new(9, 13)]);
    assert!(!f
        .engine
        .has_cached_diagnostics(&f.solution, AnalysisKey::from(f.doc)));
    assert!(drain(&f.events).is_empty());
}

#[test]
fn test_build_synchronization_replaces_live_results() {
    let f = fixture(TestAnalyzer::new("t").with_semantics(), "a flag b\n");
    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    drain(&f.events);

    let build = vec![
        BuildDiagnostic {
            rule_id: SEMANTIC_RULE.to_string(),
            message: "from build".to_string(),
            document: Some(f.doc),
            span: Some(Span::new(0, 1)),
            position: None,
            severity: None,
        },
        // No analyzer owns this rule; it is dropped.
        BuildDiagnostic {
            rule_id: "ZZ9999".to_string(),
            message: "stray".to_string(),
            document: Some(f.doc),
            span: None,
            position: None,
            severity: None,
        },
    ];

    let needs_live = f
        .engine
        .synchronize_build_diagnostics(&f.solution, f.project, &build)
        .unwrap_or_else(|e| panic!("sync failed: {e}"));
    assert!(needs_live.is_empty());

    let cached = f
        .engine
        .get_cached_diagnostics(&f.solution, AnalysisKey::from(f.doc));
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].message, "from build");

    // Synchronizing the same snapshot again changes nothing.
    drain(&f.events);
    f.engine
        .synchronize_build_diagnostics(&f.solution, f.project, &build)
        .unwrap_or_else(|e| panic!("sync failed: {e}"));
    assert!(drain(&f.events).is_empty());
}

#[test]
fn test_hidden_live_diagnostics_survive_build_sync() {
    let f = fixture(
        TestAnalyzer::new("t")
            .with_semantics()
            .with_marker_severity(Severity::Hidden),
        "a flag b\n",
    );
    // Live analysis leaves one hidden finding in the document state.
    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    let build = vec![BuildDiagnostic {
        rule_id: SEMANTIC_RULE.to_string(),
        message: "from build".to_string(),
        document: Some(f.doc),
        span: Some(Span::new(0, 1)),
        position: None,
        severity: Some(Severity::Error),
    }];
    f.engine
        .synchronize_build_diagnostics(&f.solution, f.project, &build)
        .unwrap_or_else(|e| panic!("sync failed: {e}"));

    // Builds never report hidden findings, so the live one survives the
    // snapshot alongside the build error.
    let cached = f
        .engine
        .get_cached_diagnostics(&f.solution, AnalysisKey::from(f.doc));
    assert_eq!(cached.len(), 2);
    assert!(cached.iter().any(|item| item.severity == Severity::Hidden));
    assert!(cached
        .iter()
        .any(|item| item.severity == Severity::Error && item.message == "from build"));
}

#[test]
fn test_prefer_live_discards_build_results_for_open_documents() {
    let mut f = fixture_with_config(
        EngineConfig::new().with_prefer_live_diagnostics_on_open_files(),
        TestAnalyzer::new("t").with_semantics(),
        "a flag b\n",
    );
    f.solution.open_document(f.doc);
    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    let build = vec![BuildDiagnostic {
        rule_id: SEMANTIC_RULE.to_string(),
        message: "from build".to_string(),
        document: Some(f.doc),
        span: Some(Span::new(0, 1)),
        position: None,
        severity: None,
    }];
    let needs_live = f
        .engine
        .synchronize_build_diagnostics(&f.solution, f.project, &build)
        .unwrap_or_else(|e| panic!("sync failed: {e}"));

    assert_eq!(needs_live, vec![f.doc]);
    // The discarded snapshot forced the document back to recompute.
    assert!(!f
        .engine
        .has_cached_diagnostics(&f.solution, AnalysisKey::from(f.doc)));
}

#[test]
fn test_crash_on_analyzer_failure_config() {
    let f = fixture_with_config(
        EngineConfig::new().with_crash_on_analyzer_failure(),
        TestAnalyzer::new("broken").with_semantics().failing("boom"),
        "a flag b\n",
    );

    let result = f.engine.analyze_document(&f.solution, f.doc, &f.token);
    assert!(matches!(result, Err(EngineError::Internal(_))));
}

#[test]
fn test_document_close_drops_document_results() {
    let mut f = fixture(TestAnalyzer::new("t").with_semantics(), "a flag b\n");
    f.solution.open_document(f.doc);
    f.engine
        .analyze_document(&f.solution, f.doc, &f.token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    assert!(f
        .engine
        .has_cached_diagnostics(&f.solution, AnalysisKey::from(f.doc)));

    f.solution.close_document(f.doc);
    f.engine
        .document_closed(&f.solution, f.doc)
        .unwrap_or_else(|e| panic!("close failed: {e}"));

    assert!(!f
        .engine
        .has_cached_diagnostics(&f.solution, AnalysisKey::from(f.doc)));
    // Lifecycle transitions are not diagnostic changes.
    assert!(drain(&f.events)
        .into_iter()
        .flat_map(DiagnosticsEvent::flatten)
        .filter(|event| matches!(event, DiagnosticsEvent::Removed { .. }))
        .next()
        .is_none());
}

#[test]
fn test_suppressed_diagnostics_are_filtered_by_default() {
    let f = fixture(
        TestAnalyzer::new("t").with_semantics().with_suppressed_markers(),
        "a flag b\n",
    );

    let visible = f
        .engine
        .get_diagnostics(&f.solution, AnalysisKey::from(f.doc), false, &f.token)
        .unwrap_or_else(|e| panic!("query failed: {e}"));
    assert!(visible.is_empty());

    let all = f
        .engine
        .get_diagnostics(&f.solution, AnalysisKey::from(f.doc), true, &f.token)
        .unwrap_or_else(|e| panic!("query failed: {e}"));
    assert_eq!(all.len(), 1);
    assert!(all[0].is_suppressed);
}

#[test]
fn test_project_analysis_only_invokes_supporting_analyzers() {
    let engine = IncrementalAnalyzer::new(EngineConfig::default(), Arc::new(MemoryStorage::new()));
    let project_capable = Arc::new(TestAnalyzer::new("project").with_project());
    let document_only = Arc::new(TestAnalyzer::new("document").with_semantics());
    engine.register_host_analyzer("glint", project_capable.clone());
    engine.register_host_analyzer("glint", document_only.clone());
    let token = CancellationToken::none();
    let mut solution = Solution::new();
    let project = solution.add_project("app", "glint");
    solution
        .add_document(project, "a.gl", "a flag b\n")
        .unwrap_or_else(|| panic!("document not added"));

    engine
        .analyze_project(&solution, project, &token)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    assert_eq!(project_capable.project_runs.load(Ordering::SeqCst), 1);
    assert_eq!(document_only.project_runs.load(Ordering::SeqCst), 0);
    assert_eq!(document_only.semantic_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_crash_isolation_keeps_sibling_results() {
    let engine = IncrementalAnalyzer::new(EngineConfig::default(), Arc::new(MemoryStorage::new()));
    let good_a = Arc::new(TestAnalyzer::new("good_a").with_semantics());
    let broken = Arc::new(TestAnalyzer::new("broken").with_semantics().failing("boom"));
    let good_b = Arc::new(TestAnalyzer::new("good_b").with_semantics());
    engine.register_host_analyzer("glint", good_a.clone());
    engine.register_host_analyzer("glint", broken);
    engine.register_host_analyzer("glint", good_b.clone());
    let token = CancellationToken::none();
    let mut solution = Solution::new();
    let project = solution.add_project("app", "glint");
    let doc = solution
        .add_document(project, "a.gl", "a flag b\n")
        .unwrap_or_else(|| panic!("document not added"));

    let items = engine
        .get_diagnostics(&solution, AnalysisKey::from(doc), false, &token)
        .unwrap_or_else(|e| panic!("query failed: {e}"));

    let crashes: Vec<_> = items
        .iter()
        .filter(|item| &*item.id == crate::analyzer::ANALYZER_FAILURE_ID)
        .collect();
    assert_eq!(crashes.len(), 1);
    assert!(crashes[0].message.contains("boom"));
    // Both healthy analyzers still reported their marker.
    assert_eq!(items.len(), 3);
    assert_eq!(good_a.semantic_runs.load(Ordering::SeqCst), 1);
    assert_eq!(good_b.semantic_runs.load(Ordering::SeqCst), 1);
}

fn member_line() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("flag".to_string()),
            Just("x".to_string()),
            Just("longer".to_string()),
        ],
        1..5,
    )
    .prop_map(|words| words.join(" "))
}

proptest! {
    /// Member-scoped reanalysis spliced into the cached set must be
    /// indistinguishable from rerunning the whole document.
    #[test]
    fn prop_member_splice_equals_full_rerun(
        members in prop::collection::vec(member_line(), 1..5),
        replacement in member_line(),
        index in 0usize..5,
    ) {
        let index = index % members.len();
        let text = members.join("\n\n") + "\n";

        let mut f = fixture(TestAnalyzer::new("t").with_span_support(), &text);
        f.engine
            .analyze_document(&f.solution, f.doc, &f.token)
            .unwrap_or_else(|e| panic!("analysis failed: {e}"));

        let mut edited = members.clone();
        edited[index] = replacement;
        let edited_text = edited.join("\n\n") + "\n";
        f.solution.edit_document(f.doc, &edited_text);

        f.engine
            .analyze_document_body(&f.solution, f.doc, index, &f.token)
            .unwrap_or_else(|e| panic!("analysis failed: {e}"));
        let incremental = f
            .engine
            .get_cached_diagnostics(&f.solution, AnalysisKey::from(f.doc));

        let fresh = fixture(TestAnalyzer::new("t").with_span_support(), &edited_text);
        fresh
            .engine
            .analyze_document(&fresh.solution, fresh.doc, &fresh.token)
            .unwrap_or_else(|e| panic!("analysis failed: {e}"));
        let full = fresh
            .engine
            .get_cached_diagnostics(&fresh.solution, AnalysisKey::from(fresh.doc));

        prop_assert_eq!(sorted_spans(&incremental), sorted_spans(&full));
    }
}
