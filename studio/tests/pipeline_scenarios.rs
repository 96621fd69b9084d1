//! End-to-end pipeline scenarios against a scripted generative service.
//!
//! Each test submits requests through the router and checks the resulting
//! messages, tasks, artifact, and the requests the service received.

use std::sync::Arc;

use studio::core::artifact::Artifact;
use studio::core::generation::{
    Candidate, Contents, GenerateResponse, GroundingChunk, GroundingMetadata, Part, Tool, WebSource,
};
use studio::core::tasks::TaskStatus;
use studio::core::templates::TemplateKind;
use studio::core::types::{AgentOptions, AgentRole, ImagePayload, Sender, Target};
use studio::error::ValidationFailure;
use studio::io::config::StaleResultPolicy;
use studio::io::prompt::{DEVELOPER_CREATE_INSTRUCTION, DEVELOPER_EDIT_INSTRUCTION, truncate_chars};
use studio::pipeline::{AgentPipeline, PipelineSettings};
use studio::router::{RequestRouter, RunOutcome, SubmitRequest};
use studio::session::SessionStore;
use studio::test_support::{Reply, ScriptedService, developer_json, store_with_active};

struct Harness {
    service: Arc<ScriptedService>,
    store: Arc<SessionStore>,
    router: RequestRouter,
}

fn harness(service: ScriptedService, store: Arc<SessionStore>, settings: PipelineSettings) -> Harness {
    let service = Arc::new(service);
    let pipeline = AgentPipeline::new(service.clone(), Arc::clone(&store), settings);
    let router = RequestRouter::new(Arc::clone(&store), Arc::new(pipeline));
    Harness {
        service,
        store,
        router,
    }
}

fn fresh(service: ScriptedService) -> Harness {
    harness(service, Arc::new(SessionStore::default()), PipelineSettings::default())
}

fn statuses(store: &SessionStore) -> Vec<(AgentRole, TaskStatus)> {
    store
        .tasks()
        .iter()
        .map(|task| (task.assigned_to, task.status))
        .collect()
}

#[tokio::test]
async fn empty_request_without_image_never_reaches_pipeline() {
    let h = fresh(ScriptedService::new());
    let err = h
        .router
        .submit(SubmitRequest::new("  \t ", Target::Team))
        .await
        .unwrap_err();
    assert_eq!(err, ValidationFailure::EmptyRequest);
    assert!(h.store.messages().is_empty());
    assert!(h.store.tasks().is_empty());
    assert_eq!(h.service.call_count(), 0);
}

#[tokio::test]
async fn calculator_request_uses_template_and_reviews_it() {
    let h = fresh(
        ScriptedService::new()
            .reply(AgentRole::Architect, Reply::text("**Plan**: a keypad and a history list"))
            .reply(AgentRole::Qa, Reply::text("Looks **accessible**.")),
    );
    let outcome = h
        .router
        .submit(SubmitRequest::new("Build a modern calculator with history", Target::Team))
        .await
        .expect("accepted");
    assert!(matches!(outcome, RunOutcome::Settled { .. }));

    let template = TemplateKind::Calculator.template();
    let active = h.store.active_artifact().expect("active artifact");
    assert_eq!(active.name, "Calculator.tsx");
    assert_eq!(active.content, template.content);
    assert!(active.is_new);

    let messages = h.store.messages();
    let texts: Vec<(Sender, Option<AgentRole>)> =
        messages.iter().map(|m| (m.sender, m.agent_role)).collect();
    assert_eq!(
        texts,
        vec![
            (Sender::User, None),
            (Sender::Agent, Some(AgentRole::Architect)),
            (Sender::Agent, Some(AgentRole::Developer)),
            (Sender::Agent, Some(AgentRole::Qa)),
        ]
    );
    assert_eq!(messages[1].text, "**Plan**: a keypad and a history list");
    assert_eq!(messages[2].text, template.explanation());

    assert!(h.service.requests_for(AgentRole::Developer).is_empty());
    let qa = h.service.requests_for(AgentRole::Qa);
    assert_eq!(qa.len(), 1);
    let expected_tail = format!("Code: {}...", truncate_chars(template.content, 2000));
    assert!(qa[0].contents.text().ends_with(&expected_tail));
    assert_eq!(qa[0].model, "gemini-2.5-flash");

    assert_eq!(
        statuses(&h.store),
        vec![
            (AgentRole::Architect, TaskStatus::Completed),
            (AgentRole::Developer, TaskStatus::Completed),
            (AgentRole::Qa, TaskStatus::Completed),
        ]
    );
    let titles: Vec<String> = h.store.tasks().into_iter().map(|t| t.title).collect();
    assert_eq!(
        titles,
        vec![
            "Architecture Planning",
            "Component Implementation",
            "Quality Assurance"
        ]
    );
    assert!(h.store.files().find_file("Calculator.tsx").is_some());
    assert_eq!(h.store.progress().percent(), 100);
    assert!(!h.store.is_processing());
}

#[tokio::test]
async fn todo_request_skips_developer_call() {
    let h = fresh(
        ScriptedService::new()
            .reply(AgentRole::Architect, Reply::text("plan"))
            .reply(AgentRole::Qa, Reply::text("ok")),
    );
    h.router
        .submit(SubmitRequest::new("build a todo app", Target::Team))
        .await
        .expect("accepted");
    assert!(h.service.requests_for(AgentRole::Developer).is_empty());
    let active = h.store.active_artifact().expect("active");
    assert_eq!(active.name, "TodoList.tsx");
    assert_eq!(active.content, TemplateKind::Todo.template().content);
}

#[tokio::test]
async fn thinking_overrides_template_and_search() {
    let h = fresh(
        ScriptedService::new()
            .reply(AgentRole::Architect, Reply::text("deep plan"))
            .reply(
                AgentRole::Developer,
                Reply::text(developer_json("TodoPro.tsx", "export default () => null;", "Done.")),
            )
            .reply(AgentRole::Qa, Reply::text("ok")),
    );
    let options = AgentOptions {
        use_search: true,
        use_thinking: true,
        image: None,
    };
    h.router
        .submit(SubmitRequest::new("build a todo app", Target::Team).with_options(options))
        .await
        .expect("accepted");

    let architect = &h.service.requests_for(AgentRole::Architect)[0];
    assert_eq!(architect.model, "gemini-3-pro-preview");
    assert!(!architect.uses_tool(Tool::WebSearch));
    assert_eq!(
        architect.config.thinking_config.map(|t| t.thinking_budget),
        Some(32_768)
    );
    assert_eq!(h.store.tasks()[0].title, "Research & Planning");

    let developer = &h.service.requests_for(AgentRole::Developer)[0];
    assert_eq!(developer.model, "gemini-3-pro-preview");
    assert!(developer.config.thinking_config.is_some());
    assert_eq!(
        h.store.active_artifact().map(|a| a.name),
        Some("TodoPro.tsx".to_string())
    );
}

#[tokio::test]
async fn search_attaches_citations_to_plan() {
    let grounded = GenerateResponse {
        text: "plan with sources".to_string(),
        candidates: vec![Candidate {
            grounding_metadata: Some(GroundingMetadata {
                grounding_chunks: vec![GroundingChunk {
                    web: Some(WebSource {
                        title: Some("React".to_string()),
                        uri: Some("https://react.dev".to_string()),
                    }),
                }],
            }),
        }],
    };
    let h = fresh(ScriptedService::new().reply(AgentRole::Architect, Reply::Respond(grounded)));
    let options = AgentOptions {
        use_search: true,
        ..AgentOptions::default()
    };
    h.router
        .submit(SubmitRequest::new("research dashboards", Target::Architect).with_options(options))
        .await
        .expect("accepted");

    let request = &h.service.requests()[0];
    assert_eq!(request.model, "gemini-2.5-flash");
    assert!(request.uses_tool(Tool::WebSearch));
    let plan = &h.store.messages()[1];
    let citations = plan.grounding_urls.as_ref().expect("citations");
    assert_eq!(citations[0].uri, "https://react.dev");
    assert_eq!(h.store.tasks().len(), 1);
}

#[tokio::test]
async fn plan_without_grounding_has_no_citations() {
    let h = fresh(ScriptedService::new().reply(AgentRole::Architect, Reply::text("plan")));
    h.router
        .submit(SubmitRequest::new("plan a form", Target::Architect))
        .await
        .expect("accepted");
    assert!(h.store.messages()[1].grounding_urls.is_none());
}

#[tokio::test]
async fn image_request_sends_parts_to_advanced_model() {
    let h = fresh(ScriptedService::new().reply(AgentRole::Architect, Reply::text("plan")));
    let image = ImagePayload::from_bytes("image/png", b"\x89PNG");
    let options = AgentOptions {
        image: Some(image.clone()),
        ..AgentOptions::default()
    };
    h.router
        .submit(SubmitRequest::new("clone this screen", Target::Architect).with_options(options))
        .await
        .expect("accepted");

    let request = &h.service.requests()[0];
    assert_eq!(request.model, "gemini-3-pro-preview");
    assert!(request.config.thinking_config.is_none());
    match &request.contents {
        Contents::Parts(parts) => {
            assert_eq!(
                parts[0],
                Part::Text(
                    "User Request: clone this screen.\nAnalyze this image and plan the implementation."
                        .to_string()
                )
            );
            assert_eq!(parts[1], Part::InlineImage(image));
        }
        other => panic!("expected multi-part contents, got {other:?}"),
    }
    assert_eq!(h.store.tasks()[0].title, "Architecture Planning");
}

#[tokio::test]
async fn architect_failure_does_not_stop_later_stages() {
    let h = fresh(
        ScriptedService::new()
            .reply(AgentRole::Architect, Reply::fail("quota exceeded"))
            .reply(
                AgentRole::Developer,
                Reply::text(developer_json("Landing.tsx", "<main/>", "Built it.")),
            )
            .reply(AgentRole::Qa, Reply::text("fine")),
    );
    h.router
        .submit(SubmitRequest::new("Build a landing page", Target::Team))
        .await
        .expect("accepted");

    assert_eq!(
        statuses(&h.store),
        vec![
            (AgentRole::Architect, TaskStatus::Failed),
            (AgentRole::Developer, TaskStatus::Completed),
            (AgentRole::Qa, TaskStatus::Completed),
        ]
    );
    let developer = &h.service.requests_for(AgentRole::Developer)[0];
    assert_eq!(
        developer.config.system_instruction.as_deref(),
        Some(DEVELOPER_CREATE_INSTRUCTION)
    );
    assert_eq!(
        developer.config.response_mime_type.as_deref(),
        Some("application/json")
    );
    assert!(developer.contents.text().starts_with("Architect Plan: \nRequest: Build a landing page"));
    assert_eq!(h.store.progress().percent(), 67);
    // No architect message, no system message.
    let senders: Vec<Sender> = h.store.messages().iter().map(|m| m.sender).collect();
    assert_eq!(senders, vec![Sender::User, Sender::Agent, Sender::Agent]);
}

#[tokio::test]
async fn edit_request_embeds_code_and_grows_history_by_one() {
    let store = store_with_active("Button.tsx", "<button className=\"red\">Go</button>");
    let h = harness(
        ScriptedService::new().reply(
            AgentRole::Developer,
            Reply::text(developer_json(
                "Button.tsx",
                "<button className=\"blue\">Go</button>",
                "Switched to blue.",
            )),
        ),
        store,
        PipelineSettings::default(),
    );
    let before = h.store.history_position();
    assert_eq!(before.len, 1);

    h.router
        .submit(SubmitRequest::new("fix the button color", Target::Developer))
        .await
        .expect("accepted");

    let request = &h.service.requests()[0];
    assert_eq!(
        request.config.system_instruction.as_deref(),
        Some(DEVELOPER_EDIT_INSTRUCTION)
    );
    assert!(
        request
            .contents
            .text()
            .contains("```tsx\n<button className=\"red\">Go</button>\n```")
    );
    assert_eq!(h.service.call_count(), 1);

    let active = h.store.active_artifact().expect("active");
    assert_eq!(active.content, "<button className=\"blue\">Go</button>");
    let after = h.store.history_position();
    assert_eq!(after.len, before.len + 1);
    assert_eq!(after.index, 1);
    assert_eq!(h.store.tasks()[0].title, "Code Refactoring");
    assert_eq!(h.store.messages().last().map(|m| m.text.clone()), Some("Switched to blue.".to_string()));
}

#[tokio::test]
async fn unparseable_developer_output_fails_task_and_keeps_artifact() {
    let store = store_with_active("Card.tsx", "<div>card</div>");
    let h = harness(
        ScriptedService::new()
            .reply(AgentRole::Architect, Reply::text("plan"))
            .reply(AgentRole::Developer, Reply::text("Sure! {\"filename\": \"Pricing.tsx\""))
            .reply(AgentRole::Qa, Reply::text("reviewed")),
        store,
        PipelineSettings::default(),
    );
    h.router
        .submit(SubmitRequest::new("Build a pricing page", Target::Team))
        .await
        .expect("accepted");

    assert_eq!(
        statuses(&h.store),
        vec![
            (AgentRole::Architect, TaskStatus::Completed),
            (AgentRole::Developer, TaskStatus::Failed),
            (AgentRole::Qa, TaskStatus::Completed),
        ]
    );
    let active = h.store.active_artifact().expect("active");
    assert_eq!(active.name, "Card.tsx");
    assert_eq!(h.store.history_position().len, 1);
    // QA falls back to the artifact that was active when the request arrived.
    let qa = &h.service.requests_for(AgentRole::Qa)[0];
    assert!(qa.contents.text().ends_with("Code: <div>card</div>..."));
}

#[tokio::test]
async fn qa_without_code_is_skipped() {
    let h = fresh(ScriptedService::new().reply(AgentRole::Qa, Reply::text("unused")));
    h.router
        .submit(SubmitRequest::new("review please", Target::Qa))
        .await
        .expect("accepted");
    assert!(h.store.tasks().is_empty());
    assert_eq!(h.service.call_count(), 0);
    assert_eq!(h.store.messages().len(), 1);
}

#[tokio::test]
async fn qa_review_length_is_configurable() {
    let store = store_with_active("Long.tsx", "abcdefghijklmnopqrstuvwxyz");
    let settings = PipelineSettings {
        qa_review_chars: 5,
        ..PipelineSettings::default()
    };
    let h = harness(
        ScriptedService::new().reply(AgentRole::Qa, Reply::text("short")),
        store,
        settings,
    );
    h.router
        .submit(SubmitRequest::new("review please", Target::Qa))
        .await
        .expect("accepted");
    let qa = &h.service.requests()[0];
    assert!(qa.contents.text().ends_with("Code: abcde..."));
    assert!(qa.config.system_instruction.is_none());
}

#[tokio::test]
async fn stale_output_is_discarded_when_configured() {
    let store = store_with_active("Old.tsx", "old");
    let hook_store = Arc::clone(&store);
    let service = ScriptedService::new()
        .reply(
            AgentRole::Developer,
            Reply::text(developer_json("New.tsx", "new", "Made it.")),
        )
        .on_call(move |role, _| {
            if role == AgentRole::Developer {
                hook_store.close_artifact();
            }
        });
    let settings = PipelineSettings {
        stale_results: StaleResultPolicy::Discard,
        ..PipelineSettings::default()
    };
    let h = harness(service, store, settings);
    h.router
        .submit(SubmitRequest::new("Build a pricing page", Target::Developer))
        .await
        .expect("accepted");

    assert_eq!(statuses(&h.store), vec![(AgentRole::Developer, TaskStatus::Failed)]);
    assert!(h.store.active_artifact().is_none());
    assert!(h.store.files().find_file("New.tsx").is_none());
    assert_eq!(h.store.messages().len(), 1);
}

#[tokio::test]
async fn stale_output_is_applied_by_default() {
    let store = store_with_active("Old.tsx", "old");
    let hook_store = Arc::clone(&store);
    let service = ScriptedService::new()
        .reply(
            AgentRole::Developer,
            Reply::text(developer_json("New.tsx", "new", "Made it.")),
        )
        .on_call(move |role, _| {
            if role == AgentRole::Developer {
                hook_store.close_artifact();
            }
        });
    let h = harness(service, store, PipelineSettings::default());
    h.router
        .submit(SubmitRequest::new("Build a pricing page", Target::Developer))
        .await
        .expect("accepted");

    assert_eq!(statuses(&h.store), vec![(AgentRole::Developer, TaskStatus::Completed)]);
    assert_eq!(
        h.store.active_artifact().map(|a| a.name),
        Some("New.tsx".to_string())
    );
}

#[tokio::test]
async fn edit_lands_in_edited_file_when_another_is_selected_meanwhile() {
    let store = store_with_active("B.tsx", "b-original");
    store.merge_developer_output(Artifact::generated("A.tsx", "a-original"), None, None);
    store.mark_saved();
    let hook_store = Arc::clone(&store);
    let service = ScriptedService::new()
        .reply(
            AgentRole::Developer,
            Reply::text(developer_json("A.tsx", "a-edited", "Recolored.")),
        )
        .on_call(move |role, _| {
            if role == AgentRole::Developer {
                hook_store.select_file("B.tsx").expect("B.tsx in tree");
            }
        });
    let h = harness(service, store, PipelineSettings::default());
    h.router
        .submit(SubmitRequest::new("fix the color", Target::Developer))
        .await
        .expect("accepted");

    assert_eq!(statuses(&h.store), vec![(AgentRole::Developer, TaskStatus::Completed)]);
    let files = h.store.files();
    let content = |name: &str| files.find_file(name).and_then(|node| node.content.clone());
    assert_eq!(content("A.tsx"), Some("a-edited".to_string()));
    assert_eq!(content("B.tsx"), Some("b-original".to_string()));
    let active = h.store.active_artifact().expect("active");
    assert_eq!((active.name.as_str(), active.content.as_str()), ("B.tsx", "b-original"));
    assert_eq!(h.store.history_position().len, 1);
}

#[tokio::test]
async fn empty_generated_code_falls_back_to_current_artifact_for_review() {
    let store = store_with_active("Card.tsx", "<div>card</div>");
    let h = harness(
        ScriptedService::new()
            .reply(AgentRole::Architect, Reply::text("plan"))
            .reply(
                AgentRole::Developer,
                Reply::text(developer_json("Empty.tsx", "", "Nothing to show.")),
            )
            .reply(AgentRole::Qa, Reply::text("reviewed")),
        store,
        PipelineSettings::default(),
    );
    h.router
        .submit(SubmitRequest::new("Build a pricing page", Target::Team))
        .await
        .expect("accepted");

    assert_eq!(
        statuses(&h.store),
        vec![
            (AgentRole::Architect, TaskStatus::Completed),
            (AgentRole::Developer, TaskStatus::Completed),
            (AgentRole::Qa, TaskStatus::Completed),
        ]
    );
    let qa = h.service.requests_for(AgentRole::Qa);
    assert_eq!(qa.len(), 1);
    assert!(qa[0].contents.text().ends_with("Code: <div>card</div>..."));
}

#[tokio::test]
async fn tasks_from_earlier_runs_are_kept() {
    let h = fresh(
        ScriptedService::new()
            .reply(AgentRole::Architect, Reply::fail("down"))
            .reply(AgentRole::Qa, Reply::text("ok")),
    );
    h.router
        .submit(SubmitRequest::new("plan a login page", Target::Architect))
        .await
        .expect("first");
    h.router
        .submit(SubmitRequest::new("build a login page", Target::Developer))
        .await
        .expect("second");

    let tasks = h.store.tasks();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    assert_eq!(tasks[0].run, 1);
    assert_eq!(tasks[1].run, 2);
    // Progress only counts the latest run.
    assert_eq!(h.store.progress().percent(), 100);
    assert_eq!(
        h.store.active_artifact().map(|a| a.name),
        Some("Login.tsx".to_string())
    );
}

#[tokio::test]
async fn submission_during_a_run_is_busy() {
    let h = fresh(ScriptedService::new());
    let accepted = h
        .router
        .accept(SubmitRequest::new("first", Target::Qa))
        .expect("accepted");
    let busy = h
        .router
        .submit(SubmitRequest::new("second", Target::Team))
        .await
        .unwrap_err();
    assert_eq!(busy, ValidationFailure::Busy);
    assert_eq!(h.store.messages().len(), 1);
    h.router.dispatch(accepted).await;
    assert!(!h.store.is_processing());
}

#[test]
fn history_grows_linearly_and_undo_then_update_drops_redo() {
    let store = store_with_active("A.tsx", "v0");
    for content in ["v1", "v2", "v3"] {
        assert!(store.edit_artifact(content));
    }
    let position = store.history_position();
    assert_eq!((position.len, position.index), (4, 3));

    assert_eq!(store.undo().map(|a| a.content), Some("v2".to_string()));
    assert!(store.edit_artifact("v4"));
    let position = store.history_position();
    assert_eq!((position.len, position.index), (4, 3));
    assert!(!position.can_redo);
    assert!(store.redo().is_none());
}

#[test]
fn two_updates_then_undo_restores_first_update() {
    let store = store_with_active("A.tsx", "v0");
    store.edit_artifact("first");
    store.edit_artifact("second");
    let restored = store.undo().expect("undo");
    assert_eq!(restored.content, "first");
    assert_eq!(store.active_artifact().map(|a| a.content), Some("first".to_string()));
}
