//! Integration tests for FormVault
//!
//! These tests verify end-to-end functionality including:
//! - On-disk store lifecycle
//! - Template and response workflows
//! - Snapshot export and import

use formvault::app::AppState;
use formvault::database::{
    event_types, Answer, BrandingUpdate, Collection, Fields, QuestionType, Snapshot, Store,
    Template,
};
use formvault::error::AppError;
use formvault::services::{BackupService, FormDocument};
use std::collections::{BTreeMap, HashSet};
use tempfile::TempDir;

/// Helper to create an application rooted in a fresh temp directory
async fn create_test_app() -> (AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let state = AppState::initialize(temp_dir.path()).await.unwrap();
    (state, temp_dir)
}

/// Template with a required name, a checkbox group and a signature
fn intake_template() -> (Template, Vec<String>) {
    let mut template = Template::new("Client Intake");
    let section = template.add_section("Contact", "Who are you?");
    let name = template
        .add_question(&section, QuestionType::Text, "Full name")
        .unwrap();
    let services = template
        .add_question(&section, QuestionType::Checkbox, "Services")
        .unwrap();
    let signature = template
        .add_question(&section, QuestionType::Signature, "Signature")
        .unwrap();

    template.question_mut(&section, &name).unwrap().required = true;
    let question = template.question_mut(&section, &services).unwrap();
    question.update_option(0, "Design").unwrap();
    question.update_option(1, "Copy").unwrap();
    question.add_option("Hosting").unwrap();

    (template, vec![name, services, signature])
}

fn answers(pairs: &[(&String, Answer)]) -> BTreeMap<String, Answer> {
    pairs
        .iter()
        .map(|(id, answer)| ((*id).clone(), answer.clone()))
        .collect()
}

fn backup_service(store: &Store) -> BackupService {
    let state = AppState::with_store(std::env::temp_dir(), store.clone()).unwrap();
    state.backup
}

#[tokio::test]
async fn test_first_run_has_no_branding() {
    let (app, _temp) = create_test_app().await;

    assert!(app.branding.get().await.unwrap().is_none());

    let saved = app
        .branding
        .save(BrandingUpdate {
            company_name: Some("Acme".to_string()),
            phone: Some("555-0100".to_string()),
            address: Some("1 Main St".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(app.branding.get().await.unwrap(), Some(saved));
}

#[tokio::test]
async fn test_template_identity_is_stable() {
    let (app, _temp) = create_test_app().await;
    let (template, _) = intake_template();

    let first = app.forms.save_template(template).await.unwrap();
    let id = first.id.unwrap();

    let second = app.forms.save_template(first.clone()).await.unwrap();
    assert_eq!(second.id, Some(id));

    let all = app.forms.list_templates().await.unwrap();
    assert_eq!(all.iter().filter(|t| t.id == Some(id)).count(), 1);
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_template_timestamps() {
    let (app, _temp) = create_test_app().await;
    let (template, _) = intake_template();

    let created = app.forms.save_template(template).await.unwrap();
    assert_eq!(created.created_at, created.updated_at);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let mut edited = created.clone();
    edited.name = "Client Intake v2".to_string();
    let updated = app.forms.save_template(edited).await.unwrap();

    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let (source, _source_dir) = create_test_app().await;
    let (template, ids) = intake_template();
    let template = source.forms.save_template(template).await.unwrap();
    let template_id = template.id.unwrap();

    source
        .forms
        .submit_response(
            template_id,
            Some("Dana".to_string()),
            answers(&[
                (&ids[0], Answer::Text("Dana Doe".to_string())),
                (&ids[1], Answer::Choices(vec!["Design".to_string()])),
            ]),
        )
        .await
        .unwrap();
    source
        .forms
        .submit_response(
            template_id,
            None,
            answers(&[(&ids[0], Answer::Text("Sam".to_string()))]),
        )
        .await
        .unwrap();

    let exported_path = source.backup.export_to_dir(&source.exports_dir()).await.unwrap();

    let target_dir = TempDir::new().unwrap();
    let target_store = Store::open(&target_dir.path().join("restore.sqlite"))
        .await
        .unwrap();
    let target = backup_service(&target_store);

    let summary = target.import_from_file(&exported_path).await.unwrap();
    assert_eq!(summary.templates, 1);
    assert_eq!(summary.responses, 2);
    assert!(summary.skipped_analytics > 0);

    let original = source.backup.export_all().await.unwrap();
    let restored = target.export_all().await.unwrap();

    assert_eq!(restored.templates, original.templates);
    assert_eq!(restored.responses, original.responses);

    // Only the import itself was logged on the target
    assert_eq!(restored.analytics.len(), 1);
    assert_eq!(restored.analytics[0].event_type, event_types::DATA_IMPORT);
}

#[tokio::test]
async fn test_deleted_template_degrades_gracefully() {
    let (app, _temp) = create_test_app().await;
    let (template, ids) = intake_template();
    let template_id = app.forms.save_template(template).await.unwrap().id.unwrap();

    let response = app
        .forms
        .submit_response(
            template_id,
            Some("Dana".to_string()),
            answers(&[
                (&ids[0], Answer::Text("Dana Doe".to_string())),
                (&ids[2], Answer::Text("not-an-image".to_string())),
            ]),
        )
        .await
        .unwrap();
    let response_id = response.id.unwrap();

    app.forms.delete_template(template_id).await.unwrap();

    assert!(app.forms.require_response(response_id).await.is_ok());

    let summaries = app.forms.response_summaries().await.unwrap();
    assert_eq!(summaries[0].template_name, "Unknown Template");

    let document: FormDocument = app.documents.filled_document(response_id).await.unwrap();
    assert_eq!(document.title, "Unknown Template");
    assert_eq!(document.client_name.as_deref(), Some("Dana"));

    // Export still includes the orphan
    let snapshot = app.backup.export_all().await.unwrap();
    assert_eq!(snapshot.responses.len(), 1);
    assert!(snapshot.templates.is_empty());
}

#[test]
fn test_choice_options_never_drop_below_two() {
    let mut template = Template::new("Poll");
    let section = template.add_section("Vote", "");
    let question_id = template
        .add_question(&section, QuestionType::Radio, "Pick one")
        .unwrap();
    let question = template.question_mut(&section, &question_id).unwrap();

    assert_eq!(question.options.as_ref().map(Vec::len), Some(2));

    let err = question.remove_option(0).unwrap_err();
    assert!(matches!(err, AppError::ValidationFailed(_)));
    assert!(err.is_recoverable());
    assert_eq!(question.options.as_ref().map(Vec::len), Some(2));

    question.add_option("Maybe").unwrap();
    question.remove_option(2).unwrap();
    assert_eq!(question.options.as_ref().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_analytics_is_append_only() {
    let (app, _temp) = create_test_app().await;

    for _ in 0..3 {
        app.analytics
            .log(event_types::FORM_SUBMITTED, Fields::new())
            .await
            .unwrap();
    }

    let store = app.store.clone();
    let events = formvault::database::AnalyticsRepository::new(store)
        .get_by_type(event_types::FORM_SUBMITTED)
        .await
        .unwrap();

    assert_eq!(events.len(), 3);
    let ids: HashSet<i64> = events.iter().filter_map(|e| e.id).collect();
    assert_eq!(ids.len(), 3);
    for pair in events.windows(2) {
        assert!(pair[1].timestamp >= pair[0].timestamp);
    }
}

#[tokio::test]
async fn test_partial_import_failure() {
    let (app, _temp) = create_test_app().await;

    let valid = |id: i64, name: &str| {
        let (mut template, _) = intake_template();
        template.id = Some(id);
        template.name = name.to_string();
        template
    };
    let mut broken = valid(2, "Broken");
    broken.sections[0].questions[1].options = None;

    let snapshot = Snapshot {
        branding: None,
        templates: vec![valid(1, "First"), broken, valid(3, "Third")],
        responses: Vec::new(),
        analytics: Vec::new(),
        exported_at: chrono::Utc::now(),
    };

    match app.backup.import_all(snapshot).await {
        Err(AppError::ImportFailed {
            collection, index, source,
        }) => {
            assert_eq!(collection, Collection::Templates);
            assert_eq!(index, 1);
            assert!(matches!(*source, AppError::ValidationFailed(_)));
        }
        other => panic!("expected import failure, got {:?}", other),
    }

    assert!(app.forms.require_template(1).await.is_ok());
    assert!(matches!(
        app.forms.require_template(2).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(app.forms.require_template(3).await.is_err());
}

#[tokio::test]
async fn test_partial_import_from_file() {
    let (app, temp) = create_test_app().await;
    let (mut first, _) = intake_template();
    first.id = Some(1);

    let path = temp.path().join("hand-edited.json");
    let document = serde_json::json!({
        "templates": [
            first,
            { "id": 2, "name": "Broken", "sections": "none" }
        ],
        "responses": [{ "id": 1, "templateId": 1, "answers": {} }]
    });
    std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

    match app.backup.import_from_file(&path).await {
        Err(err @ AppError::ImportFailed { .. }) => {
            assert!(err.is_recoverable());
            assert!(matches!(
                err,
                AppError::ImportFailed {
                    collection: Collection::Templates,
                    index: 1,
                    ..
                }
            ));
        }
        other => panic!("expected import failure, got {:?}", other),
    }

    assert!(app.forms.require_template(1).await.is_ok());
    assert!(app.forms.require_response(1).await.is_err());
}

#[tokio::test]
async fn test_store_unavailable_when_path_is_blocked() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let result = Store::open(&blocker.join("db.sqlite")).await;
    match result {
        Err(err @ AppError::StorageUnavailable(_)) => assert!(!err.is_recoverable()),
        Err(other) => panic!("expected storage unavailable, got {:?}", other),
        Ok(_) => panic!("expected storage unavailable"),
    }
}

#[tokio::test]
async fn test_concurrent_reads_see_committed_writes() {
    let (app, _temp) = create_test_app().await;
    let (template, ids) = intake_template();
    let template_id = app.forms.save_template(template).await.unwrap().id.unwrap();

    let submissions = (0..5).map(|i| {
        let forms = app.forms.clone();
        let name_id = ids[0].clone();
        tokio::spawn(async move {
            forms
                .submit_response(
                    template_id,
                    Some(format!("client-{}", i)),
                    answers(&[(&name_id, Answer::Text(format!("Client {}", i)))]),
                )
                .await
        })
    });
    for handle in submissions.collect::<Vec<_>>() {
        handle.await.unwrap().unwrap();
    }

    let (dashboard, stats) = tokio::try_join!(app.forms.dashboard(3), app.analytics.summary()).unwrap();

    assert_eq!(dashboard.response_count, 5);
    assert_eq!(dashboard.recent_responses.len(), 3);
    assert_eq!(stats.total_responses, 5);
    assert_eq!(stats.form_submissions, 5);
}

#[tokio::test]
async fn test_samples_install_through_app() {
    let (app, _temp) = create_test_app().await;

    let template = app.samples.install("job application").await.unwrap();
    let fetched = app.forms.require_template(template.id.unwrap()).await.unwrap();

    assert_eq!(fetched.name, "Job Application");
    assert!(fetched.questions().count() > 0);
}
