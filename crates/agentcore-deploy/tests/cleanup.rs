//! Cleanup confirmation and status reporting

mod common;

use agentcore_deploy::cli::{CleanupArgs, CommonArgs, OutputFormat, run_cleanup_with};
use agentcore_deploy::handler::Locator;
use agentcore_deploy::orchestrator::{Deployment, Plan, preview, status};
use agentcore_deploy_common::{ParameterLayout, ResourceKind};
use agentcore_deploy_test_utils::EnvFixture;
use common::{Journal, RecordingHandler, registry_with};

fn cleanup_args(fixture: &EnvFixture) -> CleanupArgs {
    CleanupArgs {
        common: CommonArgs {
            env_file: fixture.path().to_path_buf(),
            // Unroutable, so any AWS call would fail the test
            region: Some("xx-nowhere-1".into()),
            profile: None,
            format: OutputFormat::Table,
        },
        yes: false,
        parallel: 1,
        dry_run: false,
    }
}

#[tokio::test]
async fn declined_cleanup_exits_cleanly_without_aws_calls() {
    let fixture = EnvFixture::new(&[("PROJECT", "octank")]).unwrap();

    for answer in ["no\n", "\n", "y\n"] {
        let mut output = Vec::new();
        run_cleanup_with(cleanup_args(&fixture), &mut answer.as_bytes(), &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Type 'yes' to continue"));
        assert!(output.ends_with("Cleanup cancelled.\n"), "{output:?}");
    }
}

#[tokio::test]
async fn invalid_configuration_fails_before_prompting() {
    let fixture = EnvFixture::new(&[("PROJECT", "not a project!")]).unwrap();
    let mut output = Vec::new();

    let result = run_cleanup_with(cleanup_args(&fixture), &mut "yes\n".as_bytes(), &mut output).await;

    assert!(result.is_err());
    assert!(output.is_empty());
}

#[tokio::test]
async fn status_reports_each_resource_without_mutating() {
    let journal = Journal::default();
    let layout = ParameterLayout::new("octank");
    let handlers = vec![
        RecordingHandler::registry("Runtime", ResourceKind::Runtime, layout.runtime_id(), &journal).boxed(),
        RecordingHandler::registry("Memory", ResourceKind::Memory, layout.memory_id(), &journal).boxed(),
        RecordingHandler::new(
            "StorageBucket",
            ResourceKind::StorageBucket,
            Locator::Derived("agentcore-workshop-us-east-1-123456789012".into()),
            &journal,
        )
        .live("agentcore-workshop-us-east-1-123456789012")
        .boxed(),
    ];
    let (registry, store) = registry_with(&[("/app/octankedu/agentcore/memory_id", "mem-7")]);
    let before = store.snapshot();

    let entries = status(&handlers, &registry).await;

    let view: Vec<(&str, &Deployment)> = entries.iter().map(|e| (e.name.as_str(), &e.deployment)).collect();
    assert_eq!(
        view,
        [
            ("Runtime", &Deployment::NotDeployed),
            (
                "StorageBucket",
                &Deployment::Deployed("agentcore-workshop-us-east-1-123456789012".into())
            ),
            ("Memory", &Deployment::Deployed("mem-7".into())),
        ]
    );
    assert_eq!(store.snapshot(), before);
    assert!(journal.calls().iter().all(|c| c.contains(" exists ")));

    let json = serde_json::to_value(&entries).unwrap();
    assert_eq!(json[0]["deployment"]["state"], "not_deployed");
    assert_eq!(json[2]["deployment"]["id"], "mem-7");
}

#[tokio::test]
async fn deploy_preview_lists_deployable_steps_in_order() {
    let journal = Journal::default();
    let layout = ParameterLayout::new("octank");
    let handlers = vec![
        RecordingHandler::registry("Runtime", ResourceKind::Runtime, layout.runtime_id(), &journal).boxed(),
        RecordingHandler::new("RuntimeRole", ResourceKind::Role, Locator::Derived("role".into()), &journal)
            .not_deployable()
            .boxed(),
        RecordingHandler::registry("Memory", ResourceKind::Memory, layout.memory_id(), &journal).boxed(),
    ];
    let (registry, _) = registry_with(&[("/app/octank/agentcore/memory_id", "mem-1")]);

    let entries = preview(&handlers, &registry, &Plan::deploy(&handlers)).await;

    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Memory", "Runtime"]);
    assert!(journal.calls().is_empty());
}
