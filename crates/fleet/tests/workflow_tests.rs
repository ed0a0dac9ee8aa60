//! End-to-end tests of collection, building and dispatch with fake
//! collaborators standing in for the terminal and gcloud.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleet::{
    build_commands, CloudLookup, Collector, CommandKind, CommandRunner, Dispatcher, FleetError,
    FleetResult, LinePrompter, LookupError, Mode, Policy, Presets, Prompter, RenderedCommand,
    Report, RunError,
};

/// Replays canned answers and remembers each question with its default.
#[derive(Default)]
struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<(String, String)>>,
}

impl ScriptedPrompter {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().map(|a| (*a).to_string()).collect()),
            asked: RefCell::default(),
        }
    }

    fn asked(&self) -> Vec<(String, String)> {
        self.asked.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, label: &str, default: &str) -> FleetResult<String> {
        self.asked
            .borrow_mut()
            .push((label.to_string(), default.to_string()));
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| FleetError::Prompt(format!("no scripted answer for '{label}'")))
    }
}

struct FakeLookup {
    project: Option<&'static str>,
    service_account: Option<&'static str>,
}

impl FakeLookup {
    fn ok() -> Self {
        Self {
            project: Some("active-project"),
            service_account: Some("123-compute@developer.gserviceaccount.com"),
        }
    }
}

#[async_trait]
impl CloudLookup for FakeLookup {
    async fn resolve_active_project(&self) -> Result<String, LookupError> {
        self.project.map(String::from).ok_or(LookupError::NoProject)
    }

    async fn resolve_service_account(&self, project: &str) -> Result<String, LookupError> {
        self.service_account
            .map(String::from)
            .ok_or_else(|| LookupError::NoServiceAccount(project.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Start(CommandKind, String),
    End(CommandKind, String),
}

/// Records start/end of every invocation; fails commands of selected kinds
/// or targets.
#[derive(Default)]
struct RecordingRunner {
    events: Mutex<Vec<Event>>,
    fail_kinds: Vec<CommandKind>,
    fail_targets: Vec<String>,
}

impl RecordingRunner {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn position(&self, pred: impl Fn(&Event) -> bool) -> Vec<usize> {
        self.events()
            .iter()
            .enumerate()
            .filter_map(|(i, e)| pred(e).then_some(i))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &RenderedCommand) -> Result<(), RunError> {
        let target = command.target.clone().unwrap_or_default();
        self.events
            .lock()
            .unwrap()
            .push(Event::Start(command.kind, target.clone()));

        // Give concurrent instance tasks a chance to overlap.
        tokio::time::sleep(Duration::from_millis(5)).await;

        self.events
            .lock()
            .unwrap()
            .push(Event::End(command.kind, target.clone()));

        if self.fail_kinds.contains(&command.kind) || self.fail_targets.contains(&target) {
            return Err(RunError::Exit {
                code: 1,
                stderr: format!("{target} already exists"),
            });
        }
        Ok(())
    }
}

fn apply_presets(names: &[&str]) -> Presets {
    Presets {
        project: Some("demo".into()),
        names: names.iter().map(|n| (*n).to_string()).collect(),
        apply: true,
        assume_defaults: true,
        ..Presets::default()
    }
}

async fn collect(
    prompter: &ScriptedPrompter,
    presets: &Presets,
) -> FleetResult<fleet::ProvisioningRequest> {
    Collector::new(prompter, &FakeLookup::ok(), presets)
        .collect(&Policy::default())
        .await
}

mod collection {
    use super::*;

    #[tokio::test]
    async fn test_blank_answers_take_defaults() {
        // project, count, name 1, name 2, size, zone, subnet, mode
        let prompter = ScriptedPrompter::new(&["", "", "", "", "", "", "", ""]);
        let request = collect(&prompter, &Presets::default()).await.unwrap();

        assert_eq!(request.project_id(), "active-project");
        assert_eq!(request.vm_names(), ["agent-1", "agent-2"]);
        assert_eq!(request.storage_size_gb(), 50);
        assert_eq!(request.zone(), "europe-west1-b");
        assert_eq!(request.region(), "europe-west1");
        assert!(request.subnet().is_none());
        assert_eq!(request.mode(), Mode::Print);
        assert_eq!(
            request.service_account(),
            "123-compute@developer.gserviceaccount.com"
        );

        let asked = prompter.asked();
        assert_eq!(asked.len(), 8);
        assert_eq!(asked[0], ("Enter Project ID".into(), "active-project".into()));
        assert_eq!(asked[1].1, "2");
        assert_eq!(asked[2], ("Enter name for VM #1".into(), "agent-1".into()));
        assert_eq!(asked[4], ("Enter storage size (GB)".into(), "50".into()));
        assert_eq!(asked[7].1, "print");
    }

    #[tokio::test]
    async fn test_custom_answers() {
        let prompter = ScriptedPrompter::new(&[
            "my-project",
            "3",
            "a",
            "b",
            "c",
            "100",
            "us-west1-b",
            "10.8.0.0/24",
            "apply",
        ]);
        let request = collect(&prompter, &Presets::default()).await.unwrap();

        assert_eq!(request.project_id(), "my-project");
        assert_eq!(request.vm_names(), ["a", "b", "c"]);
        assert_eq!(request.storage_size_gb(), 100);
        assert_eq!(request.region(), "us-west1");
        assert_eq!(request.subnet().unwrap().name, "fleet-us-west1");
        assert_eq!(request.mode(), Mode::Apply);
    }

    #[tokio::test]
    async fn test_non_numeric_count_aborts_without_retry() {
        let prompter = ScriptedPrompter::new(&["", "three"]);
        let err = collect(&prompter, &Presets::default()).await.unwrap_err();
        assert!(matches!(err, FleetError::InvalidCount(raw) if raw == "three"));
        assert_eq!(prompter.asked().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_count_aborts() {
        let prompter = ScriptedPrompter::new(&["", "0"]);
        let err = collect(&prompter, &Presets::default()).await.unwrap_err();
        assert!(matches!(err, FleetError::InvalidCount(_)));
    }

    #[tokio::test]
    async fn test_invalid_storage_size_aborts() {
        let prompter = ScriptedPrompter::new(&["", "1", "", "lots"]);
        let err = collect(&prompter, &Presets::default()).await.unwrap_err();
        assert!(matches!(err, FleetError::InvalidStorageSize(_)));
    }

    #[tokio::test]
    async fn test_project_lookup_failure_aborts_before_prompting() {
        let prompter = ScriptedPrompter::new(&[]);
        let lookup = FakeLookup {
            project: None,
            ..FakeLookup::ok()
        };
        let err = Collector::new(&prompter, &lookup, &Presets::default())
            .collect(&Policy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Lookup(LookupError::NoProject)));
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_service_account_lookup_failure_aborts() {
        let prompter = ScriptedPrompter::new(&[]);
        let lookup = FakeLookup {
            service_account: None,
            ..FakeLookup::ok()
        };
        let presets = Presets {
            assume_defaults: true,
            ..Presets::default()
        };
        let err = Collector::new(&prompter, &lookup, &presets)
            .collect(&Policy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FleetError::Lookup(LookupError::NoServiceAccount(p)) if p == "active-project"
        ));
    }

    #[tokio::test]
    async fn test_presets_skip_prompts() {
        let prompter = ScriptedPrompter::new(&[]);
        let request = collect(&prompter, &apply_presets(&["x", "y"])).await.unwrap();
        assert!(prompter.asked().is_empty());
        assert_eq!(request.project_id(), "demo");
        assert_eq!(request.vm_names(), ["x", "y"]);
        assert_eq!(request.mode(), Mode::Apply);
    }

    #[tokio::test]
    async fn test_preset_names_must_match_count() {
        let prompter = ScriptedPrompter::new(&[]);
        let presets = Presets {
            count: Some("3".into()),
            ..apply_presets(&["x", "y"])
        };
        let err = collect(&prompter, &presets).await.unwrap_err();
        assert!(matches!(
            err,
            FleetError::NameCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_names_abort_before_service_account_lookup() {
        // The lookup would fail too; the name error must come first.
        let lookup = FakeLookup {
            service_account: None,
            ..FakeLookup::ok()
        };

        let prompter = ScriptedPrompter::new(&["", "2", "dup", "dup"]);
        let err = Collector::new(&prompter, &lookup, &Presets::default())
            .collect(&Policy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::DuplicateName(n) if n == "dup"));
        assert_eq!(prompter.asked().len(), 4);

        let prompter = ScriptedPrompter::new(&[]);
        let presets = Presets {
            names: vec!["a".into(), "  ".into()],
            ..Presets::default()
        };
        let err = Collector::new(&prompter, &lookup, &presets)
            .collect(&Policy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::EmptyName(2)));
    }

    #[tokio::test]
    async fn test_piped_blank_lines_take_defaults() {
        let input = std::io::Cursor::new(b"\n\n\n\n\n\n\n\n".to_vec());
        let prompter = LinePrompter::new(input, Vec::new());
        let request = Collector::new(&prompter, &FakeLookup::ok(), &Presets::default())
            .collect(&Policy::default())
            .await
            .unwrap();
        assert_eq!(request.vm_names(), ["agent-1", "agent-2"]);
        assert_eq!(request.mode(), Mode::Print);
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let prompter = ScriptedPrompter::new(&["", "2", "dup", "dup", "", "", "", ""]);
        let err = collect(&prompter, &Presets::default()).await.unwrap_err();
        assert!(matches!(err, FleetError::DuplicateName(n) if n == "dup"));
    }
}

mod dispatch {
    use super::*;

    async fn run(
        runner: Arc<RecordingRunner>,
        names: &[&str],
        mode: Mode,
    ) -> (Vec<fleet::OperationResult>, String) {
        let prompter = ScriptedPrompter::new(&[]);
        let request = collect(&prompter, &apply_presets(names)).await.unwrap();
        let commands = build_commands(&request, &Policy::default());
        let mut out = Vec::new();
        let results = Dispatcher::new(runner)
            .dispatch(commands, mode, &mut out)
            .await
            .unwrap();
        (results, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_print_mode_invokes_nothing() {
        let runner = Arc::new(RecordingRunner::default());
        let (results, out) = run(Arc::clone(&runner), &["a", "b"], Mode::Print).await;

        assert!(results.is_empty());
        assert!(runner.events().is_empty());
        assert_eq!(out.lines().count(), 3);
        assert!(out.starts_with("Running: gcloud compute firewall-rules create allow-all"));
        assert!(out.contains("Running: gcloud compute instances create b "));
    }

    #[tokio::test]
    async fn test_firewall_completes_before_any_instance_starts() {
        let runner = Arc::new(RecordingRunner::default());
        let (results, _) = run(Arc::clone(&runner), &["a", "b", "c"], Mode::Apply).await;

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.succeeded));

        let firewall_end = runner.position(|e| matches!(e, Event::End(CommandKind::Firewall, _)));
        let instance_starts =
            runner.position(|e| matches!(e, Event::Start(CommandKind::InstanceCreate, _)));
        assert_eq!(firewall_end.len(), 1);
        assert_eq!(instance_starts.len(), 3);
        assert!(instance_starts.iter().all(|&s| s > firewall_end[0]));
    }

    #[tokio::test]
    async fn test_instances_run_concurrently() {
        let runner = Arc::new(RecordingRunner::default());
        run(Arc::clone(&runner), &["a", "b", "c"], Mode::Apply).await;

        // Every instance starts before the first one ends.
        let starts = runner.position(|e| matches!(e, Event::Start(CommandKind::InstanceCreate, _)));
        let first_end = runner.position(|e| matches!(e, Event::End(CommandKind::InstanceCreate, _)))[0];
        assert!(starts.iter().all(|&s| s < first_end));
    }

    #[tokio::test]
    async fn test_failed_firewall_does_not_block_instances() {
        let runner = Arc::new(RecordingRunner {
            fail_kinds: vec![CommandKind::Firewall],
            ..RecordingRunner::default()
        });
        let (results, _) = run(Arc::clone(&runner), &["a", "b"], Mode::Apply).await;

        assert!(!results[0].succeeded);
        assert!(results[0]
            .error_detail
            .as_deref()
            .unwrap()
            .contains("already exists"));
        assert!(results[1..].iter().all(|r| r.succeeded));
        assert_eq!(
            runner
                .position(|e| matches!(e, Event::Start(CommandKind::InstanceCreate, _)))
                .len(),
            2
        );

        let report = Report::new(Mode::Apply, vec![], results);
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_instance_failure_is_isolated_and_results_keep_order() {
        let runner = Arc::new(RecordingRunner {
            fail_targets: vec!["b".into()],
            ..RecordingRunner::default()
        });
        let (results, _) = run(Arc::clone(&runner), &["a", "b", "c"], Mode::Apply).await;

        let outcomes: Vec<_> = results
            .iter()
            .skip(1)
            .map(|r| (r.command.target.clone().unwrap(), r.succeeded))
            .collect();
        assert_eq!(
            outcomes,
            [
                ("a".to_string(), true),
                ("b".to_string(), false),
                ("c".to_string(), true)
            ]
        );

        let report = Report::new(Mode::Apply, vec![], results);
        assert_eq!(report.failed_instances().count(), 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_subnet_runs_in_prelude() {
        let runner = Arc::new(RecordingRunner::default());
        let prompter = ScriptedPrompter::new(&[]);
        let presets = Presets {
            subnet_range: Some("10.8.0.0/24".into()),
            ..apply_presets(&["a", "b"])
        };
        let request = collect(&prompter, &presets).await.unwrap();
        let commands = build_commands(&request, &Policy::default());
        Dispatcher::new(Arc::clone(&runner) as Arc<dyn CommandRunner>)
            .dispatch(commands, Mode::Apply, &mut Vec::new())
            .await
            .unwrap();

        let events = runner.events();
        assert_eq!(
            events[..4],
            [
                Event::Start(CommandKind::Firewall, "allow-all".into()),
                Event::End(CommandKind::Firewall, "allow-all".into()),
                Event::Start(CommandKind::Subnet, "fleet-europe-west1".into()),
                Event::End(CommandKind::Subnet, "fleet-europe-west1".into()),
            ]
        );
    }
}

mod policy_file {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_policy_file_overrides_machine_type() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "machine_type = \"c2d-standard-8\"").unwrap();
        let policy = Policy::load(file.path()).unwrap();
        assert_eq!(policy.machine_type, "c2d-standard-8");
        assert_eq!(policy.firewall_rule, "allow-all");
    }

    #[test]
    fn test_missing_policy_file_is_error() {
        let err = Policy::load(std::path::Path::new("/nonexistent/policy.toml")).unwrap_err();
        assert!(matches!(err, FleetError::Policy(_)));
    }
}
