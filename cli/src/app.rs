//! Command handlers: load inputs, assemble plugins, run, and print results.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use cadence_core::api::{
    AppConfig, CancelSignal, CliError, ExecutionPlan, ExecutionStore, ExecutorError,
    LearningError, OutputFormat, TaskGraph,
};
use cadence_plugins::factory;
use cadence_plugins::store::{Catalog, InMemoryStore};

use crate::commands::cli::{LearnArgs, RunArgs, ValidateArgs};

pub fn read_plan(path: &Path) -> Result<ExecutionPlan, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("failed to read plan {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Input(format!("invalid plan {}: {e}", path.display())))
}

/// Cancel signal honouring `--deadline-secs` and Ctrl-C.
fn cancel_signal(deadline_secs: Option<u64>) -> CancelSignal {
    let mut cancel = CancelSignal::new();
    if let Some(secs) = deadline_secs {
        cancel = cancel.with_timeout(Duration::from_secs(secs));
    }
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

fn progress_enabled() -> bool {
    atty::is(atty::Stream::Stderr)
}

fn print_json<T: Serialize>(format: OutputFormat, value: &T) -> Result<(), CliError> {
    let rendered = match format {
        OutputFormat::Text => serde_json::to_string_pretty(value),
        OutputFormat::Jsonl => serde_json::to_string(value),
    }
    .map_err(|e| CliError::Command(format!("failed to render result: {e}")))?;
    println!("{rendered}");
    Ok(())
}

#[tracing::instrument(name = "cli.run", skip_all, fields(plan = %args.plan.display()))]
pub async fn run_plan(cfg: &AppConfig, args: RunArgs) -> Result<i32, CliError> {
    let plan = read_plan(&args.plan)?;
    let observers = factory::build_observers(cfg, progress_enabled()).await?;
    let executor = factory::build_executor(args.dry_run, Duration::from_secs(args.timeout_secs));
    let store: Arc<dyn ExecutionStore> = Arc::new(InMemoryStore::new());
    let plan_executor =
        factory::build_plan_executor(cfg, executor, observers.observer.clone(), Some(store));
    let cancel = cancel_signal(args.deadline_secs);

    let outcome = plan_executor.execute_plan(&plan, &cancel).await;
    observers.finish().await;
    let (result, error) = match outcome {
        Ok(result) => (result, None),
        Err(err) => {
            let (result, error) = err.into_parts();
            (result, Some(error))
        }
    };

    // jsonl output already carries the final result in its plan.end line
    if cfg.output.format == OutputFormat::Text {
        print_json(cfg.output.format, &result)?;
    }

    match error {
        Some(err) => Err(err.into()),
        None => Ok(0),
    }
}

pub fn validate_plan(args: ValidateArgs) -> Result<i32, CliError> {
    let plan = read_plan(&args.plan)?;
    plan.validate()?;
    let graph = TaskGraph::from_plan(&plan)?;
    let order = graph.resolve_order()?;
    let stages = graph.stages()?;

    println!("plan {} is valid ({} tasks)", plan.id, plan.tasks.len());
    println!("order: {}", order.join(" -> "));
    for (idx, stage) in stages.iter().enumerate() {
        println!("stage {}: {}", idx + 1, stage.join(", "));
    }
    Ok(0)
}

#[tracing::instrument(name = "cli.learn", skip_all, fields(objective = %args.objective))]
pub async fn learn(cfg: &AppConfig, args: LearnArgs) -> Result<i32, CliError> {
    let catalog = Catalog::load(&args.catalog).map_err(|e| CliError::Input(format!("{e:#}")))?;
    let store = Arc::new(InMemoryStore::from_catalog(catalog));
    let observers = factory::build_observers(cfg, progress_enabled()).await?;
    let executor = factory::build_executor(args.dry_run, Duration::from_secs(args.timeout_secs));
    let learning =
        factory::build_learning_loop(cfg, store, executor, observers.observer.clone());
    let cancel = cancel_signal(args.deadline_secs);

    let outcome = learning.execute_objective(&args.objective, &cancel).await;
    observers.finish().await;
    match outcome {
        Ok(result) => {
            print_json(cfg.output.format, &result)?;
            Ok(0)
        }
        Err(err) => {
            print_json(cfg.output.format, &err.result)?;
            Err(err.error.into())
        }
    }
}

pub fn show_config(cfg: &AppConfig) -> Result<i32, CliError> {
    let rendered = toml::to_string_pretty(cfg)
        .map_err(|e| CliError::Command(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(0)
}

pub fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success (including partial plans)
    // 11: config error
    // 20: bad input / IO error
    // 30: invalid plan
    // 40: execution failure
    // 50: internal/uncategorized
    // 130: cancelled
    match e {
        CliError::Config(_) => 11,
        CliError::Input(_) | CliError::Io(_) | CliError::Command(_) => 20,
        CliError::Execution(err) => execution_exit_code(err),
        CliError::Learning(err) => match err {
            LearningError::Cancelled(_) => 130,
            LearningError::ObjectiveNotFound(_) | LearningError::MethodNotFound(_) => 20,
            LearningError::Planner { .. } => 40,
            LearningError::Store(_) | LearningError::Ledger(_) => 50,
        },
        CliError::Anyhow(_) => 50,
    }
}

fn execution_exit_code(err: &ExecutorError) -> i32 {
    if err.is_validation() {
        30
    } else if err.is_cancelled() {
        130
    } else {
        40
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use cadence_core::api::{CancelReason, ConfigError};

    use super::*;

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(
            exit_code_for_error(&CliError::Config(ConfigError::Invalid("x".into()))),
            11
        );
        assert_eq!(exit_code_for_error(&CliError::Input("x".into())), 20);
        assert_eq!(
            exit_code_for_error(&CliError::Execution(ExecutorError::CircularDependency {
                task_id: "a".into(),
                path: "a -> b -> a".into(),
            })),
            30
        );
        assert_eq!(
            exit_code_for_error(&CliError::Execution(ExecutorError::AllTasksFailed {
                failed: 2
            })),
            40
        );
        assert_eq!(
            exit_code_for_error(&CliError::Execution(ExecutorError::Cancelled(
                CancelReason::Cancelled
            ))),
            130
        );
        assert_eq!(
            exit_code_for_error(&CliError::Learning(LearningError::ObjectiveNotFound(
                "o".into()
            ))),
            20
        );
        assert_eq!(
            exit_code_for_error(&CliError::Learning(LearningError::Cancelled(
                CancelReason::DeadlineExceeded
            ))),
            130
        );
        assert_eq!(
            exit_code_for_error(&CliError::Anyhow(anyhow::anyhow!("boom"))),
            50
        );
    }

    #[test]
    fn read_plan_reports_bad_json_as_input_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = read_plan(file.path()).unwrap_err();
        assert!(matches!(err, CliError::Input(_)));
    }

    #[test]
    fn read_plan_parses_a_plan_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "id": "plan-1",
                "objective_id": "o",
                "method_id": "m",
                "tasks": [{{"id": "a", "type": "shell"}}, {{"id": "b", "type": "shell"}}],
                "dependencies": [{{"task_id": "b", "depends_on": "a"}}]
            }}"#
        )
        .unwrap();
        let plan = read_plan(file.path()).unwrap();
        assert_eq!(plan.id, "plan-1");
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(validate_plan(ValidateArgs { plan: file.path().to_path_buf() }).unwrap(), 0);
    }

    #[test]
    fn config_renders_as_toml() {
        assert_eq!(show_config(&AppConfig::default()).unwrap(), 0);
    }
}
