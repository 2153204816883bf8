//! Command dispatch

use crate::cli::{Commands, HistoryCommands, Target};
use autofix_artifact::{Filename, ProjectName};
use autofix_core::{AutofixConfig, CodeAssistant, RetryBudget};
use autofix_store::HistorySearch;
use serde::Serialize;

/// What a command printed and whether it should count as success
pub(crate) struct Outcome {
    pub(crate) body: String,
    pub(crate) success: bool,
}

impl Outcome {
    fn json<T: Serialize>(value: &T, success: bool) -> anyhow::Result<Self> {
        Ok(Self {
            body: serde_json::to_string_pretty(value)?,
            success,
        })
    }
}

pub(crate) async fn execute(
    command: Commands,
    assistant: &CodeAssistant,
) -> anyhow::Result<Outcome> {
    let config = assistant.config();
    match command {
        Commands::Generate {
            target,
            budget,
            instruction,
        } => {
            let (project, filename) = resolve(config, target);
            let response = assistant
                .generate_code(&project, &filename, &instruction, budget.map(RetryBudget::new))
                .await?;
            let success = response.status.is_success();
            Outcome::json(&response, success)
        }
        Commands::Run { target } => {
            let (project, filename) = resolve(config, target);
            let response = assistant.run_code(&project, &filename).await?;
            let success = response.exit_status == 0;
            Outcome::json(&response, success)
        }
        Commands::Show { target } => {
            let (project, filename) = resolve(config, target);
            let source = assistant.get_code(&project, &filename).await?;
            Ok(Outcome {
                body: source,
                success: true,
            })
        }
        Commands::Fix {
            target,
            instruction,
            budget,
        } => {
            let (project, filename) = resolve(config, target);
            let response = assistant
                .auto_fix_code(
                    &project,
                    &filename,
                    instruction.as_deref(),
                    budget.map(RetryBudget::new),
                )
                .await?;
            let success = response.status.is_success();
            Outcome::json(&response, success)
        }
        Commands::Versions { project } => {
            let project = project.unwrap_or_else(|| config.default_project.clone());
            let versions = assistant.list_versions(&project).await?;
            Outcome::json(&versions, true)
        }
        Commands::Rollback {
            project,
            key,
            target,
        } => {
            let project = project.unwrap_or_else(|| config.default_project.clone());
            let response = assistant
                .rollback_to_version(&project, &key, target.as_ref())
                .await?;
            Outcome::json(&response, true)
        }
        Commands::History { command } => history(command, assistant).await,
    }
}

async fn history(command: HistoryCommands, assistant: &CodeAssistant) -> anyhow::Result<Outcome> {
    let default_project = || assistant.config().default_project.clone();
    match command {
        HistoryCommands::Latest { project } => {
            let project = project.unwrap_or_else(default_project);
            let latest = assistant.latest_history(&project).await?;
            Outcome::json(&latest, true)
        }
        HistoryCommands::Search {
            project,
            keyword,
            start,
            end,
        } => {
            let project = project.unwrap_or_else(default_project);
            let mut search = HistorySearch::new();
            if let Some(keyword) = keyword {
                search = search.with_keyword(keyword);
            }
            match (start, end) {
                (Some(start), Some(end)) => search = search.with_range(start, end),
                (None, None) => {}
                _ => tracing::warn!("Only one of --start/--end given; range ignored"),
            }
            let found = assistant.search_history(&project, &search).await?;
            Outcome::json(&found, true)
        }
        HistoryCommands::Range {
            project,
            start,
            end,
        } => {
            let project = project.unwrap_or_else(default_project);
            let found = assistant.history_range(&project, start, end).await?;
            Outcome::json(&found, true)
        }
    }
}

fn resolve(config: &AutofixConfig, target: Target) -> (ProjectName, Filename) {
    (
        target
            .project
            .unwrap_or_else(|| config.default_project.clone()),
        target
            .file
            .unwrap_or_else(|| config.primary_filename.clone()),
    )
}
