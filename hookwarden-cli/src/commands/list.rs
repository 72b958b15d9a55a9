//! `hookwarden list` - show hooks and their subscriptions.

use super::table;
use crate::context::ProjectContext;
use crate::error::CliResult;
use crate::exit_codes::EXIT_SUCCESS;
use hookwarden_config::{EventMatcher, HookAction, HookDefinition};

/// Maximum length of the action column before truncation.
const MAX_ACTION_LENGTH: usize = 40;

/// List every hook in manifest order.
pub fn run_list(ctx: &ProjectContext, json: bool) -> CliResult<i32> {
    let manifest = ctx.load_manifest()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest.hooks)?);
        return Ok(EXIT_SUCCESS);
    }
    if manifest.hooks.is_empty() {
        println!("No hooks defined.");
        return Ok(EXIT_SUCCESS);
    }

    let mut hooks = table(vec!["Name", "Events", "Action", "Timeout", "Fail mode", "Enabled"]);
    for hook in &manifest.hooks {
        hooks.add_row(vec![
            hook.name.clone(),
            events(hook),
            truncate(&action(&hook.action), MAX_ACTION_LENGTH),
            format!("{}s", hook.timeout.as_secs()),
            hook.fail_mode.to_string(),
            if hook.enabled { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{hooks}");
    Ok(EXIT_SUCCESS)
}

fn events(hook: &HookDefinition) -> String {
    hook.events
        .iter()
        .map(describe_matcher)
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_matcher(matcher: &EventMatcher) -> String {
    if matcher.filter.is_empty() {
        return matcher.event_type.clone();
    }
    let filters: Vec<String> = matcher
        .filter
        .iter()
        .map(|f| format!("{}={}", f.field, f.pattern.as_str()))
        .collect();
    format!("{} [{}]", matcher.event_type, filters.join(", "))
}

fn action(action: &HookAction) -> String {
    match action {
        HookAction::Script(path) => format!("script: {}", path.display()),
        HookAction::Command(command) => format!("command: {command}"),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long command line", 10), "a very ...");
    }

    #[test]
    fn test_describe_matcher_with_filter() {
        let manifest = hookwarden_config::load(
            "version: 1\nhooks:\n  - name: a\n    events:\n      - type: workflow.completed\n        filter:\n          workflow: release-*\n    command: x\n",
        )
        .unwrap();
        assert_eq!(
            describe_matcher(&manifest.hooks[0].events[0]),
            "workflow.completed [workflow=release-*]"
        );
    }
}
