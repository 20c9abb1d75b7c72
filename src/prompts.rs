// ABOUTME: Built-in prompt templates and the argument-substitution renderer
// ABOUTME: Ships the analyze/debug/test prompt set and renders {placeholder} templates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! Prompt templates.
//!
//! Prompts are registered alongside tools and resources. `prompts/get`
//! renders the template by substituting `{argument}` placeholders; a missing
//! required argument is a VALIDATION_ERROR.

use crate::errors::{validation_error, McpToolError};
use crate::registry::{PromptArgument, PromptDescriptor};
use serde_json::{Map, Value};

/// The prompt set every server instance registers at boot.
#[must_use]
pub fn builtin_prompts() -> Vec<PromptDescriptor> {
    vec![
        PromptDescriptor {
            name: "codomyrmex.analyze_module".to_owned(),
            description: "Analyze a Codomyrmex module: structure, exports, tests, documentation"
                .to_owned(),
            arguments: vec![PromptArgument {
                name: "module_name".to_owned(),
                description: "Module to analyze".to_owned(),
                required: true,
            }],
            template: "Analyze the Codomyrmex module '{module_name}'. \
                       Use codomyrmex.module_info to get its exports, then \
                       codomyrmex.search_codebase to find its tests, and \
                       codomyrmex.read_file to review its README.md. \
                       Provide: 1) Purpose, 2) Key exports, 3) Test coverage, 4) Recommendations."
                .to_owned(),
        },
        PromptDescriptor {
            name: "codomyrmex.debug_issue".to_owned(),
            description: "Debug an issue using Codomyrmex tools".to_owned(),
            arguments: vec![PromptArgument {
                name: "description".to_owned(),
                description: "Issue description".to_owned(),
                required: true,
            }],
            template: "Debug this issue: '{description}'. \
                       Use codomyrmex.search_codebase to find relevant code, \
                       codomyrmex.git_diff to check recent changes, and \
                       codomyrmex.run_tests to verify. \
                       Provide: 1) Root cause, 2) Fix, 3) Verification steps."
                .to_owned(),
        },
        PromptDescriptor {
            name: "codomyrmex.create_test".to_owned(),
            description: "Generate tests for a Codomyrmex module".to_owned(),
            arguments: vec![PromptArgument {
                name: "module_name".to_owned(),
                description: "Module to create tests for".to_owned(),
                required: true,
            }],
            template: "Create tests for the Codomyrmex module '{module_name}'. \
                       Use codomyrmex.module_info to get exports, then \
                       codomyrmex.read_file to review the source. \
                       Generate tests using real objects, no mocks."
                .to_owned(),
        },
    ]
}

/// Render a prompt template with the supplied arguments.
///
/// # Errors
/// Returns a VALIDATION_ERROR envelope when a required argument is missing.
pub fn render_prompt(
    descriptor: &PromptDescriptor,
    arguments: &Map<String, Value>,
) -> Result<String, McpToolError> {
    let mut rendered = descriptor.template.clone();
    for argument in &descriptor.arguments {
        let placeholder = format!("{{{}}}", argument.name);
        let value = arguments.get(&argument.name).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        match value {
            Some(value) => rendered = rendered.replace(&placeholder, &value),
            None if argument.required => {
                return Err(validation_error(
                    &descriptor.name,
                    format!("missing required prompt argument {:?}", argument.name),
                    Some(&argument.name),
                ));
            }
            None => rendered = rendered.replace(&placeholder, ""),
        }
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_placeholders() {
        let prompts = builtin_prompts();
        let analyze = &prompts[0];
        let mut args = Map::new();
        args.insert("module_name".to_owned(), json!("security"));
        let rendered = render_prompt(analyze, &args).unwrap_or_default();
        assert!(rendered.contains("'security'"));
        assert!(!rendered.contains("{module_name}"));
    }

    #[test]
    fn missing_required_argument_is_validation_error() {
        let prompts = builtin_prompts();
        let err = render_prompt(&prompts[0], &Map::new());
        assert!(err.is_err());
    }
}
