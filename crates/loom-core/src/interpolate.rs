//! Variable interpolation: `{{ EXPR }}` placeholder substitution against an
//! [`ExecutionContext`].

use crate::context::{ExecutionContext, USER_QUESTION_KEY};
use crate::error::EngineError;

const INPUT_ALIASES: &[&str] = &["input", "输入", "用户问题", "开始流程"];
const PREVIOUS_ALIASES: &[&str] = &["previous", "上一节点", "上一个输出"];

/// Finds the next `{{ ... }}` span starting at or after `from`, returning
/// `(match_start, match_end, expr)` with `expr` trimmed and its optional
/// ` > description` annotation stripped.
fn next_placeholder(template: &str, from: usize) -> Option<(usize, usize, String)> {
    let rest = &template[from..];
    let open = rest.find("{{")?;
    let after_open = from + open + 2;
    let close_rel = template[after_open..].find("}}")?;
    let close = after_open + close_rel;
    let raw = &template[after_open..close];
    let expr = raw.split('>').next().unwrap_or(raw).trim().to_string();
    Some((from + open, close + 2, expr))
}

fn resolve(ctx: &ExecutionContext, expr: &str) -> Option<String> {
    if INPUT_ALIASES.contains(&expr) {
        return Some(
            ctx.variables
                .get(USER_QUESTION_KEY)
                .map(|v| v.value().clone())
                .unwrap_or_else(|| ctx.initial_input.clone()),
        );
    }
    if PREVIOUS_ALIASES.contains(&expr) {
        return Some(ctx.last_output());
    }
    if let Some(node_id) = expr.strip_prefix('@') {
        return ctx.node_outputs.get(node_id).map(|v| v.value().clone());
    }
    if let Some(v) = ctx.node_outputs.get(expr) {
        return Some(v.value().clone());
    }
    ctx.variables.get(expr).map(|v| v.value().clone())
}

/// Non-strict interpolation: unresolved references are preserved literally.
pub fn interpolate(ctx: &ExecutionContext, template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    while let Some((start, end, expr)) = next_placeholder(template, cursor) {
        out.push_str(&template[cursor..start]);
        match resolve(ctx, &expr) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&template[start..end]),
        }
        cursor = end;
    }
    out.push_str(&template[cursor..]);
    out
}

/// Strict interpolation: fails with [`EngineError::Input`] on the first
/// unresolved reference.
pub fn interpolate_strict(ctx: &ExecutionContext, template: &str) -> Result<String, EngineError> {
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    while let Some((start, end, expr)) = next_placeholder(template, cursor) {
        out.push_str(&template[cursor..start]);
        match resolve(ctx, &expr) {
            Some(value) => out.push_str(&value),
            None => {
                return Err(EngineError::input(format!(
                    "undefined variable referenced in template: {expr}"
                )));
            }
        }
        cursor = end;
    }
    out.push_str(&template[cursor..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(vars: &[(&str, &str)]) -> ExecutionContext {
        let ctx = ExecutionContext::new("", 10, 30);
        for (k, v) in vars {
            ctx.variables.insert((*k).to_string(), (*v).to_string());
        }
        ctx
    }

    #[test]
    fn literal_without_placeholders_is_idempotent() {
        let ctx = ctx_with(&[]);
        let text = "no placeholders here";
        assert_eq!(interpolate(&ctx, text), text);
    }

    #[test]
    fn resolves_input_alias_from_user_question() {
        let ctx = ctx_with(&[(USER_QUESTION_KEY, "world")]);
        assert_eq!(interpolate(&ctx, "Hello, {{input}}!"), "Hello, world!");
        assert_eq!(interpolate(&ctx, "Hello, {{用户问题}}!"), "Hello, world!");
    }

    #[test]
    fn unresolved_reference_passes_through_literally() {
        let ctx = ctx_with(&[]);
        assert_eq!(interpolate(&ctx, "{{nope}}"), "{{nope}}");
    }

    #[test]
    fn strict_mode_fails_on_unresolved_reference() {
        let ctx = ctx_with(&[]);
        assert!(interpolate_strict(&ctx, "{{nope}}").is_err());
    }

    #[test]
    fn node_id_reference_resolves_via_at_prefix() {
        let ctx = ctx_with(&[]);
        ctx.node_outputs.insert("n1".into(), "hi".into());
        assert_eq!(interpolate(&ctx, "{{@n1}}"), "hi");
    }

    #[test]
    fn annotation_suffix_is_ignored() {
        let ctx = ctx_with(&[("name", "Ada")]);
        assert_eq!(interpolate(&ctx, "{{ name > the user's name }}"), "Ada");
    }

    #[test]
    fn bare_name_prefers_node_outputs_over_variables() {
        let ctx = ctx_with(&[("x", "from-variable")]);
        ctx.node_outputs.insert("x".into(), "from-node".into());
        assert_eq!(interpolate(&ctx, "{{x}}"), "from-node");
    }
}
