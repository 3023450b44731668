use async_trait::async_trait;
use loom_core::model::{ExtractMode, InputMode, NodeConfig};
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};
use regex::Regex;

use crate::interpolate_in;
use crate::markdown::md_to_text;

fn resolve_input(hc: &HandlerContext<'_>, input_mode: &InputMode, input_variable: &str) -> String {
    match input_mode {
        InputMode::Manual => interpolate_in(hc.ctx, input_variable),
        InputMode::Variable => hc
            .ctx
            .node_outputs
            .get(input_variable)
            .map(|v| v.value().clone())
            .or_else(|| hc.ctx.variables.get(input_variable).map(|v| v.value().clone()))
            .unwrap_or_default(),
    }
}

fn extract_regex(input: &str, pattern: &str) -> Result<String, EngineError> {
    if pattern.is_empty() {
        return Err(EngineError::configuration("empty regex pattern"));
    }
    let re = Regex::new(pattern).map_err(|e| EngineError::input(format!("invalid regex pattern: {e}")))?;
    let matches: Vec<String> = re
        .captures_iter(input)
        .map(|caps| {
            if caps.len() > 1 {
                (1..caps.len())
                    .filter_map(|i| caps.get(i).map(|m| m.as_str().to_string()))
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default()
            }
        })
        .collect();
    Ok(matches.join("\n"))
}

fn extract_start_end(input: &str, start_marker: &str, end_marker: &str) -> Result<String, EngineError> {
    if start_marker.is_empty() {
        return Err(EngineError::configuration("empty start marker"));
    }
    let Some(start_pos) = input.find(start_marker) else {
        return Ok(String::new());
    };
    let after_start = start_pos + start_marker.len();
    let rest = &input[after_start..];
    if end_marker.is_empty() {
        return Ok(rest.to_string());
    }
    match rest.find(end_marker) {
        Some(end_pos) => Ok(rest[..end_pos].to_string()),
        None => Ok(rest.to_string()),
    }
}

/// Dot segments plus bracketed indices, e.g. `items[0].name`.
fn walk_json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for raw_segment in path.split('.') {
        let mut segment = raw_segment;
        loop {
            if let Some(bracket_start) = segment.find('[') {
                let key = &segment[..bracket_start];
                if !key.is_empty() {
                    current = current.get(key)?;
                }
                let bracket_end = segment[bracket_start..].find(']')? + bracket_start;
                let index: usize = segment[bracket_start + 1..bracket_end].parse().ok()?;
                current = current.get(index)?;
                segment = &segment[bracket_end + 1..];
            } else {
                if !segment.is_empty() {
                    current = current.get(segment)?;
                }
                break;
            }
        }
    }
    Some(current)
}

fn extract_json_path(input: &str, path: &str) -> Result<String, EngineError> {
    if path.is_empty() {
        return Err(EngineError::configuration("empty json path"));
    }
    let value: serde_json::Value =
        serde_json::from_str(input).map_err(|e| EngineError::input(format!("invalid json: {e}")))?;
    match walk_json_path(&value, path) {
        None => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

pub struct TextExtractHandler;

#[async_trait]
impl NodeHandler for TextExtractHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::TextExtract(c) => c,
            _ => return Err(EngineError::runtime("text_extract handler received a non-text_extract node")),
        };

        let input = resolve_input(&hc, &config.input_mode, &config.input_variable);

        let extracted = match &config.extract_mode {
            ExtractMode::Regex => extract_regex(&input, &config.regex_pattern)?,
            ExtractMode::StartEnd => extract_start_end(&input, &config.start_marker, &config.end_marker)?,
            ExtractMode::JsonPath => extract_json_path(&input, &config.json_path)?,
            ExtractMode::MdToText => md_to_text(&input),
        };

        Ok(HandlerOutcome::output(extracted.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixtures;
    use loom_core::model::{Node, TextExtractConfig};
    use loom_core::ExecutionContext;

    fn config(mode: ExtractMode) -> TextExtractConfig {
        TextExtractConfig {
            input_mode: InputMode::Variable,
            input_variable: "in".into(),
            extract_mode: mode,
            regex_pattern: String::new(),
            start_marker: String::new(),
            end_marker: String::new(),
            json_path: String::new(),
        }
    }

    #[tokio::test]
    async fn regex_extract_joins_capture_groups() {
        let ctx = ExecutionContext::new("", 10, 30);
        ctx.variables.insert("in".into(), "订单号：12345".into());
        let mut cfg = config(ExtractMode::Regex);
        cfg.regex_pattern = "订单号：(\\d+)".into();
        let node = Node::new("e", "Extract", 0, NodeConfig::TextExtract(cfg));
        let fixtures = Fixtures::new(node);
        let outcome = TextExtractHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.output, "12345");
    }

    #[tokio::test]
    async fn regex_with_no_match_yields_empty_string() {
        let ctx = ExecutionContext::new("", 10, 30);
        ctx.variables.insert("in".into(), "nothing here".into());
        let mut cfg = config(ExtractMode::Regex);
        cfg.regex_pattern = "\\d+".into();
        let node = Node::new("e", "Extract", 0, NodeConfig::TextExtract(cfg));
        let fixtures = Fixtures::new(node);
        let outcome = TextExtractHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.output, "");
    }

    #[tokio::test]
    async fn start_end_extracts_between_markers() {
        let ctx = ExecutionContext::new("", 10, 30);
        ctx.variables.insert("in".into(), "prefix<<A>>suffix".into());
        let mut cfg = config(ExtractMode::StartEnd);
        cfg.start_marker = "<<".into();
        cfg.end_marker = ">>".into();
        let node = Node::new("e", "Extract", 0, NodeConfig::TextExtract(cfg));
        let fixtures = Fixtures::new(node);
        let outcome = TextExtractHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.output, "A");
    }

    #[tokio::test]
    async fn json_path_missing_returns_empty_not_error() {
        let ctx = ExecutionContext::new("", 10, 30);
        ctx.variables.insert("in".into(), "{\"a\":1}".into());
        let mut cfg = config(ExtractMode::JsonPath);
        cfg.json_path = "b.c".into();
        let node = Node::new("e", "Extract", 0, NodeConfig::TextExtract(cfg));
        let fixtures = Fixtures::new(node);
        let outcome = TextExtractHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.output, "");
    }

    #[tokio::test]
    async fn json_path_walks_array_index() {
        let ctx = ExecutionContext::new("", 10, 30);
        ctx.variables.insert("in".into(), "{\"items\":[{\"name\":\"x\"},{\"name\":\"y\"}]}".into());
        let mut cfg = config(ExtractMode::JsonPath);
        cfg.json_path = "items[1].name".into();
        let node = Node::new("e", "Extract", 0, NodeConfig::TextExtract(cfg));
        let fixtures = Fixtures::new(node);
        let outcome = TextExtractHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.output, "y");
    }
}
