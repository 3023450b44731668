//! Shared condition evaluation for the legacy monolithic `condition`/`loop`
//! nodes and the block-form `condition_if`: keyword/length/regex/ai_judge.

use loom_core::{CancelFlag, ChatParams, ChatTransport, EngineError};
use regex::Regex;

use loom_core::model::{ConditionKind, KeywordMode, LengthOperator};

async fn drain_to_string(mut rx: tokio::sync::mpsc::Receiver<loom_core::ChatChunk>) -> String {
    let mut buffer = String::new();
    while let Some(chunk) = rx.recv().await {
        buffer.push_str(&chunk.content);
        if chunk.done {
            break;
        }
    }
    buffer
}

pub async fn evaluate(
    kind: &ConditionKind,
    input: &str,
    transport: &dyn ChatTransport,
    cancel: &CancelFlag,
) -> Result<bool, EngineError> {
    match kind {
        ConditionKind::Keyword { keywords, mode } => Ok(match mode {
            KeywordMode::Any => keywords.is_empty() || keywords.iter().any(|k| input.contains(k.as_str())),
            KeywordMode::All => keywords.iter().all(|k| input.contains(k.as_str())),
            KeywordMode::None => keywords.iter().all(|k| !input.contains(k.as_str())),
        }),
        ConditionKind::Length { operator, length_value } => {
            let len = input.chars().count();
            Ok(match operator {
                LengthOperator::Gt => len > *length_value,
                LengthOperator::Lt => len < *length_value,
                LengthOperator::Eq => len == *length_value,
                LengthOperator::Ge => len >= *length_value,
                LengthOperator::Le => len <= *length_value,
            })
        }
        ConditionKind::Regex { pattern } => {
            // Invalid regex yields false (not an error), per the legacy contract.
            Ok(Regex::new(pattern).map(|re| re.is_match(input)).unwrap_or(false))
        }
        ConditionKind::AiJudge { ai_prompt, provider, model } => {
            let prompt = format!(
                "{ai_prompt}\n\n请根据以上要求判断以下内容，只需要回复 true 或 false：\n\n{input}"
            );
            let params = ChatParams {
                provider: provider.clone(),
                model: model.clone(),
                messages: vec![loom_core::ChatMessage::user(prompt)],
                temperature: Some(0.0),
                max_tokens: Some(10),
                top_p: None,
                reasoning_effort: None,
            };
            if !transport.provider_available(provider) {
                return Err(EngineError::configuration(format!(
                    "provider not available for ai_judge: {provider}"
                )));
            }
            let rx = transport.stream_chat(params, loom_core::AbortSignal::new(cancel.as_watch())).await?;
            let reply = drain_to_string(rx).await.to_lowercase();
            Ok(reply.contains("true") && !reply.contains("false"))
        }
    }
}
