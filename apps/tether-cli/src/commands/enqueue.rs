//! Producer commands.

use anyhow::Context;
use serde_json::{json, Value};
use tether_core::NewAction;

use super::print_json;
use crate::cli::EnqueueArgs;
use crate::state::CliQueue;

pub async fn enqueue(queue: &CliQueue, args: EnqueueArgs) -> anyhow::Result<()> {
    let mut action = NewAction::new(args.kind, args.target, args.verb)
        .priority(args.priority)
        .max_retries(args.max_retries)
        .headers(args.headers.into_iter().collect());

    if let Some(raw) = args.payload {
        action = action.payload(parse_json("payload", &raw)?);
    }

    let id = queue.enqueue(action).await;
    print_json(&json!({ "id": id }))
}

pub async fn content_save(
    queue: &CliQueue,
    content: &str,
    content_id: Option<&str>,
) -> anyhow::Result<()> {
    let content = parse_json("content", content)?;
    let id = queue.enqueue_content_save(content, content_id).await;
    print_json(&json!({ "id": id }))
}

pub async fn analytics_event(queue: &CliQueue, event: &str) -> anyhow::Result<()> {
    let id = queue.enqueue_analytics_event(parse_json("event", event)?).await;
    print_json(&json!({ "id": id }))
}

pub async fn user_action(queue: &CliQueue, action: &str) -> anyhow::Result<()> {
    let id = queue.enqueue_user_action(parse_json("action", action)?).await;
    print_json(&json!({ "id": id }))
}

fn parse_json(field: &str, raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--{field} is not valid JSON"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        assert_eq!(parse_json("payload", r#"{"a":1}"#).unwrap(), json!({"a": 1}));

        let err = parse_json("event", "{oops").unwrap_err();
        assert_eq!(err.to_string(), "--event is not valid JSON");
    }
}
