use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    event::{Event, Representation},
    handler::{Handler, HandlerError},
};

/// Logs a one-line summary of each event.
#[derive(Debug, Default)]
pub struct LoggingHandler;

#[async_trait::async_trait]
impl Handler for LoggingHandler {
    fn name(&self) -> &str {
        "logging"
    }

    async fn handle(&self, _ctx: &CancellationToken, event: &Event) -> Result<(), HandlerError> {
        let representation = match &event.representation {
            Representation::Absent => "none".to_string(),
            Representation::ValueList(items) => format!("{} values", items.len()),
            Representation::Fields(fields) => format!("{} fields", fields.len()),
        };
        info!(
            event_id = %event.id,
            realm = %event.realm_name,
            user_id = %event.auth_details.user_id,
            "{} {} {} (representation: {representation})",
            event.operation_type,
            event.resource_type,
            event.resource_path,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::decode_event;

    #[tokio::test]
    async fn test_logs_every_shape() {
        let ctx = CancellationToken::new();
        for raw in [
            r#"{"id": "1", "representation": null}"#,
            r#"{"id": "2", "representation": [{"name": "a"}]}"#,
            r#"{"id": "3", "representation": "{\"name\": \"b\"}"}"#,
        ] {
            let event = decode_event(raw.as_bytes()).unwrap();
            LoggingHandler.handle(&ctx, &event).await.unwrap();
        }
        assert_eq!(LoggingHandler.name(), "logging");
    }
}
