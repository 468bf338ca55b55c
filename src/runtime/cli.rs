use super::{ConfirmResult, RuntimeError, RuntimeEvent, TrackerRuntime};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::Any;
use std::io::{self, Write};
use tokio::sync::mpsc;

pub struct CliRuntime {
    event_tx: RwLock<mpsc::UnboundedSender<RuntimeEvent>>,
    auto_confirm: bool,
    json_mode: bool,
}

impl CliRuntime {
    pub fn new(event_tx: mpsc::UnboundedSender<RuntimeEvent>, auto_confirm: bool, json_mode: bool) -> Self {
        Self {
            event_tx: RwLock::new(event_tx),
            auto_confirm,
            json_mode,
        }
    }

    /// Replace the event sender (each executed command gets a fresh channel)
    pub fn replace_event_tx(&self, new_tx: mpsc::UnboundedSender<RuntimeEvent>) {
        *self.event_tx.write() = new_tx;
    }

    /// Drop the current sender so the receiving output loop finishes.
    pub fn close_event_tx(&self) {
        let (closed_tx, _) = mpsc::unbounded_channel();
        self.replace_event_tx(closed_tx);
    }
}

#[async_trait]
impl TrackerRuntime for CliRuntime {
    fn emit(&self, event: RuntimeEvent) -> Result<(), RuntimeError> {
        self.event_tx
            .read()
            .send(event)
            .map_err(|_| RuntimeError::ReceiverClosed)?;
        Ok(())
    }

    async fn request_confirmation(&self, prompt: String) -> Result<ConfirmResult, RuntimeError> {
        if self.auto_confirm {
            if !self.json_mode {
                eprintln!("[auto-confirmed] {}", prompt);
            }
            return Ok(ConfirmResult::Confirmed);
        }

        if !atty::is(atty::Stream::Stdin) {
            return Err(RuntimeError::NotInteractive);
        }

        eprint!("{} (y/N): ", prompt);
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(ConfirmResult::Confirmed),
            _ => Ok(ConfirmResult::Declined),
        }
    }

    fn is_interactive(&self) -> bool {
        atty::is(atty::Stream::Stdin)
    }

    fn auto_confirm(&self) -> bool {
        self.auto_confirm
    }

    async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.close_event_tx();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_confirm_skips_prompt() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let runtime = CliRuntime::new(tx, true, true);

        let answer = runtime
            .request_confirmation("Edit this goal?".to_string())
            .await
            .unwrap();
        assert_eq!(answer, ConfirmResult::Confirmed);
    }

    #[tokio::test]
    async fn test_emit_after_close_reports_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runtime = CliRuntime::new(tx, false, false);

        runtime.emit(RuntimeEvent::notice("first")).unwrap();
        runtime.close_event_tx();

        assert!(matches!(
            runtime.emit(RuntimeEvent::notice("second")),
            Err(RuntimeError::ReceiverClosed)
        ));
        assert!(matches!(rx.recv().await, Some(RuntimeEvent::Notice { .. })));
        assert!(rx.recv().await.is_none());
    }
}
