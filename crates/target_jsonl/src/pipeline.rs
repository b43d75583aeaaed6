use serde_json::Value;
use tap_events::{LineRecord, RecordMessage, SchemaMessage, TapMessage};

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::registry::SchemaRegistry;
use crate::strategy::{AppendOutcome, FinalizeOutcome, WriteStrategy};
use crate::TargetError;

/// Lifecycle of one [`Pipeline`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PipelinePhase {
    AwaitingMessages,
    Dispatching,
    Finalizing,
    Done,
    Failed,
}

/// Drives one run: registry updates, validation, writes and checkpoint tracking.
///
/// Messages are handled strictly one at a time; a message's side effects are complete before
/// the next one is looked at. The first fatal error moves the pipeline to
/// [`PipelinePhase::Failed`] and nothing further is processed.
pub struct Pipeline {
    registry: SchemaRegistry,
    strategy: WriteStrategy,
    checkpoint: Option<Value>,
    diagnostics: Box<dyn DiagnosticsSink>,
    phase: PipelinePhase,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("strategy", &self.strategy.name())
            .field("streams", &self.registry.len())
            .field("checkpoint", &self.checkpoint)
            .field("phase", &self.phase)
            .finish()
    }
}

impl Pipeline {
    pub fn new(strategy: WriteStrategy, mut diagnostics: Box<dyn DiagnosticsSink>) -> Self {
        diagnostics.emit(Diagnostic::RunStarted {
            strategy: strategy.name(),
            timestamp: strategy
                .naming()
                .timestamp()
                .map(|ts| ts.as_str().to_string()),
        });
        Self {
            registry: SchemaRegistry::new(),
            strategy,
            checkpoint: None,
            diagnostics,
            phase: PipelinePhase::AwaitingMessages,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn checkpoint(&self) -> Option<&Value> {
        self.checkpoint.as_ref()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn strategy(&self) -> &WriteStrategy {
        &self.strategy
    }

    /// Processes every decoded line, then finalizes. Returns the checkpoint to emit, if any.
    ///
    /// A line that failed to decode aborts the run with [`TargetError::Decode`].
    pub async fn run<I>(mut self, lines: I) -> Result<Option<Value>, TargetError>
    where
        I: IntoIterator<Item = LineRecord<TapMessage>>,
    {
        for line in lines {
            let LineRecord {
                line_number,
                raw_line,
                outcome,
            } = line;
            let message = match outcome {
                Ok(message) => message,
                Err(reason) => {
                    self.phase = PipelinePhase::Failed;
                    self.diagnostics.emit(Diagnostic::DecodeFailed {
                        line_number,
                        raw_line,
                        reason: reason.to_string(),
                    });
                    return Err(TargetError::Decode {
                        line_number,
                        reason,
                    });
                }
            };
            self.dispatch(line_number, message).await?;
        }
        self.finish().await
    }

    /// Handles one message. After an error the pipeline stays [`PipelinePhase::Failed`].
    pub async fn dispatch(
        &mut self,
        line_number: usize,
        message: TapMessage,
    ) -> Result<(), TargetError> {
        self.phase = PipelinePhase::Dispatching;
        let result = match message {
            TapMessage::Schema(schema) => self.on_schema(schema),
            TapMessage::Record(record) => self.on_record(record).await,
            TapMessage::State(state) => {
                self.diagnostics.emit(Diagnostic::StateSet {
                    value: state.value.clone(),
                });
                // a null value withdraws the checkpoint
                self.checkpoint = (!state.value.is_null()).then_some(state.value);
                Ok(())
            }
            TapMessage::Other { message_type, .. } => {
                self.diagnostics.emit(Diagnostic::UnknownMessageType {
                    line_number,
                    message_type,
                });
                Ok(())
            }
        };
        self.phase = match result {
            Ok(()) => PipelinePhase::AwaitingMessages,
            Err(_) => PipelinePhase::Failed,
        };
        result
    }

    /// Finalizes the write strategy and returns the checkpoint that survives it.
    pub async fn finish(mut self) -> Result<Option<Value>, TargetError> {
        self.phase = PipelinePhase::Finalizing;
        let outcome = match self.strategy.finalize(self.diagnostics.as_mut()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.phase = PipelinePhase::Failed;
                return Err(err);
            }
        };
        if outcome == FinalizeOutcome::DiscardCheckpoint {
            self.checkpoint = None;
        }
        self.phase = PipelinePhase::Done;
        self.diagnostics.emit(Diagnostic::Finalized {
            checkpoint_present: self.checkpoint.is_some(),
        });
        Ok(self.checkpoint.take())
    }

    fn on_schema(&mut self, message: SchemaMessage) -> Result<(), TargetError> {
        let SchemaMessage {
            stream,
            schema,
            key_properties,
            ..
        } = message;
        let registered = self
            .registry
            .register(&stream, schema, key_properties)?
            .key_properties()
            .to_vec();
        self.diagnostics.emit(Diagnostic::SchemaRegistered {
            stream,
            key_properties: registered,
        });
        Ok(())
    }

    async fn on_record(&mut self, message: RecordMessage) -> Result<(), TargetError> {
        let validator = self.registry.validator(&message.stream)?;
        if let Err(violations) = validator.validate(&message.record) {
            let first = violations.first();
            self.diagnostics.emit(Diagnostic::ValidationFailed {
                stream: message.stream.clone(),
                path: first.path.clone(),
                message: first.message.clone(),
            });
            return Err(TargetError::Validation {
                stream: message.stream,
                path: first.path.clone(),
                message: first.message.clone(),
                violations: violations.len(),
            });
        }

        let outcome = self
            .strategy
            .append(&message.stream, &message.record)
            .await?;
        if outcome == AppendOutcome::ClearCheckpoint {
            self.checkpoint = None;
        }
        Ok(())
    }
}
