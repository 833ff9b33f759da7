//! Shared helpers for engine tests (also exported behind the `testing`
//! feature for downstream integration tests).

use crate::controller::{Controller, ErrorListener, MessageListener};
use crate::error::EngineError;
use crate::executable::Executable;
use crate::expr::ContextItem;
use crate::instruct::Instruction;
use std::sync::{Arc, Mutex, PoisonError};
use weft_model::{EventBuffer, SourceNode};

/// A listener that records everything it is told, for assertions.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    inner: Arc<Mutex<Collected>>,
}

#[derive(Debug, Default)]
struct Collected {
    warnings: Vec<String>,
    recoverable: Vec<String>,
    fatal: Vec<String>,
    messages: Vec<String>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lock().warnings.clone()
    }

    pub fn recoverable_errors(&self) -> Vec<String> {
        self.lock().recoverable.clone()
    }

    pub fn fatal_errors(&self) -> Vec<String> {
        self.lock().fatal.clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().messages.clone()
    }

    pub fn fatal_count(&self) -> usize {
        self.lock().fatal.len()
    }

    pub fn recoverable_count(&self) -> usize {
        self.lock().recoverable.len()
    }
}

impl ErrorListener for CollectingListener {
    fn warning(&self, message: &str) {
        self.lock().warnings.push(message.to_string());
    }

    fn recoverable(&self, error: &EngineError) -> Result<(), EngineError> {
        self.lock().recoverable.push(error.to_string());
        Ok(())
    }

    fn fatal(&self, error: &EngineError) {
        self.lock().fatal.push(error.to_string());
    }
}

impl MessageListener for CollectingListener {
    fn message(&self, content: &str, _terminate: bool) {
        self.lock().messages.push(content.to_string());
    }
}

/// Transforms `root` and returns the recorded output events.
pub fn transform_to_buffer<N: SourceNode>(
    executable: &Executable<N>,
    root: N,
) -> Result<EventBuffer, EngineError> {
    let mut buffer = EventBuffer::new();
    Controller::new(executable).transform(root, &mut buffer)?;
    Ok(buffer)
}

/// Transforms `root` and returns the concatenated character output.
pub fn transform_to_text<N: SourceNode>(
    executable: &Executable<N>,
    root: N,
) -> Result<String, EngineError> {
    transform_to_buffer(executable, root).map(|b| b.text())
}

/// A text-emitting instruction.
pub fn text<N: SourceNode>(content: &str) -> Instruction<N> {
    Instruction::Text(content.to_string())
}

/// An instruction block.
pub fn seq<N: SourceNode>(instructions: Vec<Instruction<N>>) -> Instruction<N> {
    Instruction::Sequence(instructions)
}

/// `value-of select="."`.
pub fn value_of_context<N: SourceNode>() -> Instruction<N> {
    Instruction::ValueOf {
        select: Arc::new(ContextItem),
        separator: None,
    }
}
