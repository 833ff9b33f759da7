//! The controller: one end-to-end transformation run.

use crate::bindery::Bindery;
use crate::context::{Context, Focus, MajorFrame};
use crate::error::EngineError;
use crate::executable::Executable;
use crate::mode::Mode;
use crate::params::ParameterSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use weft_model::{Item, QName, Receiver, Sequence, SourceNode};

/// The host-facing error/warning callback contract. The engine reports;
/// the host decides display and exit-code behavior.
pub trait ErrorListener: Send + Sync {
    fn warning(&self, message: &str) {
        log::warn!("{message}");
    }

    /// A recoverable error. Returning `Ok` continues the run; returning the
    /// error (or another) escalates it to fatal.
    fn recoverable(&self, error: &EngineError) -> Result<(), EngineError>;

    /// A fatal error. Called exactly once per run, at the controller
    /// boundary, for the error that aborted the transformation.
    fn fatal(&self, error: &EngineError);
}

/// Warn-and-continue listener; the default.
#[derive(Debug, Default)]
pub struct StandardErrorListener;

impl ErrorListener for StandardErrorListener {
    fn recoverable(&self, error: &EngineError) -> Result<(), EngineError> {
        match error.code() {
            Some(code) => log::warn!("Recoverable error [{code}]: {error}"),
            None => log::warn!("Recoverable error: {error}"),
        }
        Ok(())
    }

    fn fatal(&self, error: &EngineError) {
        match error.code() {
            Some(code) => log::error!("Fatal error [{code}]: {error}"),
            None => log::error!("Fatal error: {error}"),
        }
    }
}

/// Sink for `message` instructions.
pub trait MessageListener: Send + Sync {
    fn message(&self, content: &str, terminate: bool);
}

#[derive(Debug, Default)]
pub struct StandardMessageListener;

impl MessageListener for StandardMessageListener {
    fn message(&self, content: &str, terminate: bool) {
        if terminate {
            log::error!("{content}");
        } else {
            log::info!("{content}");
        }
    }
}

/// Mutable per-run state, collected in one place instead of scattered
/// controller fields.
#[derive(Debug, Default)]
pub struct RunState {
    pub principal_result_uri: Option<String>,
    termination_reported: AtomicBool,
    messages_emitted: AtomicUsize,
}

impl RunState {
    pub fn messages_emitted(&self) -> usize {
        self.messages_emitted.load(Ordering::Relaxed)
    }
}

/// Orchestrates one transformation run: owns the bindery, the listeners,
/// and the run state; establishes the initial context; and is the single
/// boundary every error must reach exactly once.
///
/// A controller borrows its (immutable, shareable) executable; independent
/// controllers over the same executable may run concurrently.
pub struct Controller<'e, N: SourceNode> {
    executable: &'e Executable<N>,
    bindery: Bindery<N>,
    listener: Box<dyn ErrorListener>,
    messages: Box<dyn MessageListener>,
    run: RunState,
    initial_mode: Option<QName>,
    global_context_item: Option<Item<N>>,
}

impl<'e, N: SourceNode> Controller<'e, N> {
    pub fn new(executable: &'e Executable<N>) -> Self {
        Controller {
            executable,
            bindery: Bindery::new(executable.globals().len()),
            listener: Box::new(StandardErrorListener),
            messages: Box::new(StandardMessageListener),
            run: RunState::default(),
            initial_mode: None,
            global_context_item: None,
        }
    }

    pub fn with_error_listener(mut self, listener: Box<dyn ErrorListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_message_listener(mut self, messages: Box<dyn MessageListener>) -> Self {
        self.messages = messages;
        self
    }

    /// Selects the initial mode for [`transform`](Self::transform). A mode
    /// name with no definition in the executable is a static error,
    /// detected here, before any execution.
    pub fn set_initial_mode(&mut self, mode: Option<QName>) -> Result<(), EngineError> {
        if let Some(name) = &mode {
            if self.executable.mode(Some(name)).is_none() {
                return Err(EngineError::UnknownMode(name.to_string()));
            }
        }
        self.initial_mode = mode;
        Ok(())
    }

    pub fn executable(&self) -> &'e Executable<N> {
        self.executable
    }

    pub fn bindery(&self) -> &Bindery<N> {
        &self.bindery
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub(crate) fn global_focus(&self) -> Option<Focus<N>> {
        self.global_context_item.clone().map(Focus::singleton)
    }

    pub(crate) fn recoverable(&self, error: EngineError) -> Result<(), EngineError> {
        self.listener.recoverable(&error)
    }

    pub(crate) fn emit_message(&self, content: &str, terminate: bool) {
        self.run.messages_emitted.fetch_add(1, Ordering::Relaxed);
        self.messages.message(content, terminate);
    }

    /// Transforms a source document: applies templates to its root in the
    /// initial mode.
    pub fn transform(&mut self, root: N, out: &mut dyn Receiver) -> Result<(), EngineError> {
        self.global_context_item = Some(Item::Node(root.clone()));
        let result = self
            .resolve_initial_mode()
            .and_then(|mode| self.run_apply(Sequence::node(root), &mode, out));
        self.finish(result, out)
    }

    /// Applies templates to an arbitrary start sequence in the given mode.
    pub fn apply_templates(
        &mut self,
        sequence: Sequence<N>,
        mode: Option<&QName>,
        out: &mut dyn Receiver,
    ) -> Result<(), EngineError> {
        self.global_context_item = sequence.first().cloned();
        let result = match self.executable.mode(mode) {
            Some(m) => {
                let m = Arc::clone(m);
                self.run_apply(sequence, &m, out)
            }
            None => Err(EngineError::UnknownMode(
                mode.map(|m| m.to_string()).unwrap_or_default(),
            )),
        };
        self.finish(result, out)
    }

    /// Invokes a named template as the entry point. `origin`, when present,
    /// becomes the context item.
    pub fn call_template(
        &mut self,
        name: &QName,
        origin: Option<Item<N>>,
        out: &mut dyn Receiver,
    ) -> Result<(), EngineError> {
        self.global_context_item = origin.clone();
        let result = self.run_named(name, origin, out);
        self.finish(result, out)
    }

    fn resolve_initial_mode(&self) -> Result<Arc<Mode<N>>, EngineError> {
        match self.executable.mode(self.initial_mode.as_ref()) {
            Some(mode) => Ok(Arc::clone(mode)),
            // set_initial_mode validates, so only a mode renamed out from
            // under us could land here.
            None => Err(EngineError::UnknownMode(
                self.initial_mode
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
            )),
        }
    }

    fn run_apply(
        &self,
        sequence: Sequence<N>,
        mode: &Arc<Mode<N>>,
        out: &mut dyn Receiver,
    ) -> Result<(), EngineError> {
        let ctx = Context::new(self, MajorFrame::initial(Some(Arc::clone(mode))), None);
        let tail = Mode::apply_templates(
            mode,
            &ctx,
            &sequence,
            ParameterSet::empty(),
            ParameterSet::empty(),
            out,
        )?;
        if let Some(tc) = tail {
            tc.process(self, out)?;
        }
        Ok(())
    }

    fn run_named(
        &self,
        name: &QName,
        origin: Option<Item<N>>,
        out: &mut dyn Receiver,
    ) -> Result<(), EngineError> {
        let template = self
            .executable
            .named_template(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTemplate(name.to_string()))?;
        let frame = MajorFrame::new(
            template.stack_frame_size(),
            ParameterSet::empty(),
            ParameterSet::empty(),
            None,
            Some(Arc::clone(self.executable.unnamed_mode())),
        );
        let mut ctx = Context::new(self, frame, origin.map(Focus::singleton));
        let tail = template.apply_leaving_tail(&mut ctx, out)?;
        if let Some(tc) = tail {
            tc.process(self, out)?;
        }
        Ok(())
    }

    /// The run boundary: closes the receiver on success, reports the fatal
    /// error (exactly once, including for termination) on failure.
    fn finish(
        &self,
        result: Result<(), EngineError>,
        out: &mut dyn Receiver,
    ) -> Result<(), EngineError> {
        match result {
            Ok(()) => {
                out.close()?;
                Ok(())
            }
            Err(error) => {
                self.report_fatal(&error);
                Err(error)
            }
        }
    }

    fn report_fatal(&self, error: &EngineError) {
        if error.is_terminated() && self.run.termination_reported.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listener.fatal(error);
    }
}
