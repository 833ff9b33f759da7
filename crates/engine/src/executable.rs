//! The compiled stylesheet product: modes, named templates, globals.
//!
//! [`ExecutableBuilder`] is the registration surface a compiler front-end
//! targets. Registration-time checks (duplicate names, streamability) are
//! performed in [`ExecutableBuilder::build`]; once built, an [`Executable`]
//! is immutable and safe to share across concurrent transformation runs.

use crate::builtin::BuiltInRuleSet;
use crate::error::EngineError;
use crate::expr::Expression;
use crate::mode::{Mode, RecoveryPolicy, describe_mode};
use crate::rule::Rule;
use crate::template::Template;
use std::collections::HashMap;
use std::sync::Arc;
use weft_model::{Pattern, QName, SourceNode};

/// A global variable declaration; values live in the per-run
/// [`Bindery`](crate::bindery::Bindery).
#[derive(Debug)]
pub struct GlobalDeclaration<N> {
    pub name: QName,
    pub(crate) init: Arc<dyn Expression<N>>,
}

/// Per-mode build options.
#[derive(Debug, Clone, Default)]
pub struct ModeOptions {
    pub builtin: BuiltInRuleSet,
    pub streamable: bool,
    /// `None` inherits the builder-wide policy.
    pub recovery: Option<RecoveryPolicy>,
}

/// A compiled stylesheet, ready for execution.
#[derive(Debug)]
pub struct Executable<N> {
    unnamed_mode: Arc<Mode<N>>,
    named_modes: HashMap<QName, Arc<Mode<N>>>,
    named_templates: HashMap<QName, Arc<Template<N>>>,
    globals: Vec<GlobalDeclaration<N>>,
}

impl<N: SourceNode> Executable<N> {
    pub fn builder() -> ExecutableBuilder<N> {
        ExecutableBuilder::new()
    }

    pub fn unnamed_mode(&self) -> &Arc<Mode<N>> {
        &self.unnamed_mode
    }

    /// Looks up a mode; `None` as a name means the unnamed mode, which
    /// always exists.
    pub fn mode(&self, name: Option<&QName>) -> Option<&Arc<Mode<N>>> {
        match name {
            None => Some(&self.unnamed_mode),
            Some(n) => self.named_modes.get(n),
        }
    }

    pub fn named_template(&self, name: &QName) -> Option<&Arc<Template<N>>> {
        self.named_templates.get(name)
    }

    pub fn globals(&self) -> &[GlobalDeclaration<N>] {
        &self.globals
    }

    pub fn global_slot(&self, name: &QName) -> Option<usize> {
        self.globals.iter().position(|g| &g.name == name)
    }
}

struct PendingRule<N> {
    pattern: Arc<dyn Pattern<N>>,
    precedence: i32,
    min_import_precedence: i32,
    priority: Option<f64>,
    sequence: u32,
    template: Arc<Template<N>>,
}

/// Collects declarations and assembles an [`Executable`].
pub struct ExecutableBuilder<N> {
    default_recovery: RecoveryPolicy,
    rules: HashMap<Option<QName>, Vec<PendingRule<N>>>,
    mode_options: HashMap<Option<QName>, ModeOptions>,
    named_templates: HashMap<QName, Arc<Template<N>>>,
    globals: Vec<GlobalDeclaration<N>>,
    sequence: u32,
    errors: Vec<EngineError>,
}

impl<N: SourceNode> ExecutableBuilder<N> {
    pub fn new() -> Self {
        ExecutableBuilder {
            default_recovery: RecoveryPolicy::default(),
            rules: HashMap::new(),
            mode_options: HashMap::new(),
            named_templates: HashMap::new(),
            globals: Vec::new(),
            sequence: 0,
            errors: Vec::new(),
        }
    }

    /// The workspace-wide policy for ambiguous rule matches; individual
    /// modes may override it through [`ModeOptions`].
    pub fn recovery_policy(&mut self, policy: RecoveryPolicy) -> &mut Self {
        self.default_recovery = policy;
        self
    }

    pub fn mode_options(&mut self, mode: Option<QName>, options: ModeOptions) -> &mut Self {
        self.mode_options.insert(mode, options);
        self
    }

    /// Registers a template rule. Declaration order is significant: it is
    /// the final tie-break between rules of equal precedence and priority.
    /// A `priority` of `None` takes the pattern's default priority.
    pub fn rule(
        &mut self,
        mode: Option<QName>,
        pattern: Arc<dyn Pattern<N>>,
        precedence: i32,
        priority: Option<f64>,
        template: Arc<Template<N>>,
    ) -> &mut Self {
        self.rule_with_bounds(mode, pattern, precedence, 0, priority, template)
    }

    /// As [`rule`](Self::rule), with an explicit minimum import precedence
    /// bound for apply-imports (normally the lowest precedence of the
    /// modules imported beneath the declaring one).
    pub fn rule_with_bounds(
        &mut self,
        mode: Option<QName>,
        pattern: Arc<dyn Pattern<N>>,
        precedence: i32,
        min_import_precedence: i32,
        priority: Option<f64>,
        template: Arc<Template<N>>,
    ) -> &mut Self {
        let sequence = self.sequence;
        self.sequence += 1;
        self.rules.entry(mode).or_default().push(PendingRule {
            pattern,
            precedence,
            min_import_precedence,
            priority,
            sequence,
            template,
        });
        self
    }

    /// Registers a named template; the template must carry a name.
    pub fn named_template(&mut self, template: Arc<Template<N>>) -> &mut Self {
        match template.name().cloned() {
            Some(name) => {
                if self.named_templates.insert(name.clone(), template).is_some() {
                    self.errors.push(EngineError::static_error(format!(
                        "duplicate named template '{name}'"
                    )));
                }
            }
            None => self.errors.push(EngineError::static_error(
                "named_template requires a template with a name",
            )),
        }
        self
    }

    /// Declares a global variable, returning its slot number.
    pub fn global(&mut self, name: impl Into<QName>, init: Arc<dyn Expression<N>>) -> usize {
        let slot = self.globals.len();
        self.globals.push(GlobalDeclaration {
            name: name.into(),
            init,
        });
        slot
    }

    pub fn build(mut self) -> Result<Executable<N>, EngineError> {
        if let Some(err) = self.errors.drain(..).next() {
            return Err(err);
        }

        // The unnamed mode always exists, even when it has no rules.
        self.rules.entry(None).or_default();

        let mut unnamed_mode = None;
        let mut named_modes = HashMap::new();
        for (name, pending) in self.rules {
            let options = self.mode_options.get(&name).cloned().unwrap_or_default();
            let recovery = options.recovery.unwrap_or(self.default_recovery);
            let rules: Vec<Rule<N>> = pending
                .into_iter()
                .map(|p| {
                    let priority = p
                        .priority
                        .unwrap_or_else(|| p.pattern.default_priority());
                    Rule {
                        pattern: p.pattern,
                        action: p.template,
                        precedence: p.precedence,
                        min_import_precedence: p.min_import_precedence,
                        priority,
                        sequence: p.sequence,
                        rank: 0,
                    }
                })
                .collect();
            log::debug!(
                "building {} with {} rules",
                describe_mode(&name),
                rules.len()
            );
            let mode = Arc::new(Mode::build(
                name.clone(),
                options.builtin,
                options.streamable,
                recovery,
                rules,
            )?);
            match name {
                None => unnamed_mode = Some(mode),
                Some(n) => {
                    named_modes.insert(n, mode);
                }
            }
        }

        Ok(Executable {
            unnamed_mode: unnamed_mode.expect("unnamed mode is always present"),
            named_modes,
            named_templates: self.named_templates,
            globals: self.globals,
        })
    }
}

impl<N: SourceNode> Default for ExecutableBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}
