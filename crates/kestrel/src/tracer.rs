//! Machine execution tracing.
//!
//! The original driver logged every machine step; here tracing is a trait
//! so production runs pay nothing for it. The machine carries the tracer
//! as a generic parameter, letting the compiler inline [`NoopTracer`]'s
//! empty hooks to nothing.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`StderrTracer`] | Human-readable step log to stderr |
//! | [`RecordingTracer`] | Step log plus builtin invocation counters |

use ahash::AHashMap;

use crate::{builtins::BuiltinOp, kcode::KCode, value::Literal};

/// Trait for machine execution tracing.
///
/// All methods have default no-op implementations; implementations only
/// override the hooks they care about.
pub trait MachineTracer: std::fmt::Debug {
    /// Called at the start of every machine step, before dispatch.
    ///
    /// This is the hottest hook; implementations should stay lightweight.
    #[inline(always)]
    fn on_step(&mut self, _step: u64, _code: &KCode, _stack_depth: usize) {}

    /// Called when a builtin opcode dispatches, after its operands were
    /// forced.
    #[inline(always)]
    fn on_builtin(&mut self, _op: BuiltinOp) {}

    /// Called when the machine halts with a value.
    #[inline(always)]
    fn on_halt(&mut self, _value: &Literal) {}
}

/// A tracer that does nothing; every hook inlines away.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl MachineTracer for NoopTracer {}

/// Tracer that prints a human-readable step log to stderr.
///
/// Output format:
/// ```text
/// [    1] ((const:10 swap:1) const:11)  stack=1
/// [    2] (const:10 swap:1)  stack=2
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl MachineTracer for StderrTracer {
    fn on_step(&mut self, step: u64, code: &KCode, stack_depth: usize) {
        eprintln!("[{step:>5}] {code}  stack={stack_depth}");
    }

    fn on_halt(&mut self, value: &Literal) {
        eprintln!("  >>> halt {value}");
    }
}

/// Tracer that records the step log and counts builtin invocations.
///
/// The builtin counters are how the test suite proves call-by-need
/// sharing: a thunk referenced many times must dispatch its builtins
/// exactly once.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    steps: Vec<String>,
    builtin_counts: AHashMap<BuiltinOp, usize>,
    halted: Option<Literal>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The compact rendering of each step's code pointer, in order.
    #[must_use]
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// How many times `op` dispatched.
    #[must_use]
    pub fn builtin_count(&self, op: BuiltinOp) -> usize {
        self.builtin_counts.get(&op).copied().unwrap_or(0)
    }

    /// The halt value, if the traced run completed.
    #[must_use]
    pub fn halted(&self) -> Option<Literal> {
        self.halted
    }
}

impl MachineTracer for RecordingTracer {
    fn on_step(&mut self, _step: u64, code: &KCode, _stack_depth: usize) {
        self.steps.push(code.to_string());
    }

    fn on_builtin(&mut self, op: BuiltinOp) {
        *self.builtin_counts.entry(op).or_insert(0) += 1;
    }

    fn on_halt(&mut self, value: &Literal) {
        self.halted = Some(*value);
    }
}
