//! The abstract machine.
//!
//! State is a quintuple: current code pointer, current environment, the
//! argument stack, the global table, and a step counter. Reduction is
//! call-by-need: `Apply` suspends its argument as a thunk, a variable
//! dereference enters the suspended closure with an update pointer below
//! it, and when the closure reaches weak-head-normal form the update
//! pointer overwrites the originating slot so later reads cost one step.
//!
//! Environment frames live in an arena owned by the machine and are
//! addressed by index. A letrec frame's slots hold closures whose
//! environment is that same frame, so the recursive knot is closed by
//! writing the frame's own index; the arena makes those cycles and the
//! update writes unproblematic, and is reclaimed when the machine drops.

use std::{fmt, rc::Rc};

use indexmap::IndexMap;
use smallvec::{SmallVec, smallvec};

use crate::{
    ast::Ast,
    builtins::BuiltinOp,
    kcode::{
        code::KCode,
        compiler::{CompileError, Compiler},
    },
    symbol::Symbol,
    tracer::{MachineTracer, NoopTracer},
    value::Literal,
};

/// The global table: insertion-ordered so compiled code can address slots
/// by index, keyed by symbol for compiler lookup. A slot holds `None`
/// between its declaration (first compile of an assign) and its install
/// (first run of that assign).
pub(crate) type GlobalTable = IndexMap<Symbol, Option<Closure>>;

/// Index of a frame in the machine's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameId(u32);

/// A `(code, env)` pair: a suspended computation, or a finished one when
/// `code` is `Ret` and `env` carries the constant.
#[derive(Debug, Clone)]
pub(crate) struct Closure {
    code: Rc<KCode>,
    env: Env,
}

impl Closure {
    /// Whether entering this closure can do any further work: `Ret` holds
    /// a finished constant and a lambda is already weak-head-normal, so
    /// neither is worth an update pointer.
    fn is_whnf(&self) -> bool {
        matches!(&*self.code, KCode::Ret | KCode::Lambda { .. })
    }
}

/// An environment: a chain of frames (`None` is the empty outermost
/// environment), or the constant environment a finished computation
/// returns in.
#[derive(Debug, Clone, Copy)]
enum Env {
    Chain(Option<FrameId>),
    Const(Literal),
}

#[derive(Debug)]
struct Slot {
    name: Symbol,
    closure: Closure,
}

#[derive(Debug)]
struct Frame {
    slots: SmallVec<[Slot; 2]>,
    link: Option<FrameId>,
}

/// Target of an update pointer: a frame slot in the arena, or a global
/// slot.
#[derive(Debug, Clone, Copy)]
enum SlotRef {
    Frame(FrameId, u16),
    Global(u32),
}

/// One argument-stack entry.
#[derive(Debug)]
enum StackEntry {
    /// A suspended thunk awaiting evaluation.
    Value(Closure),
    /// Overwrite this slot with the weak-head-normal result when it
    /// arrives, memoising the forced value.
    Update(SlotRef),
    /// Conditional continuation: select an arm by the forced condition.
    Branch {
        then: Rc<KCode>,
        els: Rc<KCode>,
        env: Env,
    },
}

/// A runtime failure: a type error surfaced by a strict primitive or the
/// conditional, or a violated machine invariant (these indicate malformed
/// K-code, not a malformed source program).
#[derive(Debug, Clone)]
pub enum MachineError {
    /// A primitive operand with no integer reading.
    OperandType { op: BuiltinOp, found: Literal },
    /// An `if` condition with no integer reading.
    Condition { found: Literal },
    /// A global slot that was declared but whose install never ran.
    GlobalUnset { sym: Symbol },
    /// A symbol with no global slot at all.
    UnknownGlobal { sym: Symbol },
    /// Popped from an empty stack.
    StackUnderflow { step: u64 },
    /// A lambda popped an update pointer: the thunk being updated reduced
    /// to a function, which has no weak-head-normal constant to memoise.
    UpdateAtLambda { step: u64 },
    /// `Ret` reached with no constant in the environment.
    RetWithoutConst { step: u64 },
    /// A stack operand that should have been forced was not.
    Unforced { step: u64 },
    /// A value-cell operation found a pointer or continuation entry.
    PointerOperand { step: u64 },
    /// An unsupported stack-swap depth.
    SwapDepth { n: u8 },
    /// A frame or slot address that does not exist in this environment.
    CorruptEnvironment { step: u64 },
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperandType { op, found } => {
                write!(f, "builtin '{op}' applied to non-integer operand {found}")
            }
            Self::Condition { found } => write!(f, "if condition is not an integer: {found}"),
            Self::GlobalUnset { sym } => {
                write!(f, "global '{sym}' referenced before its value was installed")
            }
            Self::UnknownGlobal { sym } => write!(f, "unknown global '{sym}'"),
            Self::StackUnderflow { step } => write!(f, "step {step}: popped from an empty stack"),
            Self::UpdateAtLambda { step } => {
                write!(f, "step {step}: lambda consumed an in-flight update pointer")
            }
            Self::RetWithoutConst { step } => {
                write!(f, "step {step}: ret reached with no constant in the environment")
            }
            Self::Unforced { step } => {
                write!(f, "step {step}: stack operand is not in weak-head-normal form")
            }
            Self::PointerOperand { step } => {
                write!(f, "step {step}: expected a value cell on the stack")
            }
            Self::SwapDepth { n } => write!(f, "unsupported stack swap depth {n}"),
            Self::CorruptEnvironment { step } => {
                write!(f, "step {step}: environment address does not exist")
            }
        }
    }
}

impl std::error::Error for MachineError {}

/// The K-machine: owns the frame arena and the global table, both of
/// which persist across runs so top-level installs accumulate.
///
/// # Example
/// ```
/// use kestrel::{Machine, parse};
///
/// let mut machine = Machine::new();
/// for form in parse("x = 10; x+x", "example.ks").unwrap() {
///     let code = machine.compile(&form).unwrap();
///     let value = machine.run(code).unwrap();
///     println!("{value}");
/// }
/// ```
#[derive(Debug)]
pub struct Machine {
    frames: Vec<Frame>,
    stack: Vec<StackEntry>,
    globals: GlobalTable,
    /// The shared `Ret` sentinel node.
    ret: Rc<KCode>,
    /// Steps taken by the most recent run.
    steps: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// A fresh machine with empty globals.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            stack: Vec::new(),
            globals: GlobalTable::default(),
            ret: Rc::new(KCode::Ret),
            steps: 0,
        }
    }

    /// Compiles one top-level form against the current globals.
    ///
    /// An `Assign` form extends (or re-uses a slot of) the global table at
    /// compile time; the value is only installed when the compiled code
    /// runs.
    pub fn compile(&mut self, ast: &Ast) -> Result<Rc<KCode>, CompileError> {
        Compiler::new(&mut self.globals).compile_toplevel(ast)
    }

    /// Reduces compiled code to a literal, or performs a global install
    /// (returning `Nil`).
    pub fn run(&mut self, code: Rc<KCode>) -> Result<Literal, MachineError> {
        self.run_traced(code, &mut NoopTracer)
    }

    /// Steps taken by the most recent run.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Forces the global bound to `sym` and returns its literal.
    pub fn force_global(&mut self, sym: Symbol) -> Result<Literal, MachineError> {
        let Some(slot) = self.globals.get_index_of(&sym) else {
            return Err(MachineError::UnknownGlobal { sym });
        };
        let code = Rc::new(KCode::GlobalVar {
            slot: u32::try_from(slot).expect("global table overflow"),
        });
        self.run(code)
    }

    /// Like [`Machine::run`], reporting each step, builtin dispatch, and
    /// the final value to `tracer`.
    pub fn run_traced(&mut self, code: Rc<KCode>, tracer: &mut impl MachineTracer) -> Result<Literal, MachineError> {
        let mut code = code;
        let mut env = Env::Chain(None);
        self.stack.clear();
        self.steps = 0;
        loop {
            self.steps += 1;
            tracer.on_step(self.steps, &code, self.stack.len());
            let next = match &*code {
                KCode::Apply { head, tail } => {
                    self.stack.push(StackEntry::Value(Closure {
                        code: Rc::clone(tail),
                        env,
                    }));
                    Rc::clone(head)
                }
                KCode::LocalVar(addr) => {
                    let (frame, slot) = self.locate(env, addr.frame, addr.slot)?;
                    let closure = self.frames[frame.0 as usize].slots[slot as usize].closure.clone();
                    if !closure.is_whnf() {
                        self.stack.push(StackEntry::Update(SlotRef::Frame(frame, slot)));
                    }
                    env = closure.env;
                    closure.code
                }
                KCode::GlobalVar { slot } => {
                    let (sym, entry) = self
                        .globals
                        .get_index(*slot as usize)
                        .ok_or(MachineError::CorruptEnvironment { step: self.steps })?;
                    let closure = entry.clone().ok_or(MachineError::GlobalUnset { sym: *sym })?;
                    if !closure.is_whnf() {
                        self.stack.push(StackEntry::Update(SlotRef::Global(*slot)));
                    }
                    env = closure.env;
                    closure.code
                }
                KCode::Lambda { arg, body } => {
                    let argument = match self.stack.pop() {
                        Some(StackEntry::Value(closure)) => closure,
                        Some(StackEntry::Update(_) | StackEntry::Branch { .. }) => {
                            return Err(MachineError::UpdateAtLambda { step: self.steps });
                        }
                        None => return Err(MachineError::StackUnderflow { step: self.steps }),
                    };
                    let link = self.chain(env)?;
                    let frame = Frame {
                        slots: smallvec![Slot {
                            name: *arg,
                            closure: argument,
                        }],
                        link,
                    };
                    env = Env::Chain(Some(self.alloc_frame(frame)));
                    Rc::clone(body)
                }
                KCode::Const(value) => {
                    env = Env::Const(*value);
                    Rc::clone(&self.ret)
                }
                KCode::Letrec { bindings, body } => {
                    let link = self.chain(env)?;
                    // The frame refers to itself: its id is known before
                    // the slots are built, which closes the recursive knot.
                    let id = FrameId(u32::try_from(self.frames.len()).expect("frame arena overflow"));
                    let recursive = Env::Chain(Some(id));
                    let slots = bindings
                        .iter()
                        .map(|(name, expr)| Slot {
                            name: *name,
                            closure: Closure {
                                code: Rc::clone(expr),
                                env: recursive,
                            },
                        })
                        .collect();
                    self.frames.push(Frame { slots, link });
                    env = recursive;
                    Rc::clone(body)
                }
                KCode::If { cond, then, els } => {
                    self.stack.push(StackEntry::Branch {
                        then: Rc::clone(then),
                        els: Rc::clone(els),
                        env,
                    });
                    Rc::clone(cond)
                }
                KCode::BuiltinOp(op) => {
                    tracer.on_builtin(*op);
                    let mut args = [Literal::Nil; 2];
                    let arity = op.arity();
                    debug_assert!(arity <= args.len());
                    for index in (0..arity).rev() {
                        args[index] = self.pop_forced()?;
                    }
                    let value = op.apply(&args[..arity])?;
                    env = Env::Const(value);
                    Rc::clone(&self.ret)
                }
                KCode::SwapStack(n) => {
                    if *n != 1 {
                        return Err(MachineError::SwapDepth { n: *n });
                    }
                    let forced = match self.stack.pop() {
                        Some(StackEntry::Value(closure)) => {
                            if !matches!(&*closure.code, KCode::Ret) {
                                return Err(MachineError::Unforced { step: self.steps });
                            }
                            closure
                        }
                        Some(_) => return Err(MachineError::PointerOperand { step: self.steps }),
                        None => return Err(MachineError::StackUnderflow { step: self.steps }),
                    };
                    let operand = match self.stack.pop() {
                        Some(StackEntry::Value(closure)) => closure,
                        Some(_) => return Err(MachineError::PointerOperand { step: self.steps }),
                        None => return Err(MachineError::StackUnderflow { step: self.steps }),
                    };
                    let opcode = self
                        .stack
                        .pop()
                        .ok_or(MachineError::StackUnderflow { step: self.steps })?;
                    // The forced first operand goes back below the opcode
                    // cell; the second operand is reduced next.
                    self.stack.push(StackEntry::Value(forced));
                    self.stack.push(opcode);
                    env = operand.env;
                    operand.code
                }
                KCode::Ret => {
                    let Env::Const(value) = env else {
                        return Err(MachineError::RetWithoutConst { step: self.steps });
                    };
                    match self.stack.pop() {
                        None => {
                            tracer.on_halt(&value);
                            return Ok(value);
                        }
                        Some(StackEntry::Update(target)) => {
                            let whnf = Closure {
                                code: Rc::clone(&self.ret),
                                env: Env::Const(value),
                            };
                            self.write_slot(target, whnf)?;
                            // Code stays `Ret`; the next entry is handled
                            // on the following step.
                            Rc::clone(&self.ret)
                        }
                        Some(StackEntry::Value(closure)) => {
                            self.stack.push(StackEntry::Value(Closure {
                                code: Rc::clone(&self.ret),
                                env: Env::Const(value),
                            }));
                            env = closure.env;
                            closure.code
                        }
                        Some(StackEntry::Branch {
                            then,
                            els,
                            env: branch_env,
                        }) => {
                            let chosen = value.truthy().ok_or(MachineError::Condition { found: value })?;
                            env = branch_env;
                            if chosen { then } else { els }
                        }
                    }
                }
                KCode::Assign { slot, expr } => {
                    let closure = Closure {
                        code: Rc::clone(expr),
                        env,
                    };
                    let entry = self
                        .globals
                        .get_index_mut(*slot as usize)
                        .ok_or(MachineError::CorruptEnvironment { step: self.steps })?
                        .1;
                    *entry = Some(closure);
                    tracer.on_halt(&Literal::Nil);
                    return Ok(Literal::Nil);
                }
            };
            code = next;
        }
    }

    /// Walks `depth` links out from the innermost frame.
    fn locate(&self, env: Env, depth: u16, slot: u16) -> Result<(FrameId, u16), MachineError> {
        let corrupt = MachineError::CorruptEnvironment { step: self.steps };
        let mut link = self.chain(env)?;
        for _ in 0..depth {
            let id = link.ok_or_else(|| corrupt.clone())?;
            link = self.frames[id.0 as usize].link;
        }
        let id = link.ok_or_else(|| corrupt.clone())?;
        if (slot as usize) < self.frames[id.0 as usize].slots.len() {
            Ok((id, slot))
        } else {
            Err(corrupt)
        }
    }

    fn chain(&self, env: Env) -> Result<Option<FrameId>, MachineError> {
        match env {
            Env::Chain(link) => Ok(link),
            Env::Const(_) => Err(MachineError::CorruptEnvironment { step: self.steps }),
        }
    }

    fn alloc_frame(&mut self, frame: Frame) -> FrameId {
        let id = FrameId(u32::try_from(self.frames.len()).expect("frame arena overflow"));
        self.frames.push(frame);
        id
    }

    fn write_slot(&mut self, target: SlotRef, whnf: Closure) -> Result<(), MachineError> {
        match target {
            SlotRef::Frame(frame, slot) => {
                self.frames[frame.0 as usize].slots[slot as usize].closure = whnf;
            }
            SlotRef::Global(slot) => {
                let entry = self
                    .globals
                    .get_index_mut(slot as usize)
                    .ok_or(MachineError::CorruptEnvironment { step: self.steps })?
                    .1;
                *entry = Some(whnf);
            }
        }
        Ok(())
    }

    /// Pops a stack entry that must already be a forced literal.
    fn pop_forced(&mut self) -> Result<Literal, MachineError> {
        match self.stack.pop() {
            Some(StackEntry::Value(closure)) => {
                if let (KCode::Ret, Env::Const(value)) = (&*closure.code, closure.env) {
                    Ok(value)
                } else {
                    Err(MachineError::Unforced { step: self.steps })
                }
            }
            Some(StackEntry::Update(_) | StackEntry::Branch { .. }) => {
                Err(MachineError::PointerOperand { step: self.steps })
            }
            None => Err(MachineError::StackUnderflow { step: self.steps }),
        }
    }
}
