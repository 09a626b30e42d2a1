//! Stack-based virtual machine for Sigil bytecode.
//!
//! A frame's local variables live at the bottom of its stack window:
//! slot `n` of the running frame is `stack[base + n]`, and operands are
//! pushed above them. Calls move the arguments into the callee's first
//! slots; returns truncate the window and push the result for the caller.
//!
//! Variables are bound by reference through [`Reference`] cells. A slot
//! or array element holding a cell writes through it; loads copy the
//! value out so arrays keep value semantics.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]

mod cancel;
mod output;
#[cfg(test)]
mod tests;

pub use cancel::CancelToken;
pub use output::Output;

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

use sigil_foundation::{
    Array, ArrayIterator, Diagnostics, Error, ErrorKind, ErrorLevel, Key, Object, ObjectKind,
    Reference, Result, Type, Value, WeakReference, ops,
};
use tracing::{trace, warn};

use crate::compiler::{CompiledFunction, compile};
use crate::extension::{Args, Host, State};
use crate::module::{Function, Module, NULL_INDEX};
use crate::opcode::Opcode;

/// Instructions dispatched between cancellation checks.
const CANCEL_INTERVAL: u32 = 1024;

/// VM limits and switches.
#[derive(Clone, Debug)]
pub struct VmOptions {
    /// Maximum operand-stack depth.
    pub stack_capacity: usize,
    /// Maximum call depth.
    pub frame_capacity: usize,
    /// Render diagnostics into the output.
    pub display_errors: bool,
    /// Log every dispatched instruction at `trace`.
    pub trace: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            stack_capacity: 4096,
            frame_capacity: 128,
            display_errors: true,
            trace: false,
        }
    }
}

/// An active call.
struct Frame {
    function: Rc<CompiledFunction>,
    ip: usize,
    /// Stack index of local slot 0.
    base: usize,
}

/// Stack-based virtual machine.
pub struct Vm {
    /// Constant pool and function table.
    module: Module,
    /// Operand stack, holding every frame's locals.
    stack: Vec<Value>,
    frames: Vec<Frame>,
    diagnostics: Diagnostics,
    output: Output,
    /// Extension state.
    state: State,
    cancel: CancelToken,
    options: VmOptions,
    /// Top-level variables kept between runs.
    globals: HashMap<String, Value>,
    /// Elements created by write fetches that have not been assigned yet.
    created: Vec<WeakReference>,
}

impl Vm {
    /// Creates a VM over `module` with default options and a buffered output.
    #[must_use]
    pub fn new(module: Module) -> Self {
        Self::with_options(module, VmOptions::default())
    }

    /// Creates a VM with explicit options.
    #[must_use]
    pub fn with_options(module: Module, options: VmOptions) -> Self {
        Self {
            module,
            stack: Vec::with_capacity(options.stack_capacity.min(1024)),
            frames: Vec::new(),
            diagnostics: Diagnostics::new(),
            output: Output::buffer(),
            state: State::new(),
            cancel: CancelToken::new(),
            options,
            globals: HashMap::new(),
            created: Vec::new(),
        }
    }

    /// Returns the module.
    #[must_use]
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Returns the module for compiling further units.
    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Returns the diagnostics sink.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Returns the diagnostics sink for configuration.
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Replaces the output sink, returning the old one.
    pub fn set_output(&mut self, output: Output) -> Output {
        std::mem::replace(&mut self.output, output)
    }

    /// Returns the output sink.
    #[must_use]
    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Takes buffered output as text.
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&self.output.take()).into_owned()
    }

    /// Returns the extension state.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    /// Returns a handle that cancels running code.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Installs a cancellation token.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    /// Returns the top-level variables left by earlier runs.
    #[must_use]
    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.globals
    }

    /// Forgets the top-level variables.
    pub fn clear_globals(&mut self) {
        self.globals.clear();
    }

    /// Returns the current operand-stack depth.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Runs a top-level unit and returns its return value.
    ///
    /// Top-level variables are seeded from and saved back to
    /// [`Self::globals`], so consecutive runs share them.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped execution, with the call
    /// stack at the failure point in its context.
    pub fn run(&mut self, unit: &CompiledFunction) -> Result<Value> {
        self.stack.clear();
        self.frames.clear();
        self.created.clear();
        let unit = Rc::new(unit.clone());
        let result = self.enter_main(&unit).and_then(|()| self.execute());
        let flushed = self.flush_diagnostics();
        match result.and_then(|v| flushed.map(|()| v)) {
            Ok(value) => Ok(value.separate()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn enter_main(&mut self, unit: &Rc<CompiledFunction>) -> Result<()> {
        for i in 0..unit.locals as usize {
            let value = unit
                .variables
                .get(i)
                .and_then(|name| self.globals.remove(name))
                .unwrap_or_default();
            self.push(value)?;
        }
        self.frames.push(Frame {
            function: Rc::clone(unit),
            ip: 0,
            base: 0,
        });
        trace!(name = %unit.name, "enter");
        Ok(())
    }

    /// Saves the top-level slots, records the call stack and resets.
    fn fail(&mut self, err: Error) -> Error {
        if let Some(main) = self.frames.first().map(|f| Rc::clone(&f.function)) {
            self.save_globals(&main, 0);
        }
        let Error { kind, context } = err;
        let mut context = context.unwrap_or_default();
        if context.stack.is_empty() {
            for frame in self.frames.iter().rev() {
                context = context.with_frame(frame.function.name.clone());
            }
        }
        warn!(error = %kind, depth = self.frames.len(), "execution failed");
        self.stack.clear();
        self.frames.clear();
        Error::new(kind).with_context(context)
    }

    fn save_globals(&mut self, main: &CompiledFunction, base: usize) {
        let end = (base + main.variables.len()).min(self.stack.len());
        if end <= base {
            return;
        }
        self.stack.truncate(end);
        let slots = self.stack.split_off(base);
        for (name, value) in main.variables.iter().zip(slots) {
            self.globals.insert(name.clone(), value);
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn execute(&mut self) -> Result<Value> {
        let mut ticks: u32 = 0;
        loop {
            ticks = ticks.wrapping_add(1);
            if ticks % CANCEL_INTERVAL == 0 && self.cancel.is_cancelled() {
                return Err(Error::new(ErrorKind::Cancelled));
            }

            let frame = self
                .frames
                .last_mut()
                .ok_or_else(|| Error::internal("no active frame"))?;
            let Some(instruction) = frame.function.code.get(frame.ip) else {
                // Running off the end returns null.
                if let Some(value) = self.ret(Value::Null)? {
                    return Ok(value);
                }
                continue;
            };
            frame.ip += 1;
            let base = frame.base;
            let op = instruction.opcode();
            let operand = instruction.operand();
            if self.options.trace {
                trace!(ip = frame.ip - 1, %op, operand, depth = self.stack.len(), "dispatch");
            }

            match op {
                Opcode::Noop => {}
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Pop2 => {
                    self.pop()?;
                    self.pop()?;
                }
                Opcode::Dup => {
                    let top = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or_else(|| Error::internal("stack underflow"))?;
                    self.push(top)?;
                }
                Opcode::Return => {
                    if let Some(value) = self.ret(Value::Null)? {
                        return Ok(value);
                    }
                }
                Opcode::ReturnValue => {
                    let value = self.pop()?.into_deref().separate();
                    if let Some(value) = self.ret(value)? {
                        return Ok(value);
                    }
                }

                // Arithmetic
                Opcode::Add => self.binary_op(ops::add)?,
                Opcode::Sub => self.binary_op(ops::sub)?,
                Opcode::Mul => self.binary_op(ops::mul)?,
                Opcode::Div => self.binary_op(ops::div)?,
                Opcode::Mod => self.binary_op(ops::modulo)?,
                Opcode::Pow => self.binary_op(ops::pow)?,
                Opcode::BwAnd => self.binary_op(ops::bit_and)?,
                Opcode::BwOr => self.binary_op(ops::bit_or)?,
                Opcode::BwXor => self.binary_op(ops::bit_xor)?,
                Opcode::ShiftLeft => self.binary_op(ops::shift_left)?,
                Opcode::ShiftRight => self.binary_op(ops::shift_right)?,
                Opcode::Concat => self.binary_op(ops::concat)?,
                Opcode::BwNot => {
                    let a = self.pop()?;
                    let result = ops::bit_not(&a, &mut self.diagnostics)?;
                    self.push(result)?;
                }

                // Comparison
                Opcode::Equal => {
                    self.binary_op(|a, b, d| ops::loose_equal(a, b, d).map(Value::Bool))?;
                }
                Opcode::NotEqual => {
                    self.binary_op(|a, b, d| ops::loose_equal(a, b, d).map(|eq| Value::Bool(!eq)))?;
                }
                Opcode::Identical => self.binary_op(|a, b, _| Ok(Value::Bool(ops::identical(a, b))))?,
                Opcode::NotIdentical => {
                    self.binary_op(|a, b, _| Ok(Value::Bool(!ops::identical(a, b))))?;
                }
                Opcode::Greater => {
                    self.binary_op(|a, b, d| ops::compare(a, b, d).map(|c| Value::Bool(c > 0)))?;
                }
                Opcode::Less => {
                    self.binary_op(|a, b, d| ops::compare(a, b, d).map(|c| Value::Bool(c < 0)))?;
                }
                Opcode::GreaterOrEqual => {
                    self.binary_op(|a, b, d| ops::compare(a, b, d).map(|c| Value::Bool(c >= 0)))?;
                }
                Opcode::LessOrEqual => {
                    self.binary_op(|a, b, d| ops::compare(a, b, d).map(|c| Value::Bool(c <= 0)))?;
                }
                Opcode::Compare => self.binary_op(|a, b, d| ops::compare(a, b, d).map(Value::Int))?,
                Opcode::Not => {
                    let a = self.pop()?;
                    self.push(Value::Bool(!ops::to_bool(&a)))?;
                }

                // Arrays
                Opcode::ArrayNew => self.push(Value::Array(Array::new()))?,
                Opcode::ArrayAccessRead | Opcode::ArrayAccessQuiet => {
                    let key = self.pop()?.into_deref();
                    let container = self.pop()?.into_deref();
                    let quiet = op == Opcode::ArrayAccessQuiet;
                    let value = read_dim(&container, &key, quiet, &mut self.diagnostics)?;
                    self.push(value)?;
                }
                Opcode::ArrayAccessPeek => {
                    let len = self.stack.len();
                    let [container, key] = self
                        .stack
                        .get(len.saturating_sub(2)..)
                        .and_then(|top| <&[Value; 2]>::try_from(top).ok())
                        .ok_or_else(|| Error::internal("stack underflow"))?;
                    let key = key.deref_value();
                    let value = match container {
                        Value::Reference(cell) => {
                            read_dim(&cell.borrow(), &key, true, &mut self.diagnostics)?
                        }
                        other => read_dim(other, &key, true, &mut self.diagnostics)?,
                    };
                    self.push(value)?;
                }
                Opcode::ArrayAccessWrite => {
                    let key = self.pop()?.into_deref();
                    self.write_dim(Some(key))?;
                }
                Opcode::ArrayAccessPush => self.write_dim(None)?,
                Opcode::ArrayUnset => {
                    let key = self.pop()?.into_deref();
                    let target = self.pop()?;
                    match target {
                        Value::Reference(r) => unset_dim(&mut r.borrow_mut(), &key, &mut self.diagnostics)?,
                        mut other => unset_dim(&mut other, &key, &mut self.diagnostics)?,
                    }
                    self.push(Value::Null)?;
                }
                Opcode::AssignRef => {
                    let value = self.pop()?;
                    let Value::Reference(target) = self.pop()? else {
                        return Err(Error::internal("assignment target is not a reference"));
                    };
                    let created = self.take_created(&target);
                    let value = value.into_deref().separate_from(&target, created);
                    target.set(value.clone());
                    self.push(value)?;
                }

                // Iteration
                Opcode::ForEachInit => {
                    let subject = self.pop()?;
                    let iterator = self.iterate(subject)?;
                    self.push(iterator)?;
                }
                Opcode::ForEachValid => {
                    let valid = self.with_iterator(ArrayIterator::valid)?;
                    self.push(Value::Bool(valid))?;
                }
                Opcode::ForEachNext => self.with_iterator(ArrayIterator::next)?,
                Opcode::ForEachValue => {
                    let value = self
                        .with_iterator(|it| it.current())?
                        .unwrap_or_default()
                        .into_deref()
                        .separate();
                    self.assign_slot(base, operand, value)?;
                }
                Opcode::ForEachValueRef => {
                    let cell = self
                        .with_iterator(ArrayIterator::current_ref)?
                        .unwrap_or_else(|| Reference::new(Value::Null));
                    *self.slot_mut(base, operand)? = Value::Reference(cell);
                }
                Opcode::ForEachKey => {
                    let key = self.with_iterator(|it| it.key())?.unwrap_or_default();
                    self.assign_slot(base, operand, key)?;
                }
                Opcode::Throw => {
                    self.pop()?;
                }

                // Variables
                Opcode::Assign => {
                    let value = self.pop()?;
                    let slot = self.slot_mut(base, operand)?;
                    let value = if let Value::Reference(cell) = value {
                        let current = cell.get();
                        *slot = Value::Reference(cell);
                        current
                    } else {
                        let value = value.separate();
                        match slot {
                            Value::Reference(cell) => cell.set(value.clone()),
                            other => *other = value.clone(),
                        }
                        value
                    };
                    self.push(value)?;
                }
                Opcode::AssignAdd
                | Opcode::AssignSub
                | Opcode::AssignMul
                | Opcode::AssignDiv
                | Opcode::AssignMod
                | Opcode::AssignPow
                | Opcode::AssignBwAnd
                | Opcode::AssignBwOr
                | Opcode::AssignBwXor
                | Opcode::AssignConcat
                | Opcode::AssignShiftLeft
                | Opcode::AssignShiftRight => {
                    let binary = op
                        .binary()
                        .ok_or_else(|| Error::internal(format!("{op} has no operator")))?;
                    let rhs = self.pop()?.into_deref();
                    let current = self.slot_mut(base, operand)?.deref_value();
                    let result = apply_binary(binary, &current, &rhs, &mut self.diagnostics)?;
                    self.assign_slot(base, operand, result.clone())?;
                    self.push(result)?;
                }
                Opcode::AssignCoalesce => {
                    let value = self.pop()?.into_deref().separate();
                    let current = self.slot_mut(base, operand)?.deref_value();
                    if current.is_null() {
                        self.assign_slot(base, operand, value.clone())?;
                        self.push(value)?;
                    } else {
                        self.push(current)?;
                    }
                }
                Opcode::AssignOpRef => {
                    let binary = Opcode::from_u32(operand)
                        .ok_or_else(|| Error::internal(format!("bad operator {operand}")))?;
                    let rhs = self.pop()?.into_deref();
                    let target = self.pop_reference()?;
                    let current = target.get();
                    let result = apply_binary(binary, &current, &rhs, &mut self.diagnostics)?;
                    target.set(result.clone());
                    self.push(result)?;
                }
                Opcode::IncDecRef => {
                    let target = self.pop_reference()?;
                    let current = target.get();
                    let updated = if operand % 2 == 0 {
                        ops::increment(&current, &mut self.diagnostics)
                    } else {
                        ops::decrement(&current, &mut self.diagnostics)
                    };
                    target.set(updated.clone());
                    self.push(if operand < 2 { updated } else { current })?;
                }
                Opcode::Cast => {
                    let ty = Type::from_code(operand)
                        .ok_or_else(|| Error::internal(format!("bad type code {operand}")))?;
                    let value = self.pop()?.into_deref();
                    let result = ops::cast(&value, ty, &mut self.diagnostics)?;
                    self.push(result)?;
                }
                Opcode::PreIncrement
                | Opcode::PostIncrement
                | Opcode::PreDecrement
                | Opcode::PostDecrement => {
                    let current = self.slot_mut(base, operand)?.deref_value();
                    let updated = if matches!(op, Opcode::PreIncrement | Opcode::PostIncrement) {
                        ops::increment(&current, &mut self.diagnostics)
                    } else {
                        ops::decrement(&current, &mut self.diagnostics)
                    };
                    self.assign_slot(base, operand, updated.clone())?;
                    let pre = matches!(op, Opcode::PreIncrement | Opcode::PreDecrement);
                    self.push(if pre { updated } else { current })?;
                }
                Opcode::Load => {
                    let slot = self.slot_mut(base, operand)?;
                    let value = match slot {
                        Value::Reference(cell) if cell.alias_count() > 1 => cell.get().separate(),
                        other if other.may_alias() => {
                            // Drop element bindings no one else holds.
                            let value = other.separate();
                            *other = value.clone();
                            value
                        }
                        other => other.clone(),
                    };
                    self.push(value)?;
                }
                Opcode::LoadRef => {
                    let slot = self.slot_mut(base, operand)?;
                    let cell = match slot {
                        Value::Reference(cell) => cell.clone(),
                        other => {
                            let cell = Reference::new(std::mem::take(other));
                            *other = Value::Reference(cell.clone());
                            cell
                        }
                    };
                    self.push(Value::Reference(cell))?;
                }
                Opcode::Unset => {
                    *self.slot_mut(base, operand)? = Value::Null;
                }
                Opcode::Const => {
                    let value = self
                        .module
                        .constant(operand)
                        .cloned()
                        .ok_or_else(|| Error::internal(format!("constant {operand} out of bounds")))?;
                    self.push(value)?;
                }

                // Control flow
                Opcode::Jump => self.jump(operand)?,
                Opcode::JumpTrue | Opcode::JumpFalse => {
                    let cond = ops::to_bool(&self.pop()?);
                    if cond == (op == Opcode::JumpTrue) {
                        self.jump(operand)?;
                    }
                }
                Opcode::InitCall => {
                    let name = self
                        .module
                        .function(operand)
                        .map(Function::name)
                        .ok_or_else(|| Error::internal(format!("function {operand} out of bounds")))?;
                    let callee = Object::closure(operand, name);
                    self.push(Value::Object(callee))?;
                }
                Opcode::Call => self.call(operand as usize)?,

                // Output
                Opcode::Echo => {
                    let n = operand as usize;
                    let start = self
                        .stack
                        .len()
                        .checked_sub(n)
                        .ok_or_else(|| Error::internal("stack underflow"))?;
                    let values = self.stack.split_off(start);
                    for value in &values {
                        let text = ops::to_string(value, &mut self.diagnostics)?;
                        self.flush_diagnostics()?;
                        self.output.write_all(text.as_bytes())?;
                    }
                }
                Opcode::IsSet => {
                    let n = operand as usize;
                    let start = self
                        .stack
                        .len()
                        .checked_sub(n)
                        .ok_or_else(|| Error::internal("stack underflow"))?;
                    let values = self.stack.split_off(start);
                    let set = values.iter().all(|v| !v.deref_value().is_null());
                    self.push(Value::Bool(set))?;
                }
                Opcode::PopBelow => {
                    let top = self.pop()?;
                    let keep = self
                        .stack
                        .len()
                        .checked_sub(operand as usize)
                        .ok_or_else(|| Error::internal("stack underflow"))?;
                    self.stack.truncate(keep);
                    self.push(top)?;
                }
            }

            if self.diagnostics.has_new() {
                self.flush_diagnostics()?;
            }
        }
    }

    /// Renders pending diagnostics and escalates error-level ones.
    fn flush_diagnostics(&mut self) -> Result<()> {
        let mut fatal = None;
        for diagnostic in self.diagnostics.drain_new() {
            if diagnostic.level.is_error() {
                fatal.get_or_insert_with(|| diagnostic.message.clone());
            } else if self.options.display_errors {
                write!(
                    self.output,
                    "\n{}: {}\n",
                    diagnostic.level.label(),
                    diagnostic.message
                )?;
            }
        }
        match fatal {
            Some(message) => Err(Error::fatal(message)),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Stack operations
    // =========================================================================

    fn push(&mut self, value: Value) -> Result<()> {
        if self.stack.len() >= self.options.stack_capacity {
            return Err(Error::new(ErrorKind::StackOverflow {
                capacity: self.options.stack_capacity,
            }));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::Internal("stack underflow".to_string())))
    }

    fn pop_reference(&mut self) -> Result<Reference> {
        match self.pop()? {
            Value::Reference(cell) => Ok(cell),
            other => Err(Error::internal(format!(
                "expected a reference, found {}",
                other.value_type()
            ))),
        }
    }

    fn slot_mut(&mut self, base: usize, slot: u32) -> Result<&mut Value> {
        self.stack
            .get_mut(base + slot as usize)
            .ok_or_else(|| Error::internal(format!("slot {slot} out of bounds")))
    }

    /// Stores into a slot, writing through a bound reference.
    fn assign_slot(&mut self, base: usize, slot: u32, value: Value) -> Result<()> {
        match self.slot_mut(base, slot)? {
            Value::Reference(cell) => cell.set(value),
            other => *other = value,
        }
        Ok(())
    }

    fn binary_op<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(&Value, &Value, &mut Diagnostics) -> Result<Value>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = op(&a, &b, &mut self.diagnostics)?;
        self.push(result)
    }

    fn jump(&mut self, target: u32) -> Result<()> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| Error::internal("no active frame"))?;
        frame.ip = target as usize;
        Ok(())
    }

    // =========================================================================
    // Arrays and iteration
    // =========================================================================

    /// Resolves one level of a write chain: takes the container from the
    /// reference on top of the stack (or the array literal being built),
    /// and pushes a reference to the element at `key`.
    fn write_dim(&mut self, key: Option<Value>) -> Result<()> {
        let cell = if matches!(self.stack.last(), Some(Value::Reference(_))) {
            Some(self.pop_reference()?)
        } else {
            None
        };
        let (element, created) = match &cell {
            Some(cell) => element_ref(&mut cell.borrow_mut(), key, &mut self.diagnostics)?,
            None => {
                let container = self
                    .stack
                    .last_mut()
                    .ok_or_else(|| Error::internal("stack underflow"))?;
                element_ref(container, key, &mut self.diagnostics)?
            }
        };
        self.created.retain(|weak| weak.is_live() && !weak.is(&element));
        if created {
            self.created.push(element.downgrade());
        }
        self.push(Value::Reference(element))
    }

    /// Returns true if `target` was created by a write fetch still waiting
    /// for its value, and forgets it.
    fn take_created(&mut self, target: &Reference) -> bool {
        match self.created.iter().rposition(|weak| weak.is(target)) {
            Some(at) => {
                self.created.swap_remove(at);
                true
            }
            None => false,
        }
    }

    /// Wraps a foreach subject in an iterator object.
    fn iterate(&mut self, subject: Value) -> Result<Value> {
        let iterator = match subject {
            Value::Reference(cell) => {
                let target = cell.get();
                match target {
                    Value::Array(_) => ArrayIterator::by_reference(cell),
                    other => return self.iterate(other),
                }
            }
            Value::Array(array) => ArrayIterator::new(array),
            Value::Object(object) => {
                if matches!(object.kind(), ObjectKind::Iterator(_)) {
                    return Ok(Value::Object(object));
                }
                if matches!(object.kind(), ObjectKind::Closure { .. }) {
                    return Err(Error::new(ErrorKind::NotIterable(Type::Object)));
                }
                ArrayIterator::new(object.properties().unwrap_or_default())
            }
            other => {
                self.diagnostics.warning(format!(
                    "foreach() argument must be of type array|object, {} given",
                    other.value_type().name()
                ));
                ArrayIterator::new(Array::new())
            }
        };
        Ok(Value::Object(Object::iterator(iterator)))
    }

    /// Runs `f` on the iterator on top of the stack.
    fn with_iterator<T>(&mut self, f: impl FnOnce(&mut ArrayIterator) -> T) -> Result<T> {
        let iterator = match self.stack.last() {
            Some(Value::Object(object)) => object.iterator_mut(),
            _ => None,
        };
        let mut iterator = iterator.ok_or_else(|| Error::internal("no iterator on the stack"))?;
        Ok(f(&mut *iterator))
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn call(&mut self, argc: usize) -> Result<()> {
        let callee_at = self
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or_else(|| Error::internal("stack underflow"))?;
        let idx = match self.stack[callee_at].deref_value() {
            Value::Object(object) => object
                .callee()
                .ok_or_else(|| Error::new(ErrorKind::NotCallable(Type::Object)))?,
            Value::String(name) => self.module.function_index(&name).ok_or_else(|| {
                Error::undefined_symbol(format!("Call to undefined function {name}()"))
            })?,
            other => return Err(Error::new(ErrorKind::NotCallable(other.value_type()))),
        };
        let function = self
            .module
            .function(idx)
            .cloned()
            .ok_or_else(|| Error::internal(format!("function {idx} out of bounds")))?;

        let mut args = self.stack.split_off(callee_at + 1);
        self.stack.pop();

        match function {
            Function::Builtin(builtin) => {
                if !builtin.arity.accepts(argc) {
                    return Err(Error::arity_mismatch(
                        format!("{}() expects {} arguments", builtin.name, builtin.arity),
                        argc,
                    ));
                }
                for (i, arg) in args.iter_mut().enumerate() {
                    if !builtin.takes_reference(i) {
                        let value = std::mem::take(arg).into_deref();
                        *arg = value.separate();
                    }
                }
                let host = Host {
                    output: &mut self.output,
                    diagnostics: &mut self.diagnostics,
                    module: &self.module,
                    state: &mut self.state,
                };
                let mut call = Args::new(Arc::clone(&builtin.name), args, host);
                let result = (builtin.handler)(&mut call)?;
                self.push(result.into_deref())
            }
            Function::Compiled(function) => {
                if self.frames.len() >= self.options.frame_capacity {
                    return Err(Error::new(ErrorKind::FrameOverflow {
                        depth: self.frames.len(),
                    }));
                }
                let base = self.stack.len();
                self.bind_args(&function, args)?;
                trace!(name = %function.name, depth = self.frames.len(), "enter");
                self.frames.push(Frame {
                    function,
                    ip: 0,
                    base,
                });
                Ok(())
            }
        }
    }

    /// Pushes the callee's locals: bound arguments, then nulls.
    fn bind_args(&mut self, function: &CompiledFunction, args: Vec<Value>) -> Result<()> {
        let passed = args.len();
        let mut args = args.into_iter();
        for param in &function.args {
            if param.variadic {
                let rest: Array = args
                    .by_ref()
                    .map(|v| if param.by_ref { v } else { v.into_deref().separate() })
                    .collect();
                self.push(Value::Array(rest))?;
                continue;
            }
            let value = match args.next() {
                Some(value) if param.by_ref => Value::Reference(Reference::new(value)),
                Some(value) => {
                    let value = value.into_deref().separate();
                    let null_allowed = param.nullable || param.default == Some(NULL_INDEX);
                    match param.ty {
                        Some(ty) if !(value.is_null() && null_allowed) => {
                            ops::cast(&value, ty, &mut self.diagnostics)?
                        }
                        _ => value,
                    }
                }
                None => match param.default {
                    Some(idx) => self.module.constant(idx).cloned().unwrap_or_default(),
                    None => {
                        let required = function.required_args();
                        let qualifier = if required < function.args.len() {
                            "at least"
                        } else {
                            "exactly"
                        };
                        return Err(Error::arity_mismatch(
                            format!("{}() expects {qualifier} {required} arguments", function.name),
                            passed,
                        ));
                    }
                },
            };
            let value = if param.by_ref {
                value
            } else {
                value.separate()
            };
            self.push(value)?;
        }
        for _ in function.args.len()..function.locals as usize {
            self.push(Value::Null)?;
        }
        Ok(())
    }

    /// Pops the running frame. Returns the final value when the top-level
    /// unit returns.
    fn ret(&mut self, value: Value) -> Result<Option<Value>> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::internal("return without a frame"))?;
        let value = match frame.function.return_type {
            Some(ty) if !value.is_null() => ops::cast(&value, ty, &mut self.diagnostics)?,
            _ => value,
        };
        trace!(name = %frame.function.name, depth = self.frames.len(), "leave");
        if self.frames.is_empty() {
            self.save_globals(&frame.function, frame.base);
            self.stack.truncate(frame.base);
            return Ok(Some(value));
        }
        self.stack.truncate(frame.base);
        self.push(value)?;
        Ok(None)
    }
}

// =============================================================================
// Element access
// =============================================================================

/// Reads `container[key]`. Quiet reads (isset, `??`) never warn.
fn read_dim(container: &Value, key: &Value, quiet: bool, diag: &mut Diagnostics) -> Result<Value> {
    let mut scratch = Diagnostics::new();
    let diag = if quiet { &mut scratch } else { diag };
    match container {
        Value::Array(array) => {
            let Some(key) = ops::to_key(key, diag) else {
                return if quiet {
                    Ok(Value::Null)
                } else {
                    Err(Error::fatal("Illegal offset type"))
                };
            };
            match array.get(&key) {
                Some(value) => Ok(value.deref_value()),
                None => {
                    diag.warning(format!("Undefined array key {}", render_key(&key)));
                    Ok(Value::Null)
                }
            }
        }
        Value::String(s) => {
            let offset = ops::to_int(key, diag);
            let len = s.len() as i64;
            let pos = if offset < 0 { len + offset } else { offset };
            if (0..len).contains(&pos) {
                let pos = pos as usize;
                let byte = String::from_utf8_lossy(&s.as_bytes()[pos..=pos]).into_owned();
                Ok(Value::from(byte))
            } else if quiet {
                Ok(Value::Null)
            } else {
                diag.warning(format!("Uninitialized string offset {offset}"));
                Ok(Value::from(""))
            }
        }
        Value::Object(object) if !quiet => Err(Error::fatal(format!(
            "Cannot use object of type {} as array",
            object.class_name()
        ))),
        Value::Object(_) => Ok(Value::Null),
        other => {
            diag.warning(format!(
                "Trying to access array offset on value of type {}",
                other.value_type().name()
            ));
            Ok(Value::Null)
        }
    }
}

/// Returns the cell for `container[key]` (or a new element when `key` is
/// `None`), creating the array and the element as needed. The flag is
/// true when the element did not exist.
fn element_ref(
    container: &mut Value,
    key: Option<Value>,
    diag: &mut Diagnostics,
) -> Result<(Reference, bool)> {
    match container {
        Value::Null => *container = Value::Array(Array::new()),
        Value::Bool(false) => {
            diag.throw(
                ErrorLevel::DEPRECATED,
                "Automatic conversion of false to array is deprecated",
            );
            *container = Value::Array(Array::new());
        }
        _ => {}
    }
    match container {
        Value::Array(array) => {
            let key = match key {
                Some(key) => {
                    ops::to_key(&key, diag).ok_or_else(|| Error::fatal("Illegal offset type"))?
                }
                None => Key::Int(array.next_key()),
            };
            let created = !array.contains_key(&key);
            let element = array.entry(key);
            if let Value::Reference(cell) = element {
                return Ok((cell.clone(), created));
            }
            let cell = Reference::new(std::mem::take(element));
            *element = Value::Reference(cell.clone());
            Ok((cell, created))
        }
        Value::String(_) => Err(Error::new(ErrorKind::Unsupported(
            "writing to a string offset".to_string(),
        ))),
        Value::Object(object) => Err(Error::fatal(format!(
            "Cannot use object of type {} as array",
            object.class_name()
        ))),
        _ => Err(Error::fatal("Cannot use a scalar value as an array")),
    }
}

fn unset_dim(container: &mut Value, key: &Value, diag: &mut Diagnostics) -> Result<()> {
    match container {
        Value::Array(array) => {
            if let Some(key) = ops::to_key(key, diag) {
                array.remove(&key);
            }
            Ok(())
        }
        Value::String(_) => Err(Error::fatal("Cannot unset string offsets")),
        Value::Object(object) => Err(Error::fatal(format!(
            "Cannot use object of type {} as array",
            object.class_name()
        ))),
        _ => Ok(()),
    }
}

fn render_key(key: &Key) -> String {
    match key {
        Key::Int(n) => n.to_string(),
        Key::Str(s) => format!("\"{s}\""),
    }
}

fn apply_binary(op: Opcode, a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    match op {
        Opcode::Add => ops::add(a, b, diag),
        Opcode::Sub => ops::sub(a, b, diag),
        Opcode::Mul => ops::mul(a, b, diag),
        Opcode::Div => ops::div(a, b, diag),
        Opcode::Mod => ops::modulo(a, b, diag),
        Opcode::Pow => ops::pow(a, b, diag),
        Opcode::BwAnd => ops::bit_and(a, b, diag),
        Opcode::BwOr => ops::bit_or(a, b, diag),
        Opcode::BwXor => ops::bit_xor(a, b, diag),
        Opcode::ShiftLeft => ops::shift_left(a, b, diag),
        Opcode::ShiftRight => ops::shift_right(a, b, diag),
        Opcode::Concat => ops::concat(a, b, diag),
        other => Err(Error::internal(format!("{other} is not a binary operator"))),
    }
}

/// Compiles and runs source in a fresh module and returns the result.
///
/// # Errors
///
/// Returns the compile error or the fatal error that stopped execution.
pub fn eval(source: &str) -> Result<Value> {
    let mut module = Module::new();
    let unit = compile(source, &mut module)?;
    Vm::new(module).run(&unit)
}
