//! Compiler for transforming the AST into bytecode.
//!
//! One [`compile`] call translates a parsed unit into its top-level
//! [`CompiledFunction`], registering every declared function and constant
//! in the shared [`Module`] as a side effect. Compilation either succeeds
//! completely or leaves the module as it found it.

#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_self)]

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use sigil_foundation::{
    Array, Diagnostics, Error, ErrorContext, ErrorKind, Result, Type, Value, ops,
};
use tracing::debug;

use crate::ast::{
    ArrayItem, BinaryOp, Callee, Expr, ExprKind, FunctionDecl, IncDecOp, LogicalOp, Param,
    Program, Stmt, StmtKind, UnaryOp,
};
use crate::module::{FALSE_INDEX, Function, Module, TRUE_INDEX};
use crate::opcode::{Bytecode, Opcode};
use crate::optimizer;
use crate::parser;
use crate::span::Span;

/// Name given to the top-level unit.
pub const MAIN: &str = "{main}";

/// Compiler settings.
#[derive(Clone, Debug)]
pub struct CompilerOptions {
    /// Fuse `Pop, Pop` into `Pop2`.
    pub fuse_pops: bool,
    /// File name attached to compile errors.
    pub source_name: Option<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            fuse_pops: true,
            source_name: None,
        }
    }
}

/// A declared parameter.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arg {
    /// Variable name without the sigil.
    pub name: String,
    /// Declared type the argument is coerced to.
    pub ty: Option<Type>,
    /// True for `?type` hints.
    pub nullable: bool,
    /// Pool index of the default value.
    pub default: Option<u32>,
    /// True for `&$p`.
    pub by_ref: bool,
    /// True for `...$p`.
    pub variadic: bool,
}

/// A compiled function ready for execution.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledFunction {
    /// Declared name, or [`MAIN`] for the top-level unit.
    pub name: String,
    /// Function bytecode.
    pub code: Bytecode,
    /// Parameters; they occupy the first local slots.
    pub args: Vec<Arg>,
    /// Declared return type.
    pub return_type: Option<Type>,
    /// Number of local variable slots.
    pub locals: u32,
    /// Variable names by slot.
    pub variables: Vec<String>,
}

impl CompiledFunction {
    /// Returns true if argument `index` binds by reference.
    #[must_use]
    pub fn takes_reference(&self, index: usize) -> bool {
        match self.args.get(index) {
            Some(arg) => arg.by_ref,
            None => self.args.last().is_some_and(|a| a.variadic && a.by_ref),
        }
    }

    /// Returns the number of arguments a call must supply.
    #[must_use]
    pub fn required_args(&self) -> usize {
        self.args
            .iter()
            .rposition(|a| a.default.is_none() && !a.variadic)
            .map_or(0, |i| i + 1)
    }
}

impl fmt::Display for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                let mut p = String::new();
                if let Some(ty) = a.ty {
                    if a.nullable {
                        p.push('?');
                    }
                    p.push_str(ty.name());
                    p.push(' ');
                }
                if a.by_ref {
                    p.push('&');
                }
                if a.variadic {
                    p.push_str("...");
                }
                p.push('$');
                p.push_str(&a.name);
                p
            })
            .collect();
        writeln!(
            f,
            "function {}({}) [locals: {}]",
            self.name,
            params.join(", "),
            self.locals
        )?;
        write!(f, "{}", self.code)
    }
}

/// Compiles a source unit against `module`.
///
/// # Errors
///
/// Returns the first parse or compile error. The module is left unchanged.
pub fn compile(source: &str, module: &mut Module) -> Result<CompiledFunction> {
    compile_with(source, module, &CompilerOptions::default())
}

/// Compiles a source unit with explicit options.
///
/// # Errors
///
/// Returns the first parse or compile error. The module is left unchanged.
pub fn compile_with(
    source: &str,
    module: &mut Module,
    options: &CompilerOptions,
) -> Result<CompiledFunction> {
    let program = parser::parse(source)?;
    compile_program(&program, source, module, options)
}

/// Compiles an already parsed unit.
///
/// # Errors
///
/// Returns the first compile error. The module is left unchanged.
pub fn compile_program(
    program: &Program,
    source: &str,
    module: &mut Module,
    options: &CompilerOptions,
) -> Result<CompiledFunction> {
    let snapshot = module.clone();
    let result = Compiler::new(module, source, options).compile_unit(program);
    if result.is_err() {
        *module = snapshot;
    }
    result
}

// =============================================================================
// Compiler state
// =============================================================================

/// An enclosing loop, for `break`/`continue`.
struct Loop {
    /// The loop keeps an iterator on the stack.
    foreach: bool,
    /// Jumps to the loop exit.
    breaks: Vec<usize>,
    /// Jumps to the next iteration.
    continues: Vec<usize>,
}

/// Variable slots of the function being compiled.
#[derive(Default)]
struct Scope {
    slots: HashMap<String, u32>,
    variables: Vec<String>,
    loops: Vec<Loop>,
}

/// Compiler state for one unit.
pub struct Compiler<'a> {
    /// Constant pool and function table.
    module: &'a mut Module,
    /// Source text, for error positions.
    source: &'a str,
    options: &'a CompilerOptions,
    /// Variables of the function being compiled.
    scope: Scope,
    /// Top-level declarations registered by the hoisting pass, by span start.
    hoisted: HashMap<usize, u32>,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler writing into `module`.
    #[must_use]
    pub fn new(module: &'a mut Module, source: &'a str, options: &'a CompilerOptions) -> Self {
        Self {
            module,
            source,
            options,
            scope: Scope::default(),
            hoisted: HashMap::new(),
        }
    }

    /// Compiles the top-level unit.
    ///
    /// # Errors
    ///
    /// Returns the first compile error. The module may hold partial
    /// registrations; [`compile`] restores it.
    pub fn compile_unit(&mut self, program: &Program) -> Result<CompiledFunction> {
        // Register every top-level function first so calls may precede
        // declarations.
        for stmt in &program.statements {
            if let StmtKind::Function(decl) = &stmt.kind {
                let idx = self.declare_placeholder(decl)?;
                self.hoisted.insert(decl.span.start, idx);
            }
        }

        let mut code = Bytecode::new();
        self.compile_block(&program.statements, &mut code)?;
        self.finish(&mut code);
        let scope = std::mem::take(&mut self.scope);
        Ok(CompiledFunction {
            name: MAIN.to_string(),
            code,
            args: Vec::new(),
            return_type: None,
            locals: scope.variables.len() as u32,
            variables: scope.variables,
        })
    }

    /// Appends the implicit `Return` and runs the optimizer.
    fn finish(&self, code: &mut Bytecode) {
        let end = code.len() as u32;
        let returns = code
            .last()
            .is_some_and(|i| matches!(i.opcode(), Opcode::Return | Opcode::ReturnValue));
        let jumps_to_end = code
            .iter()
            .any(|(op, operand)| op.is_jump() && operand == end);
        if !returns || jumps_to_end {
            code.emit(Opcode::Return);
        }
        optimizer::optimize(code, self.options);
    }

    // =========================================================================
    // Errors and symbols
    // =========================================================================

    fn context(&self, span: Span) -> ErrorContext {
        let context = ErrorContext::new().with_position(span.line as usize, span.column as usize);
        match &self.options.source_name {
            Some(name) => context.with_source(name.clone()),
            None => context.with_source(span.line_text(self.source).trim().to_string()),
        }
    }

    fn error(&self, span: Span, kind: ErrorKind) -> Error {
        Error::new(kind).with_context(self.context(span))
    }

    fn unsupported(&self, span: Span, what: &str) -> Error {
        self.error(span, ErrorKind::Unsupported(what.to_string()))
    }

    /// Attaches a position to an error that has none.
    fn locate(&self, span: Span, err: Error) -> Error {
        if err.context.is_some() {
            err
        } else {
            err.with_context(self.context(span))
        }
    }

    /// Returns the slot of a variable, allocating one on first use.
    fn slot(&mut self, name: &str) -> u32 {
        if let Some(&slot) = self.scope.slots.get(name) {
            return slot;
        }
        let slot = self.scope.variables.len() as u32;
        self.scope.slots.insert(name.to_string(), slot);
        self.scope.variables.push(name.to_string());
        slot
    }

    fn emit_const(&mut self, value: Value, code: &mut Bytecode) {
        let idx = self.module.add_constant(value);
        code.emit_with(Opcode::Const, idx);
    }

    fn patch(&self, code: &mut Bytecode, jump: usize, target: usize) -> Result<()> {
        code.patch_jump(jump, target)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn compile_block(&mut self, stmts: &[Stmt], code: &mut Bytecode) -> Result<()> {
        for stmt in stmts {
            self.compile_stmt(stmt, code)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt, code: &mut Bytecode) -> Result<()> {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Echo(exprs) => {
                for expr in exprs {
                    self.compile_expr(expr, code)?;
                }
                code.emit_with(Opcode::Echo, exprs.len() as u32);
            }
            StmtKind::InlineHtml(text) => {
                self.emit_const(Value::from(text.as_str()), code);
                code.emit_with(Opcode::Echo, 1);
            }
            StmtKind::Expr(expr) => {
                self.compile_expr(expr, code)?;
                code.emit(Opcode::Pop);
            }
            StmtKind::If {
                branches,
                otherwise,
            } => self.compile_if(branches, otherwise.as_deref(), code)?,
            StmtKind::While { cond, body } => {
                let start = code.len();
                self.compile_expr(cond, code)?;
                let exit = code.emit_with(Opcode::JumpFalse, 0);
                let lp = self.compile_loop_body(body, false, code)?;
                code.emit_with(Opcode::Jump, start as u32);
                let end = code.len();
                self.patch(code, exit, end)?;
                self.close_loop(lp, start, end, code)?;
            }
            StmtKind::DoWhile { body, cond } => {
                let start = code.len();
                let lp = self.compile_loop_body(body, false, code)?;
                let check = code.len();
                self.compile_expr(cond, code)?;
                code.emit_with(Opcode::JumpTrue, start as u32);
                let end = code.len();
                self.close_loop(lp, check, end, code)?;
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                for expr in init {
                    self.compile_expr(expr, code)?;
                    code.emit(Opcode::Pop);
                }
                let start = code.len();
                let mut exit = None;
                for (i, expr) in cond.iter().enumerate() {
                    self.compile_expr(expr, code)?;
                    if i + 1 < cond.len() {
                        code.emit(Opcode::Pop);
                    } else {
                        exit = Some(code.emit_with(Opcode::JumpFalse, 0));
                    }
                }
                let lp = self.compile_loop_body(body, false, code)?;
                let next = code.len();
                for expr in step {
                    self.compile_expr(expr, code)?;
                    code.emit(Opcode::Pop);
                }
                code.emit_with(Opcode::Jump, start as u32);
                let end = code.len();
                if let Some(exit) = exit {
                    self.patch(code, exit, end)?;
                }
                self.close_loop(lp, next, end, code)?;
            }
            StmtKind::Foreach {
                subject,
                key,
                value,
                by_ref,
                body,
            } => self.compile_foreach(subject, key.as_ref(), value, *by_ref, body, code)?,
            StmtKind::Function(decl) => self.compile_function(decl)?,
            StmtKind::Return(value) => match value {
                Some(expr) => {
                    self.compile_expr(expr, code)?;
                    code.emit(Opcode::ReturnValue);
                }
                None => {
                    code.emit(Opcode::Return);
                }
            },
            StmtKind::Unset(targets) => {
                for target in targets {
                    self.compile_unset(target, code)?;
                }
            }
            StmtKind::Const(defs) => {
                for (name, expr) in defs {
                    let value = self.const_eval(expr)?;
                    self.module
                        .define(name, value)
                        .map_err(|e| self.locate(span, e))?;
                }
            }
            StmtKind::Block(stmts) => self.compile_block(stmts, code)?,
            StmtKind::Break(level) => self.compile_jump_out(*level, false, span, code)?,
            StmtKind::Continue(level) => self.compile_jump_out(*level, true, span, code)?,
            StmtKind::Throw(expr) => {
                self.compile_expr(expr, code)?;
                code.emit(Opcode::Throw);
            }
            StmtKind::Empty => {
                code.emit(Opcode::Noop);
            }
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        branches: &[(Expr, Vec<Stmt>)],
        otherwise: Option<&[Stmt]>,
        code: &mut Bytecode,
    ) -> Result<()> {
        let mut exits = Vec::new();
        for (i, (cond, body)) in branches.iter().enumerate() {
            self.compile_expr(cond, code)?;
            let next = code.emit_with(Opcode::JumpFalse, 0);
            self.compile_block(body, code)?;
            let last = i + 1 == branches.len() && otherwise.is_none();
            if !last {
                exits.push(code.emit_with(Opcode::Jump, 0));
            }
            let target = code.len();
            self.patch(code, next, target)?;
        }
        if let Some(body) = otherwise {
            self.compile_block(body, code)?;
        }
        let end = code.len();
        for exit in exits {
            self.patch(code, exit, end)?;
        }
        Ok(())
    }

    fn compile_loop_body(&mut self, body: &[Stmt], foreach: bool, code: &mut Bytecode) -> Result<Loop> {
        self.scope.loops.push(Loop {
            foreach,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
        let result = self.compile_block(body, code);
        let lp = self
            .scope
            .loops
            .pop()
            .ok_or_else(|| Error::internal("loop stack underflow"))?;
        result.map(|()| lp)
    }

    fn close_loop(&self, lp: Loop, next: usize, end: usize, code: &mut Bytecode) -> Result<()> {
        for jump in lp.continues {
            self.patch(code, jump, next)?;
        }
        for jump in lp.breaks {
            self.patch(code, jump, end)?;
        }
        Ok(())
    }

    /// Emits `break n` or `continue n`, popping the iterators of every
    /// `foreach` left on the way out.
    fn compile_jump_out(
        &mut self,
        level: u32,
        is_continue: bool,
        span: Span,
        code: &mut Bytecode,
    ) -> Result<()> {
        let keyword = if is_continue { "continue" } else { "break" };
        let depth = self.scope.loops.len();
        let level = level as usize;
        if depth == 0 {
            return Err(self.error(
                span,
                ErrorKind::Fatal(format!("'{keyword}' not in the 'loop' or 'switch' context")),
            ));
        }
        if level > depth {
            let plural = if level == 1 { "" } else { "s" };
            return Err(self.error(
                span,
                ErrorKind::Fatal(format!("Cannot '{keyword}' {level} level{plural}")),
            ));
        }
        let target = depth - level;
        for lp in &self.scope.loops[target + 1..] {
            if lp.foreach {
                code.emit(Opcode::Pop);
            }
        }
        let jump = code.emit_with(Opcode::Jump, 0);
        let lp = &mut self.scope.loops[target];
        if is_continue {
            lp.continues.push(jump);
        } else {
            lp.breaks.push(jump);
        }
        Ok(())
    }

    fn compile_foreach(
        &mut self,
        subject: &Expr,
        key: Option<&Expr>,
        value: &Expr,
        by_ref: bool,
        body: &[Stmt],
        code: &mut Bytecode,
    ) -> Result<()> {
        if by_ref && subject.is_writable() {
            self.compile_write(subject, code)?;
        } else {
            self.compile_expr(subject, code)?;
        }
        code.emit(Opcode::ForEachInit);

        let check = code.len();
        code.emit(Opcode::ForEachValid);
        let exit = code.emit_with(Opcode::JumpFalse, 0);

        let ExprKind::Variable(name) = &value.kind else {
            return Err(self.unsupported(value.span, "foreach value must be a variable"));
        };
        let slot = self.slot(name);
        let op = if by_ref {
            Opcode::ForEachValueRef
        } else {
            Opcode::ForEachValue
        };
        code.emit_with(op, slot);
        if let Some(key) = key {
            let ExprKind::Variable(name) = &key.kind else {
                return Err(self.unsupported(key.span, "foreach key must be a variable"));
            };
            let slot = self.slot(name);
            code.emit_with(Opcode::ForEachKey, slot);
        }

        let lp = self.compile_loop_body(body, true, code)?;
        let next = code.len();
        code.emit(Opcode::ForEachNext);
        code.emit_with(Opcode::Jump, check as u32);
        let end = code.len();
        code.emit(Opcode::Pop);
        self.patch(code, exit, end)?;
        self.close_loop(lp, next, end, code)
    }

    fn compile_unset(&mut self, target: &Expr, code: &mut Bytecode) -> Result<()> {
        match &target.kind {
            ExprKind::Variable(name) => {
                let slot = self.slot(name);
                code.emit_with(Opcode::Unset, slot);
            }
            ExprKind::Dim {
                base,
                index: Some(index),
            } => {
                self.compile_write(base, code)?;
                self.compile_expr(index, code)?;
                code.emit(Opcode::ArrayUnset);
                code.emit(Opcode::Pop);
            }
            ExprKind::Dim { index: None, .. } => {
                return Err(self.error(
                    target.span,
                    ErrorKind::Fatal("Cannot use [] for unsetting".to_string()),
                ));
            }
            _ => return Err(self.unsupported(target.span, "unset() of a temporary value")),
        }
        Ok(())
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn signature(&mut self, decl: &FunctionDecl) -> Result<Vec<Arg>> {
        decl.params.iter().map(|p| self.arg(p, decl.span)).collect()
    }

    fn arg(&mut self, param: &Param, span: Span) -> Result<Arg> {
        let (ty, nullable) = param
            .type_hint
            .as_deref()
            .map_or((None, false), parse_type_hint);
        let default = match &param.default {
            Some(expr) => {
                let value = self.const_eval(expr)?;
                Some(self.module.add_constant(value))
            }
            None => None,
        };
        if param.variadic && default.is_some() {
            return Err(self.error(
                span,
                ErrorKind::Fatal("Variadic parameter cannot have a default value".to_string()),
            ));
        }
        Ok(Arg {
            name: param.name.clone(),
            ty,
            nullable,
            default,
            by_ref: param.by_ref,
            variadic: param.variadic,
        })
    }

    /// Registers a function under its name with an empty body so calls to
    /// it resolve before the body is compiled.
    fn declare_placeholder(&mut self, decl: &FunctionDecl) -> Result<u32> {
        let args = self.signature(decl)?;
        let placeholder = CompiledFunction {
            name: decl.name.clone(),
            code: Bytecode::new(),
            variables: args.iter().map(|a| a.name.clone()).collect(),
            locals: args.len() as u32,
            args,
            return_type: decl.return_type.as_deref().and_then(|t| parse_type_hint(t).0),
        };
        let idx = self
            .module
            .declare_function(Function::Compiled(Rc::new(placeholder)))
            .map_err(|e| self.locate(decl.span, e))?;
        debug!(name = %decl.name, idx, "registered function");
        Ok(idx)
    }

    fn compile_function(&mut self, decl: &FunctionDecl) -> Result<()> {
        let idx = match self.hoisted.get(&decl.span.start) {
            Some(&idx) => idx,
            None => self.declare_placeholder(decl)?,
        };
        let hoisted_args = match self.module.function(idx) {
            Some(Function::Compiled(placeholder)) => Some(placeholder.args.clone()),
            _ => None,
        };
        let args = match hoisted_args {
            Some(args) => args,
            None => self.signature(decl)?,
        };

        let outer = std::mem::take(&mut self.scope);
        for arg in &args {
            self.slot(&arg.name);
        }
        let mut code = Bytecode::new();
        let result = self.compile_block(&decl.body, &mut code);
        let scope = std::mem::replace(&mut self.scope, outer);
        result?;
        self.finish(&mut code);

        let function = CompiledFunction {
            name: decl.name.clone(),
            code,
            args,
            return_type: decl.return_type.as_deref().and_then(|t| parse_type_hint(t).0),
            locals: scope.variables.len() as u32,
            variables: scope.variables,
        };
        debug!(
            name = %function.name,
            instructions = function.code.len(),
            locals = function.locals,
            "compiled function"
        );
        self.module
            .replace_function(idx, Function::Compiled(Rc::new(function)))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Compiles an expression that leaves exactly one value on the stack.
    fn compile_expr(&mut self, expr: &Expr, code: &mut Bytecode) -> Result<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Int(n) => self.emit_const(Value::Int(*n), code),
            ExprKind::Float(f) => self.emit_const(Value::Float(*f), code),
            ExprKind::String(s) => self.emit_const(Value::from(s.as_str()), code),
            ExprKind::Variable(name) => {
                let slot = self.slot(name);
                code.emit_with(Opcode::Load, slot);
            }
            ExprKind::Constant(name) => {
                let idx = self.module.lookup_constant(name).ok_or_else(|| {
                    self.error(
                        span,
                        ErrorKind::UndefinedSymbol(format!("Undefined constant \"{name}\"")),
                    )
                })?;
                code.emit_with(Opcode::Const, idx);
            }
            ExprKind::Array(items) => self.compile_array(items, code)?,
            ExprKind::Dim { base, index } => {
                let Some(index) = index else {
                    return Err(self.error(
                        span,
                        ErrorKind::Fatal("Cannot use [] for reading".to_string()),
                    ));
                };
                self.compile_expr(base, code)?;
                self.compile_expr(index, code)?;
                code.emit(Opcode::ArrayAccessRead);
            }
            ExprKind::Call { callee, args } => self.compile_call(callee, args, span, code)?,
            ExprKind::Assign { target, value } => match &target.kind {
                ExprKind::Variable(name) => {
                    self.compile_expr(value, code)?;
                    let slot = self.slot(name);
                    code.emit_with(Opcode::Assign, slot);
                }
                ExprKind::Dim { .. } => {
                    self.compile_write(target, code)?;
                    self.compile_expr(value, code)?;
                    code.emit(Opcode::AssignRef);
                }
                _ => return Err(self.unsupported(target.span, "assignment to a temporary value")),
            },
            ExprKind::AssignRef { target, value } => {
                let ExprKind::Variable(name) = &target.kind else {
                    return Err(self.unsupported(target.span, "reference assignment to an array element"));
                };
                if !value.is_writable() {
                    return Err(self.unsupported(value.span, "reference to a temporary value"));
                }
                self.compile_write(value, code)?;
                let slot = self.slot(name);
                code.emit_with(Opcode::Assign, slot);
            }
            ExprKind::AssignOp { op, target, value } => {
                let binary = binary_opcode(*op)
                    .filter(|b| b.compound().is_some())
                    .ok_or_else(|| self.unsupported(span, "compound assignment operator"))?;
                match &target.kind {
                    ExprKind::Variable(name) => {
                        self.compile_expr(value, code)?;
                        let slot = self.slot(name);
                        let compound = binary
                            .compound()
                            .ok_or_else(|| Error::internal("missing compound opcode"))?;
                        code.emit_with(compound, slot);
                    }
                    ExprKind::Dim { .. } => {
                        self.compile_write(target, code)?;
                        self.compile_expr(value, code)?;
                        code.emit_with(Opcode::AssignOpRef, binary as u32);
                    }
                    _ => {
                        return Err(self.unsupported(target.span, "assignment to a temporary value"));
                    }
                }
            }
            ExprKind::AssignCoalesce { target, value } => match &target.kind {
                ExprKind::Variable(name) => {
                    self.compile_expr(value, code)?;
                    let slot = self.slot(name);
                    code.emit_with(Opcode::AssignCoalesce, slot);
                }
                ExprKind::Dim { base, index } => {
                    let Some(index) = index else {
                        return Err(self.error(
                            target.span,
                            ErrorKind::Fatal("Cannot use [] for reading".to_string()),
                        ));
                    };
                    // Container and key are evaluated once and stay on the
                    // stack for the write.
                    self.compile_write(base, code)?;
                    self.compile_expr(index, code)?;
                    code.emit(Opcode::ArrayAccessPeek);
                    code.emit(Opcode::Dup);
                    code.emit_with(Opcode::IsSet, 1);
                    let assign = code.emit_with(Opcode::JumpFalse, 0);
                    code.emit_with(Opcode::PopBelow, 2);
                    let done = code.emit_with(Opcode::Jump, 0);
                    let here = code.len();
                    self.patch(code, assign, here)?;
                    code.emit(Opcode::Pop);
                    code.emit(Opcode::ArrayAccessWrite);
                    self.compile_expr(value, code)?;
                    code.emit(Opcode::AssignRef);
                    let end = code.len();
                    self.patch(code, done, end)?;
                }
                _ => return Err(self.unsupported(target.span, "assignment to a temporary value")),
            },
            ExprKind::IncDec { op, target } => match &target.kind {
                ExprKind::Variable(name) => {
                    let slot = self.slot(name);
                    let opcode = match op {
                        IncDecOp::PreInc => Opcode::PreIncrement,
                        IncDecOp::PreDec => Opcode::PreDecrement,
                        IncDecOp::PostInc => Opcode::PostIncrement,
                        IncDecOp::PostDec => Opcode::PostDecrement,
                    };
                    code.emit_with(opcode, slot);
                }
                ExprKind::Dim { .. } => {
                    self.compile_write(target, code)?;
                    let mode = match op {
                        IncDecOp::PreInc => 0,
                        IncDecOp::PreDec => 1,
                        IncDecOp::PostInc => 2,
                        IncDecOp::PostDec => 3,
                    };
                    code.emit_with(Opcode::IncDecRef, mode);
                }
                _ => return Err(self.unsupported(target.span, "increment of a temporary value")),
            },
            ExprKind::Unary { op, operand } => {
                self.compile_expr(operand, code)?;
                match op {
                    UnaryOp::Not => {
                        code.emit(Opcode::Not);
                    }
                    UnaryOp::BitNot => {
                        code.emit(Opcode::BwNot);
                    }
                    UnaryOp::Neg => {
                        self.emit_const(Value::Int(-1), code);
                        code.emit(Opcode::Mul);
                    }
                    UnaryOp::Plus => {
                        self.emit_const(Value::Int(0), code);
                        code.emit(Opcode::Add);
                    }
                }
            }
            ExprKind::Binary { op, left, right } => {
                self.compile_expr(left, code)?;
                self.compile_expr(right, code)?;
                let opcode = match op {
                    BinaryOp::Equal => Opcode::Equal,
                    BinaryOp::NotEqual => Opcode::NotEqual,
                    BinaryOp::Identical => Opcode::Identical,
                    BinaryOp::NotIdentical => Opcode::NotIdentical,
                    BinaryOp::Less => Opcode::Less,
                    BinaryOp::LessEqual => Opcode::LessOrEqual,
                    BinaryOp::Greater => Opcode::Greater,
                    BinaryOp::GreaterEqual => Opcode::GreaterOrEqual,
                    BinaryOp::Spaceship => Opcode::Compare,
                    other => binary_opcode(*other)
                        .ok_or_else(|| self.unsupported(span, "binary operator"))?,
                };
                code.emit(opcode);
            }
            ExprKind::Logical { op, left, right } => self.compile_logical(*op, left, right, code)?,
            ExprKind::Coalesce { left, right } => {
                self.compile_quiet(left, code)?;
                code.emit(Opcode::Dup);
                code.emit_with(Opcode::IsSet, 1);
                let done = code.emit_with(Opcode::JumpTrue, 0);
                code.emit(Opcode::Pop);
                self.compile_expr(right, code)?;
                let end = code.len();
                self.patch(code, done, end)?;
            }
            ExprKind::Ternary {
                cond,
                then: None,
                otherwise,
            } => {
                self.compile_expr(cond, code)?;
                code.emit(Opcode::Dup);
                let done = code.emit_with(Opcode::JumpTrue, 0);
                code.emit(Opcode::Pop);
                self.compile_expr(otherwise, code)?;
                let end = code.len();
                self.patch(code, done, end)?;
            }
            ExprKind::Ternary {
                cond,
                then: Some(then),
                otherwise,
            } => {
                self.compile_expr(cond, code)?;
                let other = code.emit_with(Opcode::JumpFalse, 0);
                self.compile_expr(then, code)?;
                let done = code.emit_with(Opcode::Jump, 0);
                let here = code.len();
                self.patch(code, other, here)?;
                self.compile_expr(otherwise, code)?;
                let end = code.len();
                self.patch(code, done, end)?;
            }
            ExprKind::Isset(exprs) => {
                for expr in exprs {
                    self.compile_quiet(expr, code)?;
                }
                code.emit_with(Opcode::IsSet, exprs.len() as u32);
            }
            ExprKind::Empty(operand) => {
                self.compile_quiet(operand, code)?;
                code.emit(Opcode::Not);
            }
            ExprKind::Cast(ty, operand) => {
                self.compile_expr(operand, code)?;
                code.emit_with(Opcode::Cast, ty.code());
            }
            ExprKind::Print(operand) => {
                self.compile_expr(operand, code)?;
                code.emit_with(Opcode::Echo, 1);
                self.emit_const(Value::Int(1), code);
            }
        }
        Ok(())
    }

    /// Compiles a read that must not warn about missing keys.
    fn compile_quiet(&mut self, expr: &Expr, code: &mut Bytecode) -> Result<()> {
        match &expr.kind {
            ExprKind::Dim {
                base,
                index: Some(index),
            } => {
                self.compile_quiet(base, code)?;
                self.compile_expr(index, code)?;
                code.emit(Opcode::ArrayAccessQuiet);
                Ok(())
            }
            _ => self.compile_expr(expr, code),
        }
    }

    /// Compiles a writable location so that it leaves a reference to the
    /// location on the stack, autovivifying arrays along the way.
    fn compile_write(&mut self, expr: &Expr, code: &mut Bytecode) -> Result<()> {
        match &expr.kind {
            ExprKind::Variable(name) => {
                let slot = self.slot(name);
                code.emit_with(Opcode::LoadRef, slot);
            }
            ExprKind::Dim { base, index } => {
                self.compile_write(base, code)?;
                match index {
                    Some(index) => {
                        self.compile_expr(index, code)?;
                        code.emit(Opcode::ArrayAccessWrite);
                    }
                    None => {
                        code.emit(Opcode::ArrayAccessPush);
                    }
                }
            }
            _ => return Err(self.unsupported(expr.span, "write to a temporary value")),
        }
        Ok(())
    }

    /// Builds an array literal in place: each element is written through
    /// the same protocol as `$a[k] = v`, with the new array as container.
    fn compile_array(&mut self, items: &[ArrayItem], code: &mut Bytecode) -> Result<()> {
        code.emit(Opcode::ArrayNew);
        for item in items {
            if item.by_ref {
                return Err(self.unsupported(item.value.span, "by-reference array element"));
            }
            match &item.key {
                Some(key) => {
                    self.compile_expr(key, code)?;
                    code.emit(Opcode::ArrayAccessWrite);
                }
                None => {
                    code.emit(Opcode::ArrayAccessPush);
                }
            }
            self.compile_expr(&item.value, code)?;
            code.emit(Opcode::AssignRef);
            code.emit(Opcode::Pop);
        }
        Ok(())
    }

    fn compile_call(
        &mut self,
        callee: &Callee,
        args: &[Expr],
        span: Span,
        code: &mut Bytecode,
    ) -> Result<()> {
        match callee {
            Callee::Name(name) => {
                let idx = self.module.function_index(name).ok_or_else(|| {
                    self.error(
                        span,
                        ErrorKind::UndefinedSymbol(format!("Call to undefined function {name}()")),
                    )
                })?;
                let by_ref: Vec<bool> = match self.module.function(idx) {
                    Some(function) => (0..args.len()).map(|i| function.takes_reference(i)).collect(),
                    None => vec![false; args.len()],
                };
                code.emit_with(Opcode::InitCall, idx);
                for (arg, by_ref) in args.iter().zip(by_ref) {
                    if by_ref && arg.is_writable() {
                        self.compile_write(arg, code)?;
                    } else {
                        self.compile_expr(arg, code)?;
                    }
                }
            }
            Callee::Expr(callee) => {
                self.compile_expr(callee, code)?;
                for arg in args {
                    self.compile_expr(arg, code)?;
                }
            }
        }
        code.emit_with(Opcode::Call, args.len() as u32);
        Ok(())
    }

    fn compile_logical(
        &mut self,
        op: LogicalOp,
        left: &Expr,
        right: &Expr,
        code: &mut Bytecode,
    ) -> Result<()> {
        let bool_code = Type::Bool.code();
        self.compile_expr(left, code)?;
        let (test, short) = match op {
            LogicalOp::And => (Opcode::JumpFalse, FALSE_INDEX),
            LogicalOp::Or => (Opcode::JumpTrue, TRUE_INDEX),
            LogicalOp::Xor => {
                code.emit_with(Opcode::Cast, bool_code);
                self.compile_expr(right, code)?;
                code.emit_with(Opcode::Cast, bool_code);
                code.emit(Opcode::NotEqual);
                return Ok(());
            }
        };
        let jump = code.emit_with(test, 0);
        self.compile_expr(right, code)?;
        code.emit_with(Opcode::Cast, bool_code);
        let done = code.emit_with(Opcode::Jump, 0);
        let here = code.len();
        self.patch(code, jump, here)?;
        code.emit_with(Opcode::Const, short);
        let end = code.len();
        self.patch(code, done, end)
    }

    // =========================================================================
    // Constant expressions
    // =========================================================================

    /// Evaluates a default value or `const` initializer at compile time.
    fn const_eval(&mut self, expr: &Expr) -> Result<Value> {
        let span = expr.span;
        let mut diag = Diagnostics::new();
        let value = match &expr.kind {
            ExprKind::Int(n) => Value::Int(*n),
            ExprKind::Float(f) => Value::Float(*f),
            ExprKind::String(s) => Value::from(s.as_str()),
            ExprKind::Constant(name) => self
                .module
                .lookup_constant(name)
                .and_then(|idx| self.module.constant(idx))
                .cloned()
                .ok_or_else(|| {
                    self.error(
                        span,
                        ErrorKind::UndefinedSymbol(format!("Undefined constant \"{name}\"")),
                    )
                })?,
            ExprKind::Array(items) => {
                let mut array = Array::new();
                for item in items {
                    if item.by_ref {
                        return Err(self.unsupported(span, "by-reference array element"));
                    }
                    let value = self.const_eval(&item.value)?;
                    match &item.key {
                        Some(key) => {
                            let key = self.const_eval(key)?;
                            let key = ops::to_key(&key, &mut diag).ok_or_else(|| {
                                self.error(span, ErrorKind::Fatal("Illegal offset type".to_string()))
                            })?;
                            array.insert(key, value);
                        }
                        None => {
                            array.push(value);
                        }
                    }
                }
                Value::Array(array)
            }
            ExprKind::Unary { op, operand } => {
                let v = self.const_eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!ops::to_bool(&v))),
                    UnaryOp::BitNot => ops::bit_not(&v, &mut diag),
                    UnaryOp::Neg => ops::mul(&v, &Value::Int(-1), &mut diag),
                    UnaryOp::Plus => ops::add(&v, &Value::Int(0), &mut diag),
                }
                .map_err(|e| self.locate(span, e))?
            }
            ExprKind::Binary { op, left, right } => {
                let a = self.const_eval(left)?;
                let b = self.const_eval(right)?;
                fold_binary(*op, &a, &b, &mut diag).map_err(|e| self.locate(span, e))?
            }
            ExprKind::Cast(ty, operand) => {
                let v = self.const_eval(operand)?;
                ops::cast(&v, *ty, &mut diag).map_err(|e| self.locate(span, e))?
            }
            _ => {
                return Err(self.error(
                    span,
                    ErrorKind::Fatal("Constant expression contains invalid operations".to_string()),
                ));
            }
        };
        Ok(value)
    }
}

/// Splits a type hint into its type and nullability. Hints without a
/// coercion (`mixed`, `callable`, class names) yield `None`.
fn parse_type_hint(hint: &str) -> (Option<Type>, bool) {
    let (name, nullable) = match hint.strip_prefix('?') {
        Some(rest) => (rest, true),
        None => (hint, false),
    };
    let ty = Type::from_name(name).filter(|t| *t != Type::Null);
    (ty, nullable)
}

/// Maps an arithmetic, bitwise or concat operator to its opcode.
const fn binary_opcode(op: BinaryOp) -> Option<Opcode> {
    Some(match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Pow => Opcode::Pow,
        BinaryOp::Concat => Opcode::Concat,
        BinaryOp::BitAnd => Opcode::BwAnd,
        BinaryOp::BitOr => Opcode::BwOr,
        BinaryOp::BitXor => Opcode::BwXor,
        BinaryOp::ShiftLeft => Opcode::ShiftLeft,
        BinaryOp::ShiftRight => Opcode::ShiftRight,
        _ => return None,
    })
}

fn fold_binary(op: BinaryOp, a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    Ok(match op {
        BinaryOp::Add => ops::add(a, b, diag)?,
        BinaryOp::Sub => ops::sub(a, b, diag)?,
        BinaryOp::Mul => ops::mul(a, b, diag)?,
        BinaryOp::Div => ops::div(a, b, diag)?,
        BinaryOp::Mod => ops::modulo(a, b, diag)?,
        BinaryOp::Pow => ops::pow(a, b, diag)?,
        BinaryOp::Concat => ops::concat(a, b, diag)?,
        BinaryOp::BitAnd => ops::bit_and(a, b, diag)?,
        BinaryOp::BitOr => ops::bit_or(a, b, diag)?,
        BinaryOp::BitXor => ops::bit_xor(a, b, diag)?,
        BinaryOp::ShiftLeft => ops::shift_left(a, b, diag)?,
        BinaryOp::ShiftRight => ops::shift_right(a, b, diag)?,
        BinaryOp::Equal => Value::Bool(ops::loose_equal(a, b, diag)?),
        BinaryOp::NotEqual => Value::Bool(!ops::loose_equal(a, b, diag)?),
        BinaryOp::Identical => Value::Bool(ops::identical(a, b)),
        BinaryOp::NotIdentical => Value::Bool(!ops::identical(a, b)),
        BinaryOp::Less => Value::Bool(ops::compare(a, b, diag)? < 0),
        BinaryOp::LessEqual => Value::Bool(ops::compare(a, b, diag)? <= 0),
        BinaryOp::Greater => Value::Bool(ops::compare(a, b, diag)? > 0),
        BinaryOp::GreaterEqual => Value::Bool(ops::compare(a, b, diag)? >= 0),
        BinaryOp::Spaceship => Value::Int(ops::compare(a, b, diag)?),
    })
}

#[cfg(test)]
mod tests;
