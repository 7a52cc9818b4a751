//! Tree-walking interpreter.
//!
//! Runs a resolved [`Program`] against a [`Farm`]. Every primitive call goes
//! through the farm and therefore through one scheduler tick, which is the
//! only place a run suspends or observes the stop flag. Pure loops that never
//! call a primitive still poll the stop flag and count against the step
//! budget.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use rand::Rng;
use tracing::trace;

use crate::error::{Fault, FaultResult};
use crate::game::{Direction, Entity, Farm, Item, Primitive, StateStore};
use crate::scheduler::Clock;
use crate::script::ast::{BinOp, BoolOp, Callee, Const, Expr, Program, Stmt, StmtKind, Target, UnaryOp};
use crate::script::builtins::{self, Builtin, check_arity};
use crate::script::value::{self, Closure, Dict, RuntimeError, Set, Value, ValueResult};

/// Deepest user-function recursion allowed.
pub const MAX_CALL_DEPTH: usize = 200;

/// Steps between polls of the stop flag.
const STOP_POLL_INTERVAL: u64 = 1024;

type Scope = HashMap<Arc<str>, Value>;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Executes one program against one farm.
pub struct Interpreter<'f, S: StateStore, C: Clock> {
    farm: &'f mut Farm<S, C>,
    globals: Scope,
    frames: Vec<Scope>,
    line: usize,
    steps: u64,
    step_budget: Option<u64>,
}

impl<S: StateStore, C: Clock> std::fmt::Debug for Interpreter<'_, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("globals", &self.globals.len())
            .field("depth", &self.frames.len())
            .field("line", &self.line)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl<'f, S: StateStore, C: Clock> Interpreter<'f, S, C> {
    /// Create an interpreter with the direction constants bound.
    pub fn new(farm: &'f mut Farm<S, C>) -> Self {
        let globals = Direction::ALL
            .into_iter()
            .map(|d| (Arc::from(d.name()), Value::Direction(d)))
            .collect();
        Self {
            farm,
            globals,
            frames: Vec::new(),
            line: 0,
            steps: 0,
            step_budget: None,
        }
    }

    /// Limit the number of statements and calls executed.
    #[must_use]
    pub fn with_step_budget(mut self, budget: Option<u64>) -> Self {
        self.step_budget = budget;
        self
    }

    /// Statements and calls executed so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// A global variable, if bound.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Run `program` to completion or to the first fault.
    ///
    /// # Errors
    ///
    /// Any [`Fault`]: the stop flag, store faults, script errors tagged with
    /// their line, or an exhausted step budget.
    pub fn run(&mut self, program: &Program) -> FaultResult<()> {
        // A top-level `return` ends the script.
        self.exec_block(&program.body).map(|_| ())
    }

    fn fail(&self, error: RuntimeError) -> Fault {
        Fault::script(self.line, error.to_string())
    }

    fn check<T>(&self, result: ValueResult<T>) -> FaultResult<T> {
        result.map_err(|e| self.fail(e))
    }

    fn step(&mut self) -> FaultResult<()> {
        self.steps += 1;
        if let Some(budget) = self.step_budget
            && self.steps > budget
        {
            return Err(Fault::BudgetExhausted(budget));
        }
        if self.steps % STOP_POLL_INTERVAL == 0 && self.farm.store().stop_requested() {
            return Err(Fault::Stopped);
        }
        Ok(())
    }

    // ---- variables ----

    fn lookup(&self, name: &Arc<str>) -> FaultResult<Value> {
        if let Some(v) = self.frames.last().and_then(|frame| frame.get(name)) {
            return Ok(v.clone());
        }
        if let Some(v) = self.globals.get(name) {
            return Ok(v.clone());
        }
        if let Some(b) = Builtin::from_name(name) {
            return Ok(Value::Builtin(b));
        }
        if let Some(p) = Primitive::from_name(name) {
            return Ok(Value::Primitive(p));
        }
        Err(Fault::script(
            self.line,
            format!("NameError: name '{name}' is not defined"),
        ))
    }

    fn bind(&mut self, name: &Arc<str>, value: Value) {
        let scope = self.frames.last_mut().unwrap_or(&mut self.globals);
        scope.insert(Arc::clone(name), value);
    }

    fn assign(&mut self, target: &Target, value: Value) -> FaultResult<()> {
        match target {
            Target::Name(name) => {
                self.bind(name, value);
                Ok(())
            }
            Target::Index { value: container, index } => {
                let container = self.eval(container)?;
                let index = self.eval(index)?;
                self.check(container.set_index(&index, value))
            }
            Target::Tuple(targets) => {
                let items = self.check(value.to_vec())?;
                if items.len() != targets.len() {
                    let message = if items.len() > targets.len() {
                        format!("too many values to unpack (expected {})", targets.len())
                    } else {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    };
                    return Err(self.fail(RuntimeError::value_error(message)));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
        }
    }

    // ---- statements ----

    fn exec_block(&mut self, body: &[Stmt]) -> FaultResult<Flow> {
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> FaultResult<Flow> {
        self.line = stmt.line;
        self.step()?;
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.eval(e)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                let operand = self.eval(value)?;
                match target {
                    Target::Name(name) => {
                        let current = self.lookup(name)?;
                        let updated = self.augmented(*op, &current, &operand)?;
                        self.bind(name, updated);
                    }
                    Target::Index { value: container, index } => {
                        let container = self.eval(container)?;
                        let index = self.eval(index)?;
                        let current = self.check(container.index(&index))?;
                        let updated = self.augmented(*op, &current, &operand)?;
                        self.check(container.set_index(&index, updated))?;
                    }
                    Target::Tuple(_) => {
                        return Err(Fault::script(
                            self.line,
                            "SyntaxError: illegal expression for augmented assignment",
                        ));
                    }
                }
            }
            StmtKind::If { branches, orelse } => {
                for (test, body) in branches {
                    if self.eval(test)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(orelse);
            }
            StmtKind::While { test, body } => loop {
                self.line = stmt.line;
                if !self.eval(test)?.truthy() {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Normal | Flow::Continue => self.step()?,
                }
            },
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval(iter)?;
                for item in self.check(iterable.iter())? {
                    self.line = stmt.line;
                    self.assign(target, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => self.step()?,
                    }
                }
            }
            StmtKind::Def(def) => {
                let defaults = def
                    .params
                    .iter()
                    .filter_map(|p| p.default.as_ref())
                    .map(|d| self.eval(d))
                    .collect::<FaultResult<Vec<_>>>()?;
                let closure = Closure {
                    def: Arc::clone(def),
                    defaults,
                };
                self.bind(&def.name, Value::Function(Rc::new(closure)));
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(e) => self.eval(e)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
        }
        Ok(Flow::Normal)
    }

    /// `+=` on a list extends it in place; everything else rebinds.
    fn augmented(&self, op: BinOp, current: &Value, operand: &Value) -> FaultResult<Value> {
        match (op, current, operand) {
            (BinOp::Add, Value::List(list), Value::List(extra)) => {
                let extra = extra.borrow().clone();
                self.check(value::ensure_len(list.borrow().len().saturating_add(extra.len())))?;
                list.borrow_mut().extend(extra);
                Ok(current.clone())
            }
            (BinOp::BitOr | BinOp::BitAnd | BinOp::BitXor | BinOp::Sub, Value::Set(set), Value::Set(other)) => {
                let result = value::set_binary(op, &set.borrow(), &other.borrow());
                *set.borrow_mut() = result;
                Ok(current.clone())
            }
            (BinOp::BitOr, Value::Dict(dict), Value::Dict(other)) => {
                let result = dict.borrow().merged(&other.borrow());
                *dict.borrow_mut() = result;
                Ok(current.clone())
            }
            _ => self.check(value::binary(op, current, operand)),
        }
    }

    // ---- expressions ----

    fn eval(&mut self, expr: &Expr) -> FaultResult<Value> {
        match expr {
            Expr::Const(c) => Ok(match c {
                Const::None => Value::None,
                Const::Bool(b) => Value::Bool(*b),
                Const::Int(i) => Value::Int(*i),
                Const::Float(f) => Value::Float(*f),
                Const::Str(s) => Value::str(s),
                Const::Item(item) => Value::Item(*item),
                Const::Entity(entity) => Value::Entity(*entity),
                Const::Ground(ground) => Value::Ground(*ground),
            }),
            Expr::Name(name) => self.lookup(name),
            Expr::Member { qualifier, member, .. } => Err(Fault::script(
                self.line,
                format!("AttributeError: {qualifier} has no member {member}"),
            )),
            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),
            Expr::Set(items) => {
                let items = self.eval_all(items)?;
                Ok(Value::set(self.check(Set::from_values(items))?))
            }
            Expr::Dict(pairs) => {
                let mut dict = Dict::default();
                for (key, value) in pairs {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    self.check(dict.insert(key, value))?;
                }
                Ok(Value::dict(dict))
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                if *op == UnaryOp::Not {
                    return Ok(Value::Bool(!v.truthy()));
                }
                self.check(value::unary(*op, &v))
            }
            Expr::Binary { op, left, right } => {
                let a = self.eval(left)?;
                let b = self.eval(right)?;
                self.check(value::binary(*op, &a, &b))
            }
            Expr::Compare { left, rest } => {
                let mut a = self.eval(left)?;
                for (op, right) in rest {
                    let b = self.eval(right)?;
                    if !self.check(value::compare(*op, &a, &b))? {
                        return Ok(Value::Bool(false));
                    }
                    a = b;
                }
                Ok(Value::Bool(true))
            }
            Expr::Logical { op, left, right } => {
                let a = self.eval(left)?;
                let short_circuit = match op {
                    BoolOp::And => !a.truthy(),
                    BoolOp::Or => a.truthy(),
                };
                if short_circuit { Ok(a) } else { self.eval(right) }
            }
            Expr::Conditional { test, body, orelse } => {
                if self.eval(test)?.truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Call { callee, args, .. } => {
                let args = self.eval_all(args)?;
                self.call(callee, args)
            }
            Expr::Index { value, index } => {
                let container = self.eval(value)?;
                let index = self.eval(index)?;
                self.check(container.index(&index))
            }
            Expr::Slice { value, lower, upper } => {
                let container = self.eval(value)?;
                let lower = match lower {
                    Some(e) => self.eval(e)?,
                    None => Value::None,
                };
                let upper = match upper {
                    Some(e) => self.eval(e)?,
                    None => Value::None,
                };
                self.check(container.slice(&lower, &upper))
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> FaultResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    // ---- calls ----

    fn call(&mut self, callee: &Callee, args: Vec<Value>) -> FaultResult<Value> {
        self.step()?;
        match callee {
            Callee::Primitive(p) => self.call_primitive(*p, &args),
            Callee::Print => {
                let line = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
                self.farm.print(line)?;
                Ok(Value::None)
            }
            Callee::Builtin(b) => self.call_builtin(*b, &args),
            Callee::User(name) => {
                let function = self.lookup(name)?;
                self.call_value(&function, args)
            }
            Callee::Unresolved(name) => Err(Fault::script(
                self.line,
                format!("NameError: function '{name}' was never resolved"),
            )),
        }
    }

    fn call_value(&mut self, function: &Value, args: Vec<Value>) -> FaultResult<Value> {
        match function {
            Value::Function(closure) => self.call_user(closure, args),
            Value::Builtin(b) => self.call_builtin(*b, &args),
            Value::Primitive(p) => self.call_primitive(*p, &args),
            other => Err(self.fail(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            )))),
        }
    }

    fn call_user(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> FaultResult<Value> {
        let def = &closure.def;
        let required = def.params.len() - closure.defaults.len();
        if args.len() < required || args.len() > def.params.len() {
            let message = if args.len() > def.params.len() {
                format!(
                    "{}() takes {} positional arguments but {} were given",
                    def.name,
                    def.params.len(),
                    args.len()
                )
            } else {
                format!(
                    "{}() missing {} required positional argument(s)",
                    def.name,
                    required - args.len()
                )
            };
            return Err(self.fail(RuntimeError::type_error(message)));
        }
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(Fault::script(
                self.line,
                "RecursionError: maximum recursion depth exceeded",
            ));
        }

        let given = args.len();
        let mut frame: Scope = def
            .params
            .iter()
            .map(|p| Arc::clone(&p.name))
            .zip(args)
            .collect();
        for (param, default) in def.params[given..]
            .iter()
            .zip(&closure.defaults[closure.defaults.len() - (def.params.len() - given)..])
        {
            frame.insert(Arc::clone(&param.name), default.clone());
        }

        trace!(function = %def.name, depth = self.frames.len() + 1, "call");
        let caller_line = self.line;
        self.frames.push(frame);
        let result = self.exec_block(&def.body);
        self.frames.pop();
        let flow = result?;
        self.line = caller_line;
        Ok(match flow {
            Flow::Return(v) => v,
            _ => Value::None,
        })
    }

    fn call_builtin(&mut self, builtin: Builtin, args: &[Value]) -> FaultResult<Value> {
        if !builtin.needs_interpreter() {
            return self.check(builtins::call(builtin, args));
        }
        self.check(check_arity(builtin.name(), builtin.arity(), args.len()))?;
        match builtin {
            Builtin::Time => Ok(Value::Float(self.farm.clock_time())),
            Builtin::Random => Ok(Value::Float(self.farm.rng().r#gen::<f64>())),
            Builtin::Choice => {
                let items = self.check(args[0].to_vec())?;
                if items.is_empty() {
                    return Err(self.fail(RuntimeError::index_error(
                        "Cannot choose from an empty sequence",
                    )));
                }
                let i = self.farm.rng().gen_range(0..items.len());
                Ok(items[i].clone())
            }
            Builtin::Map => {
                let items = self.check(args[1].to_vec())?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.call_value(&args[0], vec![item])?);
                }
                Ok(Value::list(out))
            }
            Builtin::Filter => {
                let items = self.check(args[1].to_vec())?;
                let mut out = Vec::new();
                for item in items {
                    let keep = match &args[0] {
                        Value::None => item.truthy(),
                        f => self.call_value(f, vec![item.clone()])?.truthy(),
                    };
                    if keep {
                        out.push(item);
                    }
                }
                Ok(Value::list(out))
            }
            other => self.check(builtins::call(other, args)),
        }
    }

    fn call_primitive(&mut self, primitive: Primitive, args: &[Value]) -> FaultResult<Value> {
        self.check(check_arity(primitive.name(), primitive.arity(), args.len()))?;
        let name = primitive.name();
        let farm = &mut *self.farm;
        let line = self.line;
        let arg = |i: usize| &args[i];
        let fail = |e: RuntimeError| Fault::script(line, e.to_string());
        let value = match primitive {
            Primitive::Move => Value::Bool(farm.move_drone(direction(name, arg(0)).map_err(fail)?)?),
            Primitive::Measure => {
                let dir = args.first().map(|v| direction(name, v)).transpose().map_err(fail)?;
                Value::Entity(farm.measure(dir)?)
            }
            Primitive::GetWater => Value::Float(farm.get_water()?),
            Primitive::Harvest => Value::Bool(farm.harvest()?),
            Primitive::CanHarvest => Value::Bool(farm.can_harvest()?),
            Primitive::Plant => Value::Bool(farm.plant(entity(name, arg(0)).map_err(fail)?)?),
            Primitive::Till => {
                farm.till()?;
                Value::None
            }
            Primitive::Trade => Value::Bool(farm.trade(item(name, arg(0)).map_err(fail)?)?),
            Primitive::UseItem => Value::Bool(farm.use_item(item(name, arg(0)).map_err(fail)?)?),
            Primitive::Swap => Value::Bool(farm.swap(direction(name, arg(0)).map_err(fail)?)?),
            Primitive::NumItems => Value::Int(farm.num_items(item(name, arg(0)).map_err(fail)?)?),
            Primitive::GetPosX => Value::Int(farm.get_pos_x()?),
            Primitive::GetPosY => Value::Int(farm.get_pos_y()?),
            Primitive::GetWorldSize => Value::Int(farm.get_world_size()?),
            Primitive::Delay => {
                let seconds = arg(0).as_float().ok_or_else(|| fail(wrong_type(name, "a number", arg(0))))?;
                farm.delay(seconds.max(0.0))?;
                Value::None
            }
        };
        Ok(value)
    }
}

fn wrong_type(function: &str, expected: &str, got: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "{function}() argument must be {expected}, not '{}'",
        got.type_name()
    ))
}

fn direction(function: &str, v: &Value) -> ValueResult<Direction> {
    match v {
        Value::Direction(d) => Ok(*d),
        other => Err(wrong_type(function, "a Direction", other)),
    }
}

fn entity(function: &str, v: &Value) -> ValueResult<Entity> {
    match v {
        Value::Entity(e) => Ok(*e),
        other => Err(wrong_type(function, "an Entity", other)),
    }
}

fn item(function: &str, v: &Value) -> ValueResult<Item> {
    match v {
        Value::Item(i) => Ok(*i),
        other => Err(wrong_type(function, "an Item", other)),
    }
}
