//! Deferred query builder.
//!
//! A [`QuerySelector`] records query operations instead of running them. The
//! recording is a [`QueryPlan`]: an ordered chain of [`Clause`]s and a single
//! [`Evaluator`]. Invoking the selector with a state tree opens a fresh
//! session, starts from every row of the model, replays the clauses in the
//! order they were recorded, and finally applies the evaluator.
//!
//! Chaining never copies the plan. Every clone of a selector is an alias of
//! the same plan, so chaining on any of them is visible through all of them.
//! Use [`QuerySelector::fork`] to get an independent copy.

use crate::error::Result;
use crate::model::TableResolver;
use crate::state::StateTree;
use orm_engine::{Id, Lookup, ModelInstance, QuerySet, SortKey, Table};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Anything that can be evaluated against a state tree.
///
/// Implemented by [`QuerySelector`] and by every closure returned from
/// [`ModelSelector`](crate::ModelSelector), so a host store can hold them
/// uniformly.
pub trait Selector {
    type Output;

    fn select(&self, state: &dyn StateTree) -> Result<Self::Output>;
}

impl<F, T> Selector for F
where
    F: Fn(&dyn StateTree) -> Result<T>,
{
    type Output = T;

    fn select(&self, state: &dyn StateTree) -> Result<T> {
        self(state)
    }
}

/// A recorded operation that narrows or reorders the query.
#[derive(Debug, Clone)]
pub enum Clause {
    Filter(Lookup),
    Exclude(Lookup),
    OrderBy(Vec<SortKey>),
}

impl Clause {
    pub fn name(&self) -> &'static str {
        match self {
            Clause::Filter(_) => "filter",
            Clause::Exclude(_) => "exclude",
            Clause::OrderBy(_) => "order_by",
        }
    }

    fn apply<'s>(&self, query: QuerySet<'s>) -> orm_engine::Result<QuerySet<'s>> {
        match self {
            Clause::Filter(lookup) => query.filter(lookup),
            Clause::Exclude(lookup) => query.exclude(lookup),
            Clause::OrderBy(keys) => Ok(query.order_by(keys)),
        }
    }
}

/// The recorded operation that turns the query into a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Evaluator {
    At(usize),
    Count,
    Exists,
    ContainsId(Id),
    First,
    Last,
    ToModelArray,
    #[default]
    ToRefArray,
}

impl Evaluator {
    pub fn name(&self) -> &'static str {
        match self {
            Evaluator::At(_) => "at",
            Evaluator::Count => "count",
            Evaluator::Exists => "exists",
            Evaluator::ContainsId(_) => "contains_id",
            Evaluator::First => "first",
            Evaluator::Last => "last",
            Evaluator::ToModelArray => "to_model_array",
            Evaluator::ToRefArray => "to_ref_array",
        }
    }

    fn apply(&self, query: &QuerySet<'_>) -> Evaluation {
        match self {
            Evaluator::At(index) => Evaluation::Instance(query.at(*index)),
            Evaluator::Count => Evaluation::Count(query.count()),
            Evaluator::Exists => Evaluation::Flag(query.exists()),
            Evaluator::ContainsId(id) => Evaluation::Flag(query.contains_id(id)),
            Evaluator::First => Evaluation::Instance(query.first()),
            Evaluator::Last => Evaluation::Instance(query.last()),
            Evaluator::ToModelArray => Evaluation::Instances(query.to_model_array()),
            Evaluator::ToRefArray => Evaluation::Refs(query.to_ref_array()),
        }
    }
}

/// Whether an operation extends the chain or replaces the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Clause,
    Evaluator,
}

/// Any recordable operation.
#[derive(Debug, Clone)]
pub enum Operation {
    Clause(Clause),
    Evaluator(Evaluator),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Clause(clause) => clause.name(),
            Operation::Evaluator(evaluator) => evaluator.name(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Clause(_) => OperationKind::Clause,
            Operation::Evaluator(_) => OperationKind::Evaluator,
        }
    }
}

impl From<Clause> for Operation {
    fn from(clause: Clause) -> Self {
        Operation::Clause(clause)
    }
}

impl From<Evaluator> for Operation {
    fn from(evaluator: Evaluator) -> Self {
        Operation::Evaluator(evaluator)
    }
}

/// The recorded clause chain and evaluator.
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    clauses: Vec<Clause>,
    evaluator: Evaluator,
}

impl QueryPlan {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Clauses append; an evaluator replaces the previous one.
    pub fn record(&mut self, op: Operation) {
        match op {
            Operation::Clause(clause) => self.clauses.push(clause),
            Operation::Evaluator(evaluator) => self.evaluator = evaluator,
        }
    }

    /// Clause chain in order, followed by the evaluator.
    pub fn operations(&self) -> Vec<Operation> {
        self.clauses
            .iter()
            .cloned()
            .map(Operation::Clause)
            .chain(std::iter::once(Operation::Evaluator(self.evaluator.clone())))
            .collect()
    }

    /// Replay against `table`: all rows, every clause in order, then the
    /// evaluator.
    pub fn run(&self, table: Table<'_>) -> orm_engine::Result<Evaluation> {
        let mut query = table.all();
        for clause in &self.clauses {
            query = clause.apply(query)?;
        }
        Ok(self.evaluator.apply(&query))
    }
}

/// The value produced by an evaluator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Evaluation {
    /// `at`, `first`, `last`
    Instance(Option<ModelInstance>),
    /// `to_model_array`
    Instances(Vec<ModelInstance>),
    /// `to_ref_array`
    Refs(Vec<Value>),
    /// `count`
    Count(usize),
    /// `exists`, `contains_id`
    Flag(bool),
}

impl Evaluation {
    pub fn as_count(&self) -> Option<usize> {
        match self {
            Evaluation::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Evaluation::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    /// The instance of an `at`/`first`/`last` result, if there is one.
    pub fn into_instance(self) -> Option<ModelInstance> {
        match self {
            Evaluation::Instance(instance) => instance,
            _ => None,
        }
    }

    pub fn into_instances(self) -> Option<Vec<ModelInstance>> {
        match self {
            Evaluation::Instances(instances) => Some(instances),
            _ => None,
        }
    }

    pub fn into_refs(self) -> Option<Vec<Value>> {
        match self {
            Evaluation::Refs(refs) => Some(refs),
            _ => None,
        }
    }
}

/// A lazily evaluated, chainable query over one model.
#[derive(Clone)]
pub struct QuerySelector {
    resolver: TableResolver,
    plan: Rc<RefCell<QueryPlan>>,
}

impl QuerySelector {
    /// Start an empty plan (every row, as plain references).
    pub fn new(resolver: TableResolver) -> Self {
        Self {
            resolver,
            plan: Rc::new(RefCell::new(QueryPlan::default())),
        }
    }

    /// Record `op` on the shared plan and return another handle to it.
    pub fn record(&self, op: impl Into<Operation>) -> Self {
        self.plan.borrow_mut().record(op.into());
        self.clone()
    }

    // Clauses

    pub fn filter(&self, lookup: impl Into<Lookup>) -> Self {
        self.record(Clause::Filter(lookup.into()))
    }

    pub fn exclude(&self, lookup: impl Into<Lookup>) -> Self {
        self.record(Clause::Exclude(lookup.into()))
    }

    pub fn order_by<K>(&self, keys: impl IntoIterator<Item = K>) -> Self
    where
        K: Into<SortKey>,
    {
        self.record(Clause::OrderBy(keys.into_iter().map(Into::into).collect()))
    }

    // Evaluators

    pub fn at(&self, index: usize) -> Self {
        self.record(Evaluator::At(index))
    }

    pub fn count(&self) -> Self {
        self.record(Evaluator::Count)
    }

    pub fn exists(&self) -> Self {
        self.record(Evaluator::Exists)
    }

    /// Whether a row with `id` survives the clauses.
    pub fn contains_id(&self, id: impl Into<Id>) -> Self {
        self.record(Evaluator::ContainsId(id.into()))
    }

    pub fn first(&self) -> Self {
        self.record(Evaluator::First)
    }

    pub fn last(&self) -> Self {
        self.record(Evaluator::Last)
    }

    pub fn to_model_array(&self) -> Self {
        self.record(Evaluator::ToModelArray)
    }

    pub fn to_ref_array(&self) -> Self {
        self.record(Evaluator::ToRefArray)
    }

    /// Run the recorded plan against `state`.
    pub fn select(&self, state: &dyn StateTree) -> Result<Evaluation> {
        // Snapshot the plan so predicates may chain on this selector.
        let plan = self.plan.borrow().clone();

        self.resolver.resolve(state, |table| {
            debug!(
                model = table.model_name(),
                clauses = plan.clauses.len(),
                evaluator = plan.evaluator.name(),
                "replaying query"
            );
            Ok(plan.run(table)?)
        })
    }

    /// An independent selector with a copy of the current plan.
    pub fn fork(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            plan: Rc::new(RefCell::new(self.plan.borrow().clone())),
        }
    }

    /// Copy of the current plan.
    pub fn plan(&self) -> QueryPlan {
        self.plan.borrow().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.plan.borrow().operations()
    }

    /// Whether both handles record into the same plan.
    pub fn shares_plan_with(&self, other: &QuerySelector) -> bool {
        Rc::ptr_eq(&self.plan, &other.plan)
    }
}

impl Selector for QuerySelector {
    type Output = Evaluation;

    fn select(&self, state: &dyn StateTree) -> Result<Evaluation> {
        QuerySelector::select(self, state)
    }
}

impl fmt::Debug for QuerySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySelector")
            .field("resolver", &self.resolver)
            .field("plan", &*self.plan.borrow())
            .finish()
    }
}
