//! Effect protocol
//!
//! Operations are written once as [`Script`]s: state machines that are
//! resumed with a [`Reply`] and answer with the next [`Step`]. A step either
//! finishes or yields an [`Effect`], which is ready now (`Continue`) or must
//! be awaited (`Suspend`). [`run_sync`] drives scripts whose effects are all
//! ready and rejects suspension; [`run_async`] awaits suspended effects.

mod session;
mod transaction;

pub use session::{Scope, Session};
pub use transaction::{in_transaction, Transaction, TxScript};

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use futures_util::future::BoxFuture;
use log::warn;

use crate::driver::DriverTx;
use crate::error::{StoreError, Result};
use crate::models::{Op, Record};

/// Result of a storage call
pub enum Effect<T> {
    /// The value is available now
    Continue(T),

    /// The value arrives when the future completes
    Suspend(BoxFuture<'static, Result<T>>),
}

impl<T: Debug> Debug for Effect<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Effect::Continue(value) => f.debug_tuple("Continue").field(value).finish(),
            Effect::Suspend(_) => write!(f, "Suspend(..)"),
        }
    }
}

impl<T: Send + 'static> Effect<T> {
    /// Wrap a future
    pub fn suspend<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Effect::Suspend(Box::pin(future))
    }

    /// Whether the value must be awaited
    pub fn is_suspended(&self) -> bool {
        matches!(self, Effect::Suspend(_))
    }

    /// Transform the value once it is available
    pub fn map<U, F>(self, f: F) -> Effect<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Effect::Continue(value) => Effect::Continue(f(value)),
            Effect::Suspend(future) => Effect::suspend(async move { future.await.map(f) }),
        }
    }

    /// Transform the value with a fallible function
    pub fn and_then<U, F>(self, f: F) -> Result<Effect<U>>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        match self {
            Effect::Continue(value) => f(value).map(Effect::Continue),
            Effect::Suspend(future) => Ok(Effect::suspend(async move { f(future.await?) })),
        }
    }

    /// Chain a second storage call that depends on the first value
    pub fn then<U, F>(self, f: F) -> Result<Effect<U>>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<Effect<U>> + Send + 'static,
    {
        match self {
            Effect::Continue(value) => f(value),
            Effect::Suspend(future) => Ok(Effect::suspend(async move { f(future.await?)?.resolve().await })),
        }
    }

    /// Type-erase into an effect yielding a [`Reply`]
    pub fn erase(self) -> Effect<Reply>
    where
        T: Into<Reply>,
    {
        self.map(Into::into)
    }

    /// Resolve without a runtime; fails if the effect is suspended
    pub fn wait(self) -> Result<T> {
        match self {
            Effect::Continue(value) => Ok(value),
            Effect::Suspend(_) => {
                warn!("Asynchronous effect reached a synchronous caller");
                Err(StoreError::SuspendInSyncExecutor)
            }
        }
    }

    /// Resolve, awaiting if needed
    pub async fn resolve(self) -> Result<T> {
        match self {
            Effect::Continue(value) => Ok(value),
            Effect::Suspend(future) => future.await,
        }
    }
}

/// Value a script is resumed with
pub enum Reply {
    /// First resume
    Start,

    /// A write finished
    Unit,

    /// A scan finished
    Records(Vec<Record>),

    /// A mutation was observed
    Ops(Vec<Op>),

    /// A transaction was opened
    Transaction(Box<dyn DriverTx>),
}

impl Debug for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Reply::Start => write!(f, "Start"),
            Reply::Unit => write!(f, "Unit"),
            Reply::Records(records) => write!(f, "Records({})", records.len()),
            Reply::Ops(ops) => write!(f, "Ops({:?})", ops),
            Reply::Transaction(tx) => write!(f, "Transaction({})", tx.id()),
        }
    }
}

impl Reply {
    /// Name of the reply kind
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Start => "start",
            Reply::Unit => "unit",
            Reply::Records(_) => "records",
            Reply::Ops(_) => "ops",
            Reply::Transaction(_) => "transaction",
        }
    }

    fn unexpected(&self, expected: &'static str) -> StoreError {
        StoreError::UnexpectedReply { expected, found: self.kind() }
    }

    /// Expect a finished write
    pub fn into_unit(self) -> Result<()> {
        match self {
            Reply::Unit => Ok(()),
            other => Err(other.unexpected("unit")),
        }
    }

    /// Expect scan results
    pub fn into_records(self) -> Result<Vec<Record>> {
        match self {
            Reply::Records(records) => Ok(records),
            other => Err(other.unexpected("records")),
        }
    }

    /// Expect observed mutations
    pub fn into_ops(self) -> Result<Vec<Op>> {
        match self {
            Reply::Ops(ops) => Ok(ops),
            other => Err(other.unexpected("ops")),
        }
    }

    /// Expect an opened transaction
    pub fn into_transaction(self) -> Result<Box<dyn DriverTx>> {
        match self {
            Reply::Transaction(tx) => Ok(tx),
            other => Err(other.unexpected("transaction")),
        }
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Unit
    }
}

impl From<Vec<Record>> for Reply {
    fn from(records: Vec<Record>) -> Self {
        Reply::Records(records)
    }
}

impl From<Vec<Op>> for Reply {
    fn from(ops: Vec<Op>) -> Self {
        Reply::Ops(ops)
    }
}

impl From<Box<dyn DriverTx>> for Reply {
    fn from(tx: Box<dyn DriverTx>) -> Self {
        Reply::Transaction(tx)
    }
}

/// Values that can be recovered from a [`Reply`]
pub trait FromReply: Sized {
    /// Convert, failing on the wrong reply kind
    fn from_reply(reply: Reply) -> Result<Self>;
}

impl FromReply for () {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_unit()
    }
}

impl FromReply for Vec<Record> {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_records()
    }
}

impl FromReply for Vec<Op> {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_ops()
    }
}

impl FromReply for Box<dyn DriverTx> {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_transaction()
    }
}

/// What a script does next
#[derive(Debug)]
pub enum Step<T> {
    /// Run an effect and resume with its reply
    Yield(Effect<Reply>),

    /// The script is finished
    Done(T),
}

/// An operation written as a resumable state machine
///
/// The first call to `resume` receives `Ok(Reply::Start)`. Failed effects
/// are passed back as `Err` so the script can clean up; returning `Err`
/// ends the script.
pub trait Script: Send {
    /// Final value
    type Output;

    /// Advance the script
    fn resume(&mut self, reply: Result<Reply>) -> Result<Step<Self::Output>>;
}

/// Drive a script whose effects are all ready
///
/// A suspended effect is passed back to the script as
/// [`StoreError::SuspendInSyncExecutor`] without being polled, so it can
/// clean up. The run fails with that error however the script finishes.
pub fn run_sync<S: Script>(mut script: S) -> Result<S::Output> {
    let mut reply = Ok(Reply::Start);
    let mut suspended = false;

    loop {
        match script.resume(reply) {
            Ok(Step::Done(_)) if suspended => return Err(StoreError::SuspendInSyncExecutor),
            Ok(Step::Done(output)) => return Ok(output),
            Ok(Step::Yield(Effect::Continue(value))) => reply = Ok(value),
            Ok(Step::Yield(Effect::Suspend(_))) => {
                warn!("Synchronous executor cannot resume across an asynchronous effect");
                suspended = true;
                reply = Err(StoreError::SuspendInSyncExecutor);
            }
            Err(_) if suspended => return Err(StoreError::SuspendInSyncExecutor),
            Err(e) => return Err(e),
        }
    }
}

/// Drive a script, awaiting suspended effects
pub async fn run_async<S: Script>(mut script: S) -> Result<S::Output> {
    let mut reply = Ok(Reply::Start);

    loop {
        match script.resume(reply)? {
            Step::Done(output) => return Ok(output),
            Step::Yield(effect) => reply = effect.resolve().await,
        }
    }
}

/// Script running a single effect
pub struct Once<T> {
    effect: Option<Effect<T>>,
}

/// Turn one effect into a script
pub fn once<T>(effect: Effect<T>) -> Once<T> {
    Once { effect: Some(effect) }
}

impl<T> Script for Once<T>
where
    T: Into<Reply> + FromReply + Send + 'static,
{
    type Output = T;

    fn resume(&mut self, reply: Result<Reply>) -> Result<Step<T>> {
        match self.effect.take() {
            Some(Effect::Continue(value)) => Ok(Step::Done(value)),
            Some(effect) => Ok(Step::Yield(effect.erase())),
            None => T::from_reply(reply?).map(Step::Done),
        }
    }
}
