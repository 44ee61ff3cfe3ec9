//! Transaction-scoped execution.
//!
//! The repository never begins or commits transactions. A caller that wants
//! transactional semantics obtains a stream transaction from the driver,
//! wraps its id in a [`Transaction`], and threads the handle through each
//! operation's options. Committing or aborting stays a caller concern.

use std::future::Future;

use crate::ports::TransactionId;

/// Handle to a server-side stream transaction obtained by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    id: TransactionId,
}

impl Transaction {
    pub fn new(id: TransactionId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    /// Run `operation` as a step of this transaction.
    ///
    /// The closure receives the transaction id and must pass it to every
    /// driver call it makes; a sub-call issued without the id executes
    /// outside the transaction's isolation scope, which is a correctness
    /// bug for multi-statement operations.
    pub async fn step<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(TransactionId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        operation(self.id.clone()).await
    }
}

/// Uniform wrapper used by every repository operation: with a transaction
/// handle the operation runs as a step of it, otherwise it runs directly
/// against the connection.
///
/// A repository call wraps all of its driver round trips, query execution
/// and cursor drain included, in a single `run_scoped` closure, so the
/// sub-steps of one logical operation share the same transaction scope.
pub(crate) async fn run_scoped<T, E, F, Fut>(
    transaction: Option<&Transaction>,
    operation: F,
) -> Result<T, E>
where
    F: FnOnce(Option<TransactionId>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match transaction {
        Some(txn) => txn.step(|id| operation(Some(id))).await,
        None => operation(None).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn step_threads_the_transaction_id_into_the_operation() {
        let txn = Transaction::new(TransactionId::new("txn-42"));
        let seen = txn
            .step(|id| async move { Ok::<_, ()>(id.as_str().to_string()) })
            .await
            .expect("step succeeds");
        assert_eq!(seen, "txn-42");
    }

    #[tokio::test]
    async fn run_scoped_without_a_handle_passes_no_id() {
        let seen = run_scoped(None, |id| async move { Ok::<_, ()>(id) })
            .await
            .expect("operation succeeds");
        assert!(seen.is_none());
    }

    #[tokio::test]
    async fn run_scoped_with_a_handle_runs_as_a_step() {
        let txn = Transaction::new(TransactionId::new("txn-7"));
        let seen = run_scoped(Some(&txn), |id| async move { Ok::<_, ()>(id) })
            .await
            .expect("operation succeeds");
        assert_eq!(seen, Some(TransactionId::new("txn-7")));
    }
}
